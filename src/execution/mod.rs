//! Slice Submitter and Slice Monitor (§4.6, §4.7): the only components that
//! talk to the external protocol API.

pub mod monitor;
pub mod protocol_client;
pub mod signing;
pub mod submitter;

pub use monitor::SliceMonitor;
pub use protocol_client::{ProtocolClient, ProtocolClientConfig};
pub use signing::{ProtocolOrderRecord, Signature};
pub use submitter::SliceSubmitter;
