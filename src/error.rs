//! Domain error kinds the core distinguishes, per the error handling design.
//!
//! Transport/Throttle are local to whichever component raised them (exchange
//! adapter, slice submitter, slice monitor) and are always retried with
//! backoff before they ever reach a caller. Submission-permanent and
//! store-fatal are the only kinds that change an `AdvancedOrder`'s status or
//! the process exit code.

use std::fmt;

/// Errors that can surface from a single HTTP/WS round-trip to an external
/// system (venue or protocol API).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    Throttled { retry_after_ms: Option<u64> },
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Throttle responses carry their own backoff hint; everything else
    /// backs off per the caller's own exponential schedule.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            TransportError::Throttled { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }

    pub fn is_throttle(&self) -> bool {
        matches!(self, TransportError::Throttled { .. })
    }
}

/// Why a slice submission failed. `Permanent` propagates to the supervisor
/// and eventually transitions the parent order to `Failed`; `Transient` is
/// retried by the caller per §4.6.
#[derive(Debug, Clone)]
pub enum SubmitErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, thiserror::Error)]
#[error("submit error ({kind:?}): {detail}")]
pub struct SubmitError {
    pub kind: SubmitErrorKind,
    pub detail: String,
    /// Set when the failure was an HTTP 429 carrying a `Retry-After`
    /// header, so the caller's backoff can honour it (§4.6 step 3).
    pub retry_after_ms: Option<u64>,
}

impl SubmitError {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            kind: SubmitErrorKind::Transient,
            detail: detail.into(),
            retry_after_ms: None,
        }
    }

    pub fn throttled(retry_after_ms: Option<u64>) -> Self {
        Self {
            kind: SubmitErrorKind::Transient,
            detail: "rate limited".to_string(),
            retry_after_ms,
        }
    }

    pub fn permanent(detail: impl Into<String>) -> Self {
        Self {
            kind: SubmitErrorKind::Permanent,
            detail: detail.into(),
            retry_after_ms: None,
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self.kind, SubmitErrorKind::Permanent)
    }
}

impl From<TransportError> for SubmitError {
    fn from(e: TransportError) -> Self {
        if let TransportError::Throttled { retry_after_ms } = e {
            SubmitError::throttled(retry_after_ms)
        } else {
            SubmitError::transient(e.to_string())
        }
    }
}

/// A validated-at-the-boundary user input problem. Rejected at submission;
/// never produced by internal components.
#[derive(Debug, thiserror::Error)]
pub enum InvalidOrderError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("malformed params for order kind {kind}: {detail}")]
    MalformedParams { kind: String, detail: String },
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(rust_decimal::Decimal),
}

/// The Order Store's own fatal condition: persistence corrupt beyond
/// recovery. The process exits with code 2 when this is observed at the top
/// level (see `app.rs`).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(String),
    #[error("event log corrupt: {0}")]
    Corrupt(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corrupt(_) | StoreError::Io(_))
    }
}

/// A tag attached to a user-facing `OrderEvent` so API clients can
/// distinguish failure classes without parsing free-text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    Transport,
    Throttle,
    StaleData,
    InvalidInput,
    HandlerPreconditionMissing,
    SubmissionPermanent,
    StoreFatal,
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorTag::Transport => "transport",
            ErrorTag::Throttle => "throttle",
            ErrorTag::StaleData => "stale_data",
            ErrorTag::InvalidInput => "invalid_input",
            ErrorTag::HandlerPreconditionMissing => "handler_precondition_missing",
            ErrorTag::SubmissionPermanent => "submission_permanent",
            ErrorTag::StoreFatal => "store_fatal",
        };
        f.write_str(s)
    }
}

/// Process exit codes, per §6.
pub mod exit_code {
    pub const CLEAN: i32 = 0;
    pub const FATAL_STARTUP: i32 = 1;
    pub const UNRECOVERABLE_RUNTIME: i32 = 2;
}
