//! Slice Submitter (§4.6): builds, signs, submits a protocol order for one
//! slice and returns its canonical hash regardless of whether the off-chain
//! publish itself succeeded.

use alloy_primitives::Address;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::SubmitError;
use crate::exchange::backoff::Backoff;
use crate::execution::protocol_client::ProtocolClient;
use crate::execution::signing::ProtocolOrderRecord;
use crate::model::{OrderId, SliceHash};

pub struct SliceSubmitter {
    client: ProtocolClient,
    /// Resolved from `chains.<id>.proxy_address` (§6) at wiring time.
    proxy_address: Address,
    max_retries: u32,
}

impl SliceSubmitter {
    pub fn new(client: ProtocolClient, proxy_address: Address, max_retries: u32) -> Self {
        Self {
            client,
            proxy_address,
            max_retries,
        }
    }

    /// `submit(parent, making, taking, limit_price) -> hash` (§4.6
    /// contract). `via_proxy` selects the delegate-proxy / ERC-1271 path
    /// vs. a plain EOA-signed order.
    pub async fn submit(
        &self,
        parent_id: OrderId,
        receiver: Address,
        maker_asset: Address,
        taker_asset: Address,
        making: Decimal,
        taking: Decimal,
        via_proxy: bool,
    ) -> Result<SliceHash, SubmitError> {
        let maker = if via_proxy {
            self.proxy_address
        } else {
            receiver
        };
        let salt: u64 = rand::thread_rng().gen();
        let record = ProtocolOrderRecord::new(
            salt,
            maker,
            receiver,
            maker_asset,
            taker_asset,
            making,
            taking,
            via_proxy,
        );
        let hash = record.deterministic_hash(parent_id);
        let signature = record.signature(via_proxy);

        let mut backoff = Backoff::new(1_000, 30_000);
        let mut attempts = 0u32;
        loop {
            match self.client.submit_order(&record, &signature).await {
                Ok(()) => {
                    info!(parent = %parent_id, hash = %hash, "slice submitted");
                    return Ok(hash);
                }
                Err(e) if e.is_permanent() => {
                    warn!(parent = %parent_id, error = %e, "slice submission permanently rejected");
                    return Err(e);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > self.max_retries {
                        warn!(parent = %parent_id, error = %e, "slice submission exhausted retries");
                        return Err(e);
                    }
                    let delay = backoff.next_delay_or(e.retry_after_ms);
                    warn!(parent = %parent_id, error = %e, delay_ms = delay.as_millis() as u64, attempt = attempts, "retrying slice submission");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maker_is_proxy_when_via_proxy() {
        let proxy = Address::with_last_byte(7);
        let receiver = Address::with_last_byte(9);
        let record = ProtocolOrderRecord::new(
            1,
            proxy,
            receiver,
            Address::ZERO,
            Address::ZERO,
            Decimal::ONE,
            Decimal::ONE,
            true,
        );
        assert_eq!(record.maker, proxy);
    }
}
