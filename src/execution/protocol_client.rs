//! HTTP client for the two protocol endpoint families in §6, shared by the
//! Slice Submitter and Slice Monitor. Mirrors the teacher's lightweight
//! `GammaClient`: bypass SDK types, talk `reqwest` + `serde_json` directly.

use alloy_primitives::Address;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SubmitError;
use crate::execution::signing::{ProtocolOrderRecord, Signature};

#[derive(Debug, Clone)]
pub struct ProtocolClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub chain_id: u64,
}

pub struct ProtocolClient {
    client: reqwest::Client,
    cfg: ProtocolClientConfig,
}

#[derive(Debug, Serialize)]
struct OrderWireData {
    #[serde(rename = "makerAsset")]
    maker_asset: String,
    #[serde(rename = "takerAsset")]
    taker_asset: String,
    salt: String,
    receiver: String,
    #[serde(rename = "makingAmount")]
    making_amount: String,
    #[serde(rename = "takingAmount")]
    taking_amount: String,
    maker: String,
    extension: String,
    #[serde(rename = "makerTraits")]
    maker_traits: String,
}

#[derive(Debug, Serialize)]
struct SubmitBody {
    order: OrderWireData,
    signature: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteOrderEntry {
    #[serde(rename = "orderHash")]
    pub order_hash: String,
    #[serde(rename = "remainingMakerAmount")]
    pub remaining_maker_amount: String,
    #[serde(rename = "orderInvalidReason")]
    pub order_invalid_reason: Option<String>,
}

impl ProtocolClient {
    pub fn new(cfg: ProtocolClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cfg,
        }
    }

    /// `POST /orderbook/v4.0/{chain}` (§6). Returns the server-accepted
    /// status; callers still trust the locally-computed hash regardless of
    /// whether publish succeeded (§4.6 step 4).
    pub async fn submit_order(
        &self,
        record: &ProtocolOrderRecord,
        signature: &Signature,
    ) -> Result<(), SubmitError> {
        let sig_hex = match signature {
            Signature::Eoa(bytes) => format!("0x{}", hex::encode(bytes)),
            Signature::Erc1271Sentinel => "0x1271".to_string(),
        };
        let body = SubmitBody {
            order: OrderWireData {
                maker_asset: format!("{:#x}", record.maker_asset),
                taker_asset: format!("{:#x}", record.taker_asset),
                salt: record.salt.to_string(),
                receiver: format!("{:#x}", record.receiver),
                making_amount: record.making.to_string(),
                taking_amount: record.taking.to_string(),
                maker: format!("{:#x}", record.maker),
                extension: "0x".to_string(),
                maker_traits: record.traits.to_string(),
            },
            signature: sig_hex,
        };

        let url = format!("{}/orderbook/v4.0/{}", self.cfg.base_url, self.cfg.chain_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitError::transient(format!("submit request failed: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(SubmitError::throttled(retry_after));
        }
        if status.is_server_error() {
            return Err(SubmitError::transient(format!("server error: {status}")));
        }
        if status.as_u16() == 201 || status.is_success() {
            return Ok(());
        }
        let body_text = resp.text().await.unwrap_or_default();
        Err(SubmitError::permanent(format!(
            "rejected ({status}): {body_text}"
        )))
    }

    /// `GET /orderbook/v4.0/{chain}/address/{maker}` (§6), paged by the
    /// caller if needed; this crate polls with a single page per cycle,
    /// sized by the caller's `limit`.
    pub async fn list_orders_for_maker(
        &self,
        maker: Address,
        limit: u32,
    ) -> anyhow::Result<Vec<RemoteOrderEntry>> {
        let url = format!(
            "{}/orderbook/v4.0/{}/address/{:#x}?page=1&limit={}&statuses=1,2,3",
            self.cfg.base_url, self.cfg.chain_id, maker, limit
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.cfg.api_key)
            .send()
            .await
            .context("orderbook address query failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("orderbook address query returned {}", resp.status());
        }
        resp.json::<Vec<RemoteOrderEntry>>()
            .await
            .context("failed to parse orderbook address response")
    }
}

/// Parses a decimal-string amount field from the wire format, logging and
/// treating unparseable values as zero rather than failing the whole poll.
pub fn parse_amount(raw: &str, field: &str) -> Decimal {
    raw.parse().unwrap_or_else(|e| {
        warn!(field, raw, error = %e, "unparseable remote amount, treating as zero");
        Decimal::ZERO
    })
}
