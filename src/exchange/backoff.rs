//! Exponential backoff with jitter, shared by every component that retries
//! against an external transport (§4.1 point 3, §4.6, §4.7).

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base_ms: u64,
    cap_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, cap_ms: u64) -> Self {
        Self {
            base_ms,
            cap_ms,
            attempt: 0,
        }
    }

    /// Next delay, doubling each call and clamped to `cap_ms`, with ±10%
    /// jitter applied on top (§4.1: "exponential backoff ... with ±10%
    /// jitter").
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(20);
        self.attempt += 1;
        let raw = self.base_ms.saturating_mul(1u64 << exp).min(self.cap_ms);
        let jitter_frac = rand::thread_rng().gen_range(-0.10..=0.10);
        let jittered = (raw as f64) * (1.0 + jitter_frac);
        Duration::from_millis(jittered.max(0.0) as u64)
    }

    /// An explicit `Retry-After` hint takes priority over the computed
    /// delay (§4.1 point 3: "honour the venue's Retry-After semantics").
    pub fn next_delay_or(&mut self, retry_after_ms: Option<u64>) -> Duration {
        match retry_after_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.next_delay(),
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
