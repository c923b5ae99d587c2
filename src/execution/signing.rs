//! Order-hash and signature placeholders (§4.6, §9 ОQ5). Real EIP-712
//! order-hashing and EOA/ERC-1271 signing are an on-chain-primitive concern
//! named out of scope in §1 — this module documents the substitution point
//! with an opaque type rather than faking a cryptographic result.

use alloy_primitives::Address;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::model::{OrderId, SliceHash};

/// Opaque signature bytes. `Eoa` stands in for a real ECDSA signature over
/// the protocol's EIP-712 order hash; `Erc1271Sentinel` is the documented
/// magic value contracts use to say "validate via `isValidSignature`"
/// instead of embedding signature bytes directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Eoa(Vec<u8>),
    Erc1271Sentinel,
}

impl Signature {
    pub fn placeholder_eoa() -> Self {
        // 65-byte r/s/v shaped placeholder; a real signer would populate
        // this from `LocalSigner::sign_hash` over the protocol's EIP-712
        // order digest.
        Signature::Eoa(vec![0u8; 65])
    }
}

/// Fields that make up a protocol-level limit order (§4.6 step 1).
#[derive(Debug, Clone)]
pub struct ProtocolOrderRecord {
    pub salt: u64,
    pub maker: Address,
    pub receiver: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    pub making: Decimal,
    pub taking: Decimal,
    /// Bit flags: partial fills / multiple fills / pre- and
    /// post-interaction, set whenever `maker` is a delegate proxy.
    pub traits: u64,
}

const TRAIT_ALLOW_PARTIAL_FILL: u64 = 1 << 0;
const TRAIT_ALLOW_MULTIPLE_FILLS: u64 = 1 << 1;
const TRAIT_PRE_INTERACTION: u64 = 1 << 2;
const TRAIT_POST_INTERACTION: u64 = 1 << 3;

impl ProtocolOrderRecord {
    pub fn new(
        salt: u64,
        maker: Address,
        receiver: Address,
        maker_asset: Address,
        taker_asset: Address,
        making: Decimal,
        taking: Decimal,
        via_proxy: bool,
    ) -> Self {
        let traits = if via_proxy {
            TRAIT_ALLOW_PARTIAL_FILL
                | TRAIT_ALLOW_MULTIPLE_FILLS
                | TRAIT_PRE_INTERACTION
                | TRAIT_POST_INTERACTION
        } else {
            TRAIT_ALLOW_PARTIAL_FILL | TRAIT_ALLOW_MULTIPLE_FILLS
        };
        Self {
            salt,
            maker,
            receiver,
            maker_asset,
            taker_asset,
            making,
            taking,
            traits,
        }
    }

    /// Stable domain-separated hash over the order's canonical field
    /// encoding. Stands in for the protocol's real EIP-712 order hash
    /// (keccak256-shaped), which needs an ABI-encoding dependency this
    /// crate's teacher lineage doesn't carry.
    pub fn deterministic_hash(&self, parent_id: OrderId) -> SliceHash {
        let mut hasher = Sha256::new();
        hasher.update(b"edge-keeper.order.v1");
        hasher.update(parent_id.to_string().as_bytes());
        hasher.update(self.salt.to_le_bytes());
        hasher.update(self.maker.as_slice());
        hasher.update(self.receiver.as_slice());
        hasher.update(self.maker_asset.as_slice());
        hasher.update(self.taker_asset.as_slice());
        hasher.update(self.making.to_string().as_bytes());
        hasher.update(self.taking.to_string().as_bytes());
        hasher.update(self.traits.to_le_bytes());
        let digest = hasher.finalize();
        SliceHash(format!("0x{}", hex::encode(digest)))
    }

    pub fn signature(&self, via_proxy: bool) -> Signature {
        if via_proxy {
            Signature::Erc1271Sentinel
        } else {
            Signature::placeholder_eoa()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> ProtocolOrderRecord {
        ProtocolOrderRecord::new(
            42,
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            dec!(10),
            dec!(20_000),
            false,
        )
    }

    #[test]
    fn hash_is_deterministic_for_same_fields() {
        let id = OrderId::new();
        let a = record().deterministic_hash(id);
        let b = record().deterministic_hash(id);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_changes_with_salt() {
        let id = OrderId::new();
        let mut r = record();
        let h1 = r.deterministic_hash(id);
        r.salt = 43;
        let h2 = r.deterministic_hash(id);
        assert_ne!(h1, h2);
    }

    #[test]
    fn proxy_path_uses_erc1271_sentinel() {
        let r = record();
        assert_eq!(r.signature(true), Signature::Erc1271Sentinel);
        assert!(matches!(r.signature(false), Signature::Eoa(_)));
    }
}
