//! Core types used throughout OracleSync
//!
//! Defines the primitives shared by every engine component: feed
//! classification, event context, and the address/price conversions the
//! reconciliation pipeline relies on.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an asset's price is produced.
///
/// Simple feeds read a single external aggregator (optionally behind a
/// proxy). Composite feeds derive their price from a set of sub-token
/// prices and have no direct external feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedType {
    Simple,
    Composite,
}

impl Default for FeedType {
    fn default() -> Self {
        FeedType::Simple
    }
}

impl FeedType {
    /// Map the raw `getTokenType` answer to a feed type.
    ///
    /// Anything outside the two known discriminants is unrecognized and
    /// the caller keeps the asset's previous type.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(FeedType::Simple),
            2 => Some(FeedType::Composite),
            _ => None,
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedType::Simple => write!(f, "SIMPLE"),
            FeedType::Composite => write!(f, "COMPOSITE"),
        }
    }
}

/// Block-level provenance attached to an on-chain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Contract that emitted the event
    pub emitter: Address,
    /// Block timestamp in seconds
    pub timestamp: u64,
    /// Block number
    pub block_number: u64,
}

impl EventContext {
    pub fn new(emitter: Address, timestamp: u64, block_number: u64) -> Self {
        Self {
            emitter,
            timestamp,
            block_number,
        }
    }
}

/// Timestamp/block bookkeeping carried by every committed record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStamp {
    pub timestamp: u64,
    pub block_number: u64,
}

impl UpdateStamp {
    pub fn at(ctx: &EventContext) -> Self {
        Self {
            timestamp: ctx.timestamp,
            block_number: ctx.block_number,
        }
    }
}

/// Render an address as full lowercase hex with the `0x` prefix.
///
/// `Address` Display abbreviates the middle of the value, so record keys
/// and log lines go through this instead.
pub fn address_hex(addr: &Address) -> String {
    format!("{addr:#x}")
}

/// Guard against a known historical malformed-submission bug: asset
/// addresses whose lowercase hex rendering contains more than 38 `'0'`
/// characters are rejected at the entry point.
pub fn is_degenerate_address(addr: &Address) -> bool {
    address_hex(addr).matches('0').count() > 38
}

/// Convert a raw USD/base-pair aggregator answer into the protocol's
/// base-unit price scale (`10^26 / answer`), zero-guarded.
pub fn format_usd_eth_price(price: U256) -> U256 {
    if price.is_zero() {
        return U256::zero();
    }
    U256::exp10(26) / price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_type_from_raw() {
        assert_eq!(FeedType::from_raw(1), Some(FeedType::Simple));
        assert_eq!(FeedType::from_raw(2), Some(FeedType::Composite));
        assert_eq!(FeedType::from_raw(0), None);
        assert_eq!(FeedType::from_raw(3), None);
    }

    #[test]
    fn test_address_hex_is_full_lowercase() {
        let addr = Address::repeat_byte(0xab);
        let hex = address_hex(&addr);
        assert_eq!(hex.len(), 42);
        assert_eq!(hex, format!("0x{}", "ab".repeat(20)));
    }

    #[test]
    fn test_degenerate_address_rejects_zero_address() {
        // "0x" + 40 zeros: 41 '0' characters in total
        assert!(is_degenerate_address(&Address::zero()));
    }

    #[test]
    fn test_degenerate_address_accepts_regular_address() {
        assert!(!is_degenerate_address(&Address::repeat_byte(0xaa)));
    }

    #[test]
    fn test_degenerate_address_threshold() {
        // 18 zero bytes then 0x01 0x11: "0x" contributes one '0',
        // the body contributes 36 + 1 = 37, total 38 -> accepted.
        let mut bytes = [0u8; 20];
        bytes[18] = 0x01;
        bytes[19] = 0x11;
        assert!(!is_degenerate_address(&Address::from_slice(&bytes)));

        // 19 zero bytes then 0x11: total 39 -> rejected.
        let mut bytes = [0u8; 20];
        bytes[19] = 0x11;
        assert!(is_degenerate_address(&Address::from_slice(&bytes)));
    }

    #[test]
    fn test_format_usd_eth_price() {
        assert_eq!(format_usd_eth_price(U256::zero()), U256::zero());
        // 10^26 / (2 * 10^8) = 5 * 10^17
        let answer = U256::exp10(8) * U256::from(2u64);
        assert_eq!(
            format_usd_eth_price(answer),
            U256::exp10(17) * U256::from(5u64)
        );
    }
}
