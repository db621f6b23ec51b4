//! External Price Source Gateway
//!
//! Wraps the synchronous reads the engine performs against the primary
//! price provider, aggregator, and fallback-oracle contracts. A reverted
//! call is a first-class outcome the caller branches on, never an
//! exception and never retried.

use ethers::types::{Address, U256};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::types::FeedType;

/// A contract read that did not produce a value.
///
/// Reverts mean "value currently unknown" for this event; each call site
/// defines its own degraded behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("contract call reverted")]
pub struct Reverted;

/// Outcome of a single external read.
pub type CallResult<T> = Result<T, Reverted>;

/// Synchronous, side-effect-free reads against the price contracts.
///
/// Implementations bind the given addresses per call; the engine never
/// holds contract handles itself.
pub trait PriceSourceGateway {
    /// Current price of `asset` as reported by the primary price
    /// provider at `provider` (may already be served from fallback).
    fn asset_price(&self, provider: Address, asset: Address) -> CallResult<U256>;

    /// `latestAnswer` on an aggregator (or aggregator proxy) address.
    fn latest_answer(&self, aggregator: Address) -> CallResult<U256>;

    /// Feed classification probe. Reverts on plain external aggregators,
    /// which keeps the asset on its previous (default Simple) type.
    /// Implementations map the contract's raw discriminant through
    /// [`FeedType::from_raw`], treating unknown values as a revert.
    fn token_type(&self, aggregator: Address) -> CallResult<FeedType>;

    /// Sub-tokens a composite aggregator derives its price from.
    fn sub_tokens(&self, aggregator: Address) -> Vec<Address>;

    /// Resolve the underlying aggregator behind a proxy source.
    fn underlying_aggregator(&self, proxy: Address) -> CallResult<Address>;

    /// Display symbol of the yield-bearing token wrapping `asset`
    /// (carries the historical one-character prefix).
    fn wrapped_token_symbol(&self, asset: Address) -> CallResult<String>;

    /// USD/base-pair price accessor available on dev-network fallback
    /// oracles only; reverts elsewhere.
    fn eth_usd_price(&self, fallback: Address) -> CallResult<U256>;

    /// General asset-price accessor on the fallback oracle.
    fn fallback_asset_price(&self, fallback: Address, asset: Address) -> CallResult<U256>;
}

/// Registration seam for "begin watching this address for future
/// aggregator events". The engine issues a registration whenever it
/// discovers an aggregator or fallback address; implementations are
/// expected to be idempotent so each address is surfaced once.
pub trait AddressWatcher {
    fn watch_aggregator(&mut self, aggregator: Address);
    fn watch_fallback_oracle(&mut self, oracle: Address);
}

/// Set-backed watcher used by embedders that only need the discovered
/// address lists (and by tests).
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    pub aggregators: BTreeSet<Address>,
    pub fallback_oracles: BTreeSet<Address>,
}

impl AddressWatcher for WatchList {
    fn watch_aggregator(&mut self, aggregator: Address) {
        self.aggregators.insert(aggregator);
    }

    fn watch_fallback_oracle(&mut self, oracle: Address) {
        self.fallback_oracles.insert(oracle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_list_is_idempotent() {
        let mut watcher = WatchList::default();
        let addr = Address::repeat_byte(0x11);
        watcher.watch_aggregator(addr);
        watcher.watch_aggregator(addr);
        watcher.watch_fallback_oracle(addr);
        watcher.watch_fallback_oracle(addr);
        assert_eq!(watcher.aggregators.len(), 1);
        assert_eq!(watcher.fallback_oracles.len(), 1);
    }
}
