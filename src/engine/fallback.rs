//! Fallback Coordinator
//!
//! Keeps `tokens_needing_fallback` equal to the set of assets whose
//! fallback flag is raised or whose price source is unset, and drives
//! the re-pricing walk when a new fallback oracle is configured.

use ethers::types::{Address, U256};
use tracing::{error, warn};

use crate::gateway::{AddressWatcher, PriceSourceGateway, Reverted};
use crate::store::{AssetPriceRecord, EntityStore, PriceOracle};
use crate::types::{address_hex, format_usd_eth_price, EventContext};

use super::ReconciliationEngine;

/// Reconcile the asset's membership in the fallback set: out when the
/// source is registered and healthy, in when the source is unset or the
/// fallback flag is raised.
pub(super) fn reconcile_fallback_set(oracle: &mut PriceOracle, record: &AssetPriceRecord) {
    if !record.price_source.is_zero() && !record.fallback_required {
        oracle.tokens_needing_fallback.remove(&record.id);
    }
    if record.price_source.is_zero() || record.fallback_required {
        oracle.tokens_needing_fallback.insert(record.id);
    }
}

impl<S, G, W> ReconciliationEngine<S, G, W>
where
    S: EntityStore,
    G: PriceSourceGateway,
    W: AddressWatcher,
{
    /// Re-price every asset currently on fallback from the primary
    /// provider (which now serves the new fallback's answers). Assets
    /// whose fetch still reverts are logged and left stale; membership
    /// itself is not recomputed here.
    pub(super) fn push_price_to_fallback_set(&mut self, ctx: &EventContext) {
        let oracle = self.get_or_init_oracle();
        let primary = oracle.primary_source;
        let fallback = oracle.fallback_source;

        for token in oracle.tokens_needing_fallback.iter().copied() {
            let record = self.get_or_init_asset(token);
            if !record.price_source.is_zero() && !record.fallback_required {
                continue;
            }
            match self.gateway.asset_price(primary, token) {
                Ok(price) => self.commit_price(record, price, primary, ctx),
                Err(Reverted) => {
                    error!(
                        "fallback re-price reverted, leaving stale: asset {} provider {} fallback {}",
                        address_hex(&token),
                        address_hex(&primary),
                        address_hex(&fallback)
                    );
                }
            }
        }
    }

    /// Pull the USD/base-pair price from the newly configured fallback
    /// oracle and commit it when the USD base price is itself
    /// fallback-dependent or has no main source yet. Dev networks expose
    /// a dedicated accessor; everywhere else the general asset-price
    /// accessor is scaled by the fixed conversion.
    pub(super) fn reconcile_usd_base_price(&mut self, fallback: Address, ctx: &EventContext) {
        let oracle = self.get_or_init_oracle();

        let eth_usd = match self.gateway.eth_usd_price(fallback) {
            Ok(price) => price,
            Err(Reverted) => {
                match self
                    .gateway
                    .fallback_asset_price(fallback, self.config.usd_base_unit)
                {
                    Ok(price) => format_usd_eth_price(price),
                    Err(Reverted) => {
                        warn!(
                            "fallback oracle has no usd price accessor: fallback {}",
                            address_hex(&fallback)
                        );
                        U256::zero()
                    }
                }
            }
        };

        if oracle.usd_base_fallback_required || oracle.usd_base_main_source.is_zero() {
            self.commit_usd_base_price(oracle, eth_usd, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AssetPriceRecord, PriceOracle};

    fn record(source_byte: u8, fallback_required: bool) -> AssetPriceRecord {
        let mut record = AssetPriceRecord::new(Address::repeat_byte(0xaa));
        if source_byte != 0 {
            record.price_source = Address::repeat_byte(source_byte);
        }
        record.fallback_required = fallback_required;
        record
    }

    #[test]
    fn test_healthy_source_leaves_the_set() {
        let mut oracle = PriceOracle::new(1);
        let record = record(0xbb, false);
        oracle.tokens_needing_fallback.insert(record.id);

        reconcile_fallback_set(&mut oracle, &record);
        assert!(!oracle.tokens_needing_fallback.contains(&record.id));
    }

    #[test]
    fn test_fallback_required_joins_the_set() {
        let mut oracle = PriceOracle::new(1);
        let record = record(0xbb, true);

        reconcile_fallback_set(&mut oracle, &record);
        reconcile_fallback_set(&mut oracle, &record);
        assert_eq!(oracle.tokens_needing_fallback.len(), 1);
    }

    #[test]
    fn test_unset_source_joins_the_set() {
        let mut oracle = PriceOracle::new(1);
        let record = record(0, false);

        reconcile_fallback_set(&mut oracle, &record);
        assert!(oracle.tokens_needing_fallback.contains(&record.id));
    }
}
