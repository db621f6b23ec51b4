//! Asset Classifier
//!
//! Decides whether an asset's feed is Simple (direct aggregator behind
//! a proxy) or Composite (derived from sub-token prices), and performs
//! the Simple path's side registrations: aggregator binding, watcher
//! registration, and the legacy compatibility name record.

use ethers::types::Address;
use tracing::{debug, error, warn};

use crate::config::MAKER_SYMBOL;
use crate::gateway::{AddressWatcher, PriceSourceGateway, Reverted};
use crate::namehash::namehash;
use crate::store::{
    AggregatorBinding, AssetPriceRecord, CompatibilityNameRecord, EntityStore, PriceOracle,
};
use crate::types::{address_hex, FeedType};

use super::ReconciliationEngine;

impl<S, G, W> ReconciliationEngine<S, G, W>
where
    S: EntityStore,
    G: PriceSourceGateway,
    W: AddressWatcher,
{
    /// Classify `asset`'s feed from its announced `source` and apply the
    /// type-specific registrations. Returns false when classification
    /// fails (a Simple source that is not a proxy); the caller must not
    /// proceed to mutate price-source fields.
    pub(super) fn classify(
        &mut self,
        record: &mut AssetPriceRecord,
        oracle: &mut PriceOracle,
        asset: Address,
        source: Address,
    ) -> bool {
        // a plain external aggregator reverts here, and the asset keeps
        // its previous (default Simple) type
        if let Ok(feed_type) = self.gateway.token_type(source) {
            record.feed_type = feed_type;
        }

        match record.feed_type {
            FeedType::Simple => {
                let aggregator = match self.gateway.underlying_aggregator(source) {
                    Ok(aggregator) => aggregator,
                    Err(Reverted) => {
                        error!(
                            "simple feed source must be a proxy with an underlying aggregator: \
                             asset {} source {}",
                            address_hex(&asset),
                            address_hex(&source)
                        );
                        return false;
                    }
                };

                record.price_source = aggregator;
                self.watcher.watch_aggregator(aggregator);
                self.upsert_name_record(asset, aggregator);

                // probe latestAnswer on the proxy-bound source, not the
                // provider: the provider's answer could already be
                // served from fallback
                record.fallback_required = match self.gateway.latest_answer(source) {
                    Ok(answer) => answer.is_zero(),
                    Err(Reverted) => true,
                };

                self.store.put_aggregator_binding(AggregatorBinding {
                    aggregator,
                    asset,
                });
            }
            FeedType::Composite => {
                // composite prices work out of the box from their
                // sub-token prices
                record.fallback_required = false;
                record.price_source = source;
                for sub_token in self.gateway.sub_tokens(source) {
                    self.register_dependency(asset, sub_token, oracle);
                }
            }
        }
        true
    }

    /// Upsert the legacy name-registry entry for a Simple asset.
    ///
    /// The display symbol comes from the asset's yield-bearing token
    /// with the historical one-character prefix stripped; the maker
    /// token is pinned to a literal symbol, bypassing the on-chain read.
    fn upsert_name_record(&mut self, asset: Address, aggregator: Address) {
        let symbol = if asset == self.config.maker_token {
            MAKER_SYMBOL.to_string()
        } else {
            match self.gateway.wrapped_token_symbol(asset) {
                Ok(symbol) => symbol.chars().skip(1).collect(),
                Err(Reverted) => {
                    warn!(
                        "symbol read reverted, skipping compatibility record: asset {}",
                        address_hex(&asset)
                    );
                    return;
                }
            }
        };

        let labels = [
            "aggregator".to_string(),
            format!("{}-eth", symbol.to_lowercase()),
            "data".to_string(),
            "eth".to_string(),
        ];
        let node = namehash(&labels);
        debug!(
            "compatibility name node {} for asset {}",
            node,
            address_hex(&asset)
        );

        let mut entry = self
            .store
            .name_record(&node)
            .unwrap_or_else(|| CompatibilityNameRecord {
                node: node.clone(),
                aggregator,
                underlying: asset,
                symbol: symbol.clone(),
            });
        entry.aggregator = aggregator;
        entry.underlying = asset;
        entry.symbol = symbol;
        self.store.put_name_record(entry);
    }
}
