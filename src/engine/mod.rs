//! Reconciliation Engine
//!
//! Entry points for every oracle event kind. Each event is processed to
//! completion before the next one; external reads are synchronous and a
//! revert is terminal for that read within the current event. Event
//! ordering is an upstream precondition: the engine assumes events
//! arrive in chain order and never reorders or batches them.
//!
//! No failure here is fatal. Rejected or degraded paths are signaled
//! through the log channel only, and the engine stays ready for the
//! next event.

mod classify;
mod deps;
mod fallback;

use ethers::types::{Address, U256};
use tracing::{error, warn};

use crate::config::EngineConfig;
use crate::gateway::{AddressWatcher, PriceSourceGateway, Reverted};
use crate::store::{AggregatorBinding, AssetPriceRecord, BaseUnitRecord, EntityStore, PriceOracle};
use crate::types::{
    address_hex, format_usd_eth_price, is_degenerate_address, EventContext, FeedType, UpdateStamp,
};

/// Price-source reconciliation engine.
///
/// Owns its store, gateway, and watcher seams; the oracle singleton is
/// created lazily on the first event and threaded through every
/// operation.
pub struct ReconciliationEngine<S, G, W> {
    store: S,
    gateway: G,
    watcher: W,
    config: EngineConfig,
}

impl<S, G, W> ReconciliationEngine<S, G, W>
where
    S: EntityStore,
    G: PriceSourceGateway,
    W: AddressWatcher,
{
    pub fn new(store: S, gateway: G, watcher: W, config: EngineConfig) -> Self {
        Self {
            store,
            gateway,
            watcher,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn watcher(&self) -> &W {
        &self.watcher
    }

    /// Idempotent upsert of the static base-unit descriptor.
    /// Version-independent.
    pub fn on_base_unit_set(&mut self, address: Address, ctx: &EventContext) {
        let mut record = self
            .store
            .base_unit()
            .unwrap_or_else(|| BaseUnitRecord::new(address));
        record.address = address;
        record.last_update = UpdateStamp::at(ctx);
        self.store.put_base_unit(record);
    }

    /// A new fallback oracle was configured. Non-zero addresses are
    /// watched, then every asset currently on fallback is re-priced from
    /// the primary provider and the USD base price is reconciled. A zero
    /// address leaves the fallback dependency recorded but unusable.
    pub fn on_fallback_oracle_changed(&mut self, new_fallback: Address, ctx: &EventContext) {
        let mut oracle = self.get_or_init_oracle();
        oracle.fallback_source = new_fallback;
        self.store.put_oracle(oracle);

        if new_fallback.is_zero() {
            return;
        }
        self.watcher.watch_fallback_oracle(new_fallback);
        self.push_price_to_fallback_set(ctx);
        self.reconcile_usd_base_price(new_fallback, ctx);
    }

    /// The primary oracle announced a new price source for an asset.
    /// Dispatches to the legacy v1 routine or the full v2+ pipeline
    /// depending on the deployed protocol version.
    pub fn on_asset_source_updated(&mut self, asset: Address, source: Address, ctx: &EventContext) {
        if is_degenerate_address(&asset) {
            warn!("skipping malformed asset registration {}", address_hex(&asset));
            return;
        }

        let mut oracle = self.get_or_init_oracle();
        if oracle.primary_source.is_zero() {
            oracle.primary_source = ctx.emitter;
        }
        let record = self.get_or_init_asset(asset);

        if oracle.version > 1 {
            self.price_feed_updated(asset, source, record, oracle, ctx);
        } else if !record.from_aggregator_registry {
            self.legacy_aggregator_updated(asset, source, record, oracle, ctx);
        }
        // otherwise a separate aggregator-registry event already owns
        // this asset and the legacy routine must not double-process it
    }

    /// Per-asset aggregator-registry event. Only a v1 deployment routes
    /// it into the legacy pipeline; under version > 1 the dedicated
    /// source-update event is the sole authority and this is rejected as
    /// an upstream misconfiguration.
    pub fn on_aggregator_registry_updated(
        &mut self,
        asset: Address,
        aggregator: Address,
        ctx: &EventContext,
    ) {
        let oracle = self.get_or_init_oracle();
        let mut record = self.get_or_init_asset(asset);
        record.from_aggregator_registry = true;

        if oracle.version == 1 {
            self.legacy_aggregator_updated(asset, aggregator, record, oracle, ctx);
        } else {
            error!(
                "aggregator registry event rejected for oracle version {}: asset {} aggregator {}",
                oracle.version,
                address_hex(&asset),
                address_hex(&aggregator)
            );
        }
    }

    /// v2+ pipeline: full classification with proxy indirection and
    /// compatibility-record creation. Aborts without touching
    /// price-source fields when the primary price fetch reverts.
    fn price_feed_updated(
        &mut self,
        asset: Address,
        source: Address,
        mut record: AssetPriceRecord,
        mut oracle: PriceOracle,
        ctx: &EventContext,
    ) {
        let price = match self.gateway.asset_price(oracle.primary_source, asset) {
            Ok(price) => price,
            Err(Reverted) => {
                error!(
                    "asset is not registered with the price provider: asset {} source {}",
                    address_hex(&asset),
                    address_hex(&source)
                );
                self.abort_fallback_required(record, oracle);
                return;
            }
        };

        // pessimistic until classification proves the feed healthy
        record.fallback_required = true;

        if source.is_zero() {
            // nothing to classify; the asset sits on fallback until a
            // real source shows up
            fallback::reconcile_fallback_set(&mut oracle, &record);
            self.store.put_asset(record);
            self.store.put_oracle(oracle);
            return;
        }

        if !self.classify(&mut record, &mut oracle, asset, source) {
            self.abort_fallback_required(record, oracle);
            return;
        }

        if asset == self.config.usd_base_unit {
            oracle.usd_base_fallback_required = record.fallback_required;
            oracle.usd_base_main_source = record.price_source;
            self.store.put_asset(record);
            self.commit_usd_base_price(oracle, format_usd_eth_price(price), ctx);
        } else {
            fallback::reconcile_fallback_set(&mut oracle, &record);
            let primary = oracle.primary_source;
            self.store.put_oracle(oracle);
            self.commit_price(record, price, primary, ctx);
        }
    }

    /// Legacy v1 routine: no proxy indirection, no compatibility
    /// records, and a reverted primary price probe stores zero instead
    /// of aborting (one wrong mainnet registration requires this).
    fn legacy_aggregator_updated(
        &mut self,
        asset: Address,
        source: Address,
        mut record: AssetPriceRecord,
        mut oracle: PriceOracle,
        ctx: &EventContext,
    ) {
        let price = self
            .gateway
            .asset_price(oracle.primary_source, asset)
            .unwrap_or_default();

        record.fallback_required = true;

        if !source.is_zero() {
            if let Ok(feed_type) = self.gateway.token_type(source) {
                record.feed_type = feed_type;
            }

            match record.feed_type {
                FeedType::Simple => {
                    // probe the provided source directly; the provider's
                    // answer may already come from fallback
                    record.fallback_required = match self.gateway.latest_answer(source) {
                        Ok(answer) => answer.is_zero(),
                        Err(Reverted) => true,
                    };
                }
                FeedType::Composite => {
                    // composite prices work out of the box from their
                    // sub-token prices
                    record.fallback_required = false;
                    for sub_token in self.gateway.sub_tokens(source) {
                        self.register_dependency(asset, sub_token, &mut oracle);
                    }
                }
            }

            self.store.put_aggregator_binding(AggregatorBinding {
                aggregator: source,
                asset,
            });
        }

        record.price_source = source;

        if asset == self.config.usd_base_unit {
            oracle.usd_base_fallback_required = record.fallback_required;
            oracle.usd_base_main_source = source;
            self.store.put_asset(record);
            self.commit_usd_base_price(oracle, format_usd_eth_price(price), ctx);
        } else {
            fallback::reconcile_fallback_set(&mut oracle, &record);
            let primary = oracle.primary_source;
            self.store.put_oracle(oracle);
            self.commit_price(record, price, primary, ctx);
        }
    }

    /// Abort path shared by the v2+ pipeline: the record is left
    /// fallback-required and the fallback set reconciled; price-source
    /// fields stay untouched.
    fn abort_fallback_required(&mut self, mut record: AssetPriceRecord, mut oracle: PriceOracle) {
        record.fallback_required = true;
        fallback::reconcile_fallback_set(&mut oracle, &record);
        self.store.put_asset(record);
        self.store.put_oracle(oracle);
    }

    /// Commit a price with bookkeeping, then refresh each direct
    /// dependent once from the primary provider. Propagation is one
    /// level only: refreshed dependents do not cascade further.
    fn commit_price(
        &mut self,
        mut record: AssetPriceRecord,
        price: U256,
        primary: Address,
        ctx: &EventContext,
    ) {
        record.price = price;
        record.last_update = UpdateStamp::at(ctx);
        let dependents: Vec<Address> = record.dependent_assets.iter().copied().collect();
        self.store.put_asset(record);
        self.refresh_dependents(&dependents, primary, ctx);
    }

    /// Commit the USD base-unit price into the oracle singleton and the
    /// base-unit asset record, then refresh USD-dependent assets once.
    fn commit_usd_base_price(&mut self, mut oracle: PriceOracle, price: U256, ctx: &EventContext) {
        oracle.usd_base_price = price;
        oracle.last_update = UpdateStamp::at(ctx);
        let primary = oracle.primary_source;
        let dependents: Vec<Address> = oracle.usd_dependent_assets.iter().copied().collect();
        self.store.put_oracle(oracle);

        let mut usd_record = self.get_or_init_asset(self.config.usd_base_unit);
        usd_record.price = price;
        usd_record.last_update = UpdateStamp::at(ctx);
        self.store.put_asset(usd_record);

        self.refresh_dependents(&dependents, primary, ctx);
    }

    fn refresh_dependents(&mut self, dependents: &[Address], primary: Address, ctx: &EventContext) {
        for &dependent in dependents {
            match self.gateway.asset_price(primary, dependent) {
                Ok(price) => {
                    let mut record = self.get_or_init_asset(dependent);
                    record.price = price;
                    record.last_update = UpdateStamp::at(ctx);
                    self.store.put_asset(record);
                }
                Err(Reverted) => {
                    warn!(
                        "dependent asset refresh reverted, leaving price stale: asset {}",
                        address_hex(&dependent)
                    );
                }
            }
        }
    }

    fn get_or_init_oracle(&mut self) -> PriceOracle {
        self.store
            .oracle()
            .unwrap_or_else(|| PriceOracle::new(self.config.oracle_version))
    }

    fn get_or_init_asset(&mut self, id: Address) -> AssetPriceRecord {
        self.store
            .asset(&id)
            .unwrap_or_else(|| AssetPriceRecord::new(id))
    }
}
