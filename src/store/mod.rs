//! Entity records and the abstract store
//!
//! The engine reads and writes all state through `EntityStore`:
//! address/string-keyed records with idempotent upsert semantics.
//! Persistence and indexing of these records for downstream consumers
//! live behind this seam; `MemoryStore` is the in-process
//! implementation.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::types::{FeedType, UpdateStamp};

/// Process-wide oracle configuration singleton.
///
/// Created lazily on the first event, mutated by every reconciliation
/// step, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOracle {
    /// Deployment protocol version (>= 1); selects the reconciliation
    /// pipeline.
    pub version: u32,
    /// Primary price-proxy contract, adopted from the first asset-source
    /// event's emitter.
    pub primary_source: Address,
    /// Currently configured fallback oracle (zero when unset).
    pub fallback_source: Address,
    /// Main source currently pricing the USD base unit.
    pub usd_base_main_source: Address,
    /// Whether the USD base-unit price must be served from fallback.
    pub usd_base_fallback_required: bool,
    /// Latest committed USD base-unit price.
    pub usd_base_price: U256,
    /// Assets whose composite price depends on the USD base unit.
    pub usd_dependent_assets: BTreeSet<Address>,
    /// Assets whose price must currently be served from fallback:
    /// fallback required or no price source registered.
    pub tokens_needing_fallback: BTreeSet<Address>,
    pub last_update: UpdateStamp,
}

impl PriceOracle {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            primary_source: Address::zero(),
            fallback_source: Address::zero(),
            usd_base_main_source: Address::zero(),
            usd_base_fallback_required: false,
            usd_base_price: U256::zero(),
            usd_dependent_assets: BTreeSet::new(),
            tokens_needing_fallback: BTreeSet::new(),
            last_update: UpdateStamp::default(),
        }
    }
}

/// Per-asset price state, keyed by the asset address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPriceRecord {
    pub id: Address,
    pub feed_type: FeedType,
    /// Aggregator currently pricing this asset (zero when unset).
    pub price_source: Address,
    pub fallback_required: bool,
    /// Assets whose composite price depends on this one.
    pub dependent_assets: BTreeSet<Address>,
    /// Set when a per-asset aggregator-registry event owns this asset,
    /// so the legacy v1 routine skips it.
    pub from_aggregator_registry: bool,
    pub price: U256,
    pub last_update: UpdateStamp,
}

impl AssetPriceRecord {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            feed_type: FeedType::default(),
            price_source: Address::zero(),
            fallback_required: false,
            dependent_assets: BTreeSet::new(),
            from_aggregator_registry: false,
            price: U256::zero(),
            last_update: UpdateStamp::default(),
        }
    }
}

/// Maps an external aggregator contract back to the asset it currently
/// prices, so aggregator-level updates can be re-associated. Stale
/// bindings are never deleted; an orphaned binding is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorBinding {
    pub aggregator: Address,
    pub asset: Address,
}

/// Legacy name-registry lookup entry, keyed by the namehash node of a
/// constructed label path. Kept for backward compatibility with older
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityNameRecord {
    pub node: String,
    pub aggregator: Address,
    pub underlying: Address,
    pub symbol: String,
}

/// Static wrapped-native-asset descriptor, set from a dedicated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseUnitRecord {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub last_update: UpdateStamp,
}

impl BaseUnitRecord {
    /// Descriptor values are fixed by the protocol deployment.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            name: "WEthereum".to_string(),
            symbol: "WETH".to_string(),
            decimals: 18,
            last_update: UpdateStamp::default(),
        }
    }
}

/// Abstract record store the engine runs against.
///
/// Loads return an owned copy (or `None` when the record was never
/// committed); puts are idempotent upserts keyed by the record's id.
pub trait EntityStore {
    fn oracle(&self) -> Option<PriceOracle>;
    fn put_oracle(&mut self, oracle: PriceOracle);

    fn asset(&self, id: &Address) -> Option<AssetPriceRecord>;
    fn put_asset(&mut self, asset: AssetPriceRecord);

    fn aggregator_binding(&self, aggregator: &Address) -> Option<AggregatorBinding>;
    fn put_aggregator_binding(&mut self, binding: AggregatorBinding);

    fn name_record(&self, node: &str) -> Option<CompatibilityNameRecord>;
    fn put_name_record(&mut self, record: CompatibilityNameRecord);

    fn base_unit(&self) -> Option<BaseUnitRecord>;
    fn put_base_unit(&mut self, record: BaseUnitRecord);
}

/// In-process store implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    oracle: Option<PriceOracle>,
    assets: HashMap<Address, AssetPriceRecord>,
    bindings: HashMap<Address, AggregatorBinding>,
    name_records: HashMap<String, CompatibilityNameRecord>,
    base_unit: Option<BaseUnitRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed asset records, for downstream readers.
    pub fn asset_records(&self) -> impl Iterator<Item = &AssetPriceRecord> {
        self.assets.values()
    }

    /// All committed compatibility name records.
    pub fn compatibility_records(&self) -> impl Iterator<Item = &CompatibilityNameRecord> {
        self.name_records.values()
    }
}

impl EntityStore for MemoryStore {
    fn oracle(&self) -> Option<PriceOracle> {
        self.oracle.clone()
    }

    fn put_oracle(&mut self, oracle: PriceOracle) {
        self.oracle = Some(oracle);
    }

    fn asset(&self, id: &Address) -> Option<AssetPriceRecord> {
        self.assets.get(id).cloned()
    }

    fn put_asset(&mut self, asset: AssetPriceRecord) {
        self.assets.insert(asset.id, asset);
    }

    fn aggregator_binding(&self, aggregator: &Address) -> Option<AggregatorBinding> {
        self.bindings.get(aggregator).copied()
    }

    fn put_aggregator_binding(&mut self, binding: AggregatorBinding) {
        self.bindings.insert(binding.aggregator, binding);
    }

    fn name_record(&self, node: &str) -> Option<CompatibilityNameRecord> {
        self.name_records.get(node).cloned()
    }

    fn put_name_record(&mut self, record: CompatibilityNameRecord) {
        self.name_records.insert(record.node.clone(), record);
    }

    fn base_unit(&self) -> Option<BaseUnitRecord> {
        self.base_unit.clone()
    }

    fn put_base_unit(&mut self, record: BaseUnitRecord) {
        self.base_unit = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_record_defaults() {
        let id = Address::repeat_byte(0xaa);
        let record = AssetPriceRecord::new(id);
        assert_eq!(record.feed_type, FeedType::Simple);
        assert_eq!(record.price_source, Address::zero());
        assert!(!record.fallback_required);
        assert!(!record.from_aggregator_registry);
        assert!(record.dependent_assets.is_empty());
        assert_eq!(record.price, U256::zero());
    }

    #[test]
    fn test_store_upsert_overwrites() {
        let mut store = MemoryStore::new();
        let id = Address::repeat_byte(0xaa);

        let mut record = AssetPriceRecord::new(id);
        store.put_asset(record.clone());
        record.price = U256::from(42u64);
        store.put_asset(record);

        let loaded = store.asset(&id).expect("record committed");
        assert_eq!(loaded.price, U256::from(42u64));
        assert_eq!(store.asset_records().count(), 1);
    }

    #[test]
    fn test_binding_rebinds_to_new_asset() {
        let mut store = MemoryStore::new();
        let aggregator = Address::repeat_byte(0xbb);

        store.put_aggregator_binding(AggregatorBinding {
            aggregator,
            asset: Address::repeat_byte(0x01),
        });
        store.put_aggregator_binding(AggregatorBinding {
            aggregator,
            asset: Address::repeat_byte(0x02),
        });

        let binding = store.aggregator_binding(&aggregator).expect("bound");
        assert_eq!(binding.asset, Address::repeat_byte(0x02));
    }

    #[test]
    fn test_oracle_is_singleton() {
        let mut store = MemoryStore::new();
        assert!(store.oracle().is_none());
        store.put_oracle(PriceOracle::new(1));
        store.put_oracle(PriceOracle::new(2));
        assert_eq!(store.oracle().expect("committed").version, 2);
    }
}
