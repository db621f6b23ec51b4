//! Dependency Graph Tracker
//!
//! Maintains the sub-token -> dependent edges for composite assets and
//! the USD-dependent set on the oracle singleton. Registration is one
//! hop: nothing walks `dependent_assets` transitively.

use ethers::types::Address;

use crate::gateway::{AddressWatcher, PriceSourceGateway};
use crate::store::{EntityStore, PriceOracle};

use super::ReconciliationEngine;

impl<S, G, W> ReconciliationEngine<S, G, W>
where
    S: EntityStore,
    G: PriceSourceGateway,
    W: AddressWatcher,
{
    /// Record that `dependent`'s composite price depends on `sub_token`.
    ///
    /// The USD base unit is tracked on the oracle singleton; any other
    /// sub-token gets (or lazily becomes) an asset record carrying the
    /// edge. Both inserts are idempotent.
    pub(super) fn register_dependency(
        &mut self,
        dependent: Address,
        sub_token: Address,
        oracle: &mut PriceOracle,
    ) {
        if sub_token == self.config.usd_base_unit {
            oracle.usd_dependent_assets.insert(dependent);
        } else {
            let mut sub_record = self.get_or_init_asset(sub_token);
            sub_record.dependent_assets.insert(dependent);
            self.store.put_asset(sub_record);
        }
    }
}
