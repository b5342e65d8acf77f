// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - NODE HOOKS
//
// Entry points the block-processing thread calls. Ledger faults never come
// back to the node as errors: they stop the process here.
//
// Usage from block connection:
//   engine.on_fee(asset, height, fee)       per fee-generating event
//   engine.on_block_connected(height)       once the block is applied
//   engine.on_block_disconnected(height)    when the block is undone
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub use feepool_core;
pub use feepool_store;

use feepool_core::{AssetId, BlockHeight, FeeConfig};
use feepool_store::{
    abort_node, open_ledgers, FeeCache, FeeCollaborators, FeeDatabase, FeeFault, FeeHistory,
};
use std::path::Path;

pub struct FeeEngine {
    db: FeeDatabase,
    cache: FeeCache,
}

impl FeeEngine {
    /// Open the fee database at `path` and compute every asset's
    /// distribution threshold.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: FeeConfig,
        collab: FeeCollaborators,
    ) -> Result<Self, String> {
        let db = FeeDatabase::open(path)?;
        let mut cache = open_ledgers(&db, config, collab)?;
        cache.rebuild_thresholds();
        Ok(Self { db, cache })
    }

    pub fn cache(&self) -> &FeeCache {
        &self.cache
    }

    pub fn history(&self) -> &FeeHistory {
        self.cache.history()
    }

    /// Total supply of `asset_id` changed (issuance, burn, new asset).
    pub fn on_supply_change(&mut self, asset_id: AssetId) {
        self.cache.update_distribution_threshold(asset_id);
    }

    pub fn on_fee(&self, asset_id: AssetId, block: BlockHeight, amount: i64) {
        let result = self.cache.add_fee(asset_id, block, amount);
        Self::or_abort(result);
    }

    /// Make the block's fee writes durable.
    pub fn on_block_connected(&self, block: BlockHeight) {
        if let Err(e) = self.db.flush() {
            Self::or_abort(Err(FeeFault::Storage(format!("block {}: {}", block, e))));
        }
    }

    /// Undo every fee effect of `block` and above.
    pub fn on_block_disconnected(&self, block: BlockHeight) {
        log::info!("Block {} disconnected, rolling back fee state", block);
        Self::or_abort(self.cache.roll_back(block));
        self.on_block_connected(block);
    }

    fn or_abort(result: Result<(), FeeFault>) {
        if let Err(fault) = result {
            abort_node(&fault);
        }
    }
}
