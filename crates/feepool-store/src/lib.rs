// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - FEE LEDGERS
//
// sled-backed fee cache and fee distribution history. Both ledgers are
// driven by the single block-processing thread; connecting a block calls
// `FeeCache::add_fee`, disconnecting one calls `FeeCache::roll_back`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod db;
pub mod fault;
pub mod fee_cache;
pub mod fee_history;
pub mod testing;

pub use db::{FeeDatabase, LedgerStats};
pub use fault::{abort_node, FeeFault};
pub use fee_cache::{FeeCache, FeeCollaborators};
pub use fee_history::FeeHistory;

use feepool_core::FeeConfig;
use std::sync::Arc;

/// Open both ledgers on an already opened database.
pub fn open_ledgers(
    db: &FeeDatabase,
    config: FeeConfig,
    collab: FeeCollaborators,
) -> Result<FeeCache, String> {
    config.validate()?;
    let history = Arc::new(FeeHistory::new(db.fee_history_tree()?));
    Ok(FeeCache::new(db.fee_cache_tree()?, config, history, collab))
}
