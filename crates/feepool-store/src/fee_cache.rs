// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - FEE CACHE
//
// Per-asset pool of collected fees, stored as a short history of
// "cumulative pool value as of block N" so a reorg can restore the value
// any recent block left behind.
//
// Lifecycle of one asset:
// 1. add_fee appends (block, pool + fee), replacing an entry for the same block
// 2. history older than max_history_depth is pruned, keeping at least one entry
// 3. once the pool reaches the distribution threshold it is paid out to
//    holders of the settlement currency, recorded in the fee history and
//    reset to zero at that block
// 4. on reorg, roll_back_cache drops every entry at or above the cutoff
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use feepool_core::codec::{cache_key, decode_cache_history, encode_cache_history};
use feepool_core::{
    distribution_threshold, AssetId, AssetRegistry, BalanceLedger, BlockHeight, CacheHistory,
    FeeConfig, Namespace, ReceiverSelector, Recipients, SupplySource, DISTRIBUTION_LABEL,
};
use sled::Tree;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::{dump_tree, LedgerCounters, LedgerStats};
use crate::fault::FeeFault;
use crate::fee_history::FeeHistory;

/// External services the fee cache depends on.
#[derive(Clone)]
pub struct FeeCollaborators {
    pub supply: Arc<dyn SupplySource>,
    pub receivers: Arc<dyn ReceiverSelector>,
    /// Balance tally. The lock is held for the whole of a distribution.
    pub tally: Arc<Mutex<dyn BalanceLedger>>,
    pub registry: Arc<dyn AssetRegistry>,
}

pub struct FeeCache {
    tree: Tree,
    config: FeeConfig,
    /// Latest threshold per asset. Derived from total supply, not persisted.
    thresholds: HashMap<AssetId, i64>,
    history: Arc<FeeHistory>,
    collab: FeeCollaborators,
    counters: LedgerCounters,
}

impl FeeCache {
    pub fn new(
        tree: Tree,
        config: FeeConfig,
        history: Arc<FeeHistory>,
        collab: FeeCollaborators,
    ) -> Self {
        Self {
            tree,
            config,
            thresholds: HashMap::new(),
            history,
            collab,
            counters: LedgerCounters::default(),
        }
    }

    pub fn history(&self) -> &Arc<FeeHistory> {
        &self.history
    }

    // ─────────────────────────────────────────────────────────────
    // THRESHOLDS
    // ─────────────────────────────────────────────────────────────

    /// Last computed threshold, 0 if never computed.
    pub fn get_distribution_threshold(&self, asset_id: AssetId) -> i64 {
        self.thresholds.get(&asset_id).copied().unwrap_or(0)
    }

    /// Recompute the threshold of an asset after its supply changed.
    pub fn update_distribution_threshold(&mut self, asset_id: AssetId) {
        let supply = self.collab.supply.total_supply(asset_id);
        let threshold = distribution_threshold(supply, self.config.fee_threshold_divisor);
        self.thresholds.insert(asset_id, threshold);
    }

    /// Recompute thresholds of every allocated asset in both namespaces.
    pub fn rebuild_thresholds(&mut self) {
        for namespace in Namespace::ALL {
            let end = self.collab.registry.next_asset_id(namespace);
            for asset_id in namespace.first_asset()..end {
                self.update_distribution_threshold(asset_id);
            }
        }
        log::info!("Rebuilt fee distribution thresholds for {} assets", self.thresholds.len());
    }

    // ─────────────────────────────────────────────────────────────
    // READS
    // ─────────────────────────────────────────────────────────────

    /// Decoded history of an asset, ascending by block. Malformed pairs are
    /// logged and left out.
    pub fn cache_history(&self, asset_id: AssetId) -> Result<CacheHistory, FeeFault> {
        let key = cache_key(asset_id);
        let Some(value) = self.tree.get(key.as_bytes())? else {
            return Ok(CacheHistory::new());
        };
        self.counters.record_read();
        let raw = String::from_utf8_lossy(&value);
        let (history, errors) = decode_cache_history(&raw);
        for e in errors {
            log::warn!("Fee cache entry for property {}: {}", asset_id, e);
        }
        Ok(history)
    }

    /// Pool value of the most recent history entry, 0 for an asset that
    /// never collected a fee.
    pub fn get_cached_amount(&self, asset_id: AssetId) -> Result<i64, FeeFault> {
        Ok(self
            .cache_history(asset_id)?
            .last_key_value()
            .map(|(_, amount)| *amount)
            .unwrap_or(0))
    }

    // ─────────────────────────────────────────────────────────────
    // WRITES
    // ─────────────────────────────────────────────────────────────

    fn write_history(&self, asset_id: AssetId, history: &CacheHistory) -> Result<(), FeeFault> {
        let key = cache_key(asset_id);
        let value = encode_cache_history(history);
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.counters.record_write();
        log::trace!("Fee cache for property {} now [{}]", asset_id, value);
        Ok(())
    }

    /// Add a collected fee to an asset's pool at `block`, then prune and
    /// distribute if the pool reached its threshold.
    pub fn add_fee(
        &self,
        asset_id: AssetId,
        block: BlockHeight,
        amount: i64,
    ) -> Result<(), FeeFault> {
        log::debug!(
            "Starting AddFee for property {} (block {} amount {})",
            asset_id,
            block,
            amount
        );
        if amount < 0 {
            return Err(FeeFault::NegativeFee {
                asset_id,
                block,
                amount,
            });
        }

        let mut history = self.cache_history(asset_id)?;
        let cached = history
            .last_key_value()
            .map(|(_, amount)| *amount)
            .unwrap_or(0);

        // The pool is bounded by total supply; overflow means corrupted state.
        if cached > 0 && amount > i64::MAX - cached {
            return Err(self.trip(FeeFault::CacheOverflow {
                asset_id,
                block,
                cached,
                amount,
            }));
        }

        let new_cached = cached + amount;
        history.insert(block, new_cached);
        self.write_history(asset_id, &history)?;
        log::debug!(
            "AddFee completed for property {} (cached {} -> {})",
            asset_id,
            cached,
            new_cached
        );

        self.prune_cache(asset_id, block)?;
        self.eval_cache(asset_id, block)
    }

    /// Reset an asset's pool to zero at `block`.
    pub fn clear_cache(&self, asset_id: AssetId, block: BlockHeight) -> Result<(), FeeFault> {
        let mut history = self.cache_history(asset_id)?;
        history.insert(block, 0);
        self.write_history(asset_id, &history)?;
        self.prune_cache(asset_id, block)?;
        log::debug!("Cleared fee cache for property {} block {}", asset_id, block);
        Ok(())
    }

    /// Drop entries more than `max_history_depth` blocks below `block`.
    /// The most recent entry survives even if it is that old.
    pub fn prune_cache(&self, asset_id: AssetId, block: BlockHeight) -> Result<(), FeeFault> {
        let prune_block = block.saturating_sub(self.config.max_history_depth);
        let mut history = self.cache_history(asset_id)?;

        let Some((&oldest, _)) = history.first_key_value() else {
            return Ok(());
        };
        if oldest >= prune_block {
            return Ok(());
        }

        let latest = history
            .last_key_value()
            .map(|(b, a)| (*b, *a));
        let mut retained = history.split_off(&prune_block);
        let mut removed = history.len();
        if retained.is_empty() {
            if let Some((latest_block, latest_amount)) = latest {
                log::debug!(
                    "All fee cache entries of property {} matured, keeping block {}",
                    asset_id,
                    latest_block
                );
                retained.insert(latest_block, latest_amount);
                removed -= 1;
            }
        }
        log::debug!(
            "Pruned {} fee cache entries of property {} below block {}",
            removed,
            asset_id,
            prune_block
        );
        self.write_history(asset_id, &retained)
    }

    /// Roll every asset back to the state before `block` was connected.
    /// Entries at or above `block` are removed.
    pub fn roll_back_cache(&self, block: BlockHeight) -> Result<(), FeeFault> {
        for namespace in Namespace::ALL {
            let end = self.collab.registry.next_asset_id(namespace);
            for asset_id in namespace.first_asset()..end {
                let mut history = self.cache_history(asset_id)?;
                match history.last_key_value() {
                    None => continue,
                    Some((&latest, _)) if latest < block => continue,
                    Some(_) => {}
                }
                history.retain(|entry_block, _| *entry_block < block);
                self.write_history(asset_id, &history)?;
                log::info!(
                    "Rolling back fee cache for property {}, new=[{}]",
                    asset_id,
                    encode_cache_history(&history)
                );
            }
        }
        Ok(())
    }

    /// Roll back the fee cache and the fee history with the same cutoff.
    pub fn roll_back(&self, block: BlockHeight) -> Result<(), FeeFault> {
        self.roll_back_cache(block)?;
        let removed = self.history.roll_back_history(block)?;
        log::info!(
            "Rolled back fee state to before block {} ({} distributions removed)",
            block,
            removed
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // DISTRIBUTION
    // ─────────────────────────────────────────────────────────────

    /// Distribute the pool if it reached the asset's threshold. An asset
    /// whose threshold was never computed has threshold 0, so any
    /// non-empty pool distributes.
    pub fn eval_cache(&self, asset_id: AssetId, block: BlockHeight) -> Result<(), FeeFault> {
        let threshold = self.get_distribution_threshold(asset_id);
        if self.get_cached_amount(asset_id)? >= threshold {
            self.distribute_cache(asset_id, block)?;
        }
        Ok(())
    }

    /// Pay the whole pool out to holders of the settlement currency.
    ///
    /// Runs with the balance tally locked, so credits, the history record
    /// and the cache reset become visible together.
    pub fn distribute_cache(&self, asset_id: AssetId, block: BlockHeight) -> Result<(), FeeFault> {
        let mut tally = self.collab.tally.lock().map_err(|_| FeeFault::LockPoisoned)?;

        let cached = self.get_cached_amount(asset_id)?;
        if cached == 0 {
            log::info!(
                "Aborting fee distribution for property {}, the fee cache is empty",
                asset_id
            );
            return Ok(());
        }

        let settlement = Namespace::of(asset_id).settlement_asset();
        let mut receivers =
            self.collab
                .receivers
                .select_receivers(DISTRIBUTION_LABEL, settlement, cached);
        receivers.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        log::info!(
            "Starting fee distribution for property {} to {} recipients",
            asset_id,
            receivers.len()
        );

        let mut sent: i64 = 0;
        let mut recipients = Recipients::new();
        for (amount, address) in receivers {
            if !tally.credit_balance(&address, asset_id, amount) {
                return Err(self.trip(FeeFault::CreditFailed {
                    asset_id,
                    address,
                    amount,
                }));
            }
            sent = match sent.checked_add(amount) {
                Some(total) => total,
                None => {
                    return Err(self.trip(FeeFault::DistributionMismatch {
                        asset_id,
                        distributed: i64::MAX,
                        cached,
                    }))
                }
            };
            log::trace!(
                "  {} receives {} (running total {} of {})",
                address,
                amount,
                sent,
                cached
            );
            *recipients.entry(address).or_insert(0) += amount;
        }

        if sent != cached {
            return Err(self.trip(FeeFault::DistributionMismatch {
                asset_id,
                distributed: sent,
                cached,
            }));
        }
        log::info!(
            "Fee distribution completed, distributed {} out of {}",
            sent,
            cached
        );

        self.history
            .record_fee_distribution(asset_id, block, sent, &recipients)?;
        self.clear_cache(asset_id, block)
    }

    // ─────────────────────────────────────────────────────────────
    // FATAL FAULTS
    // ─────────────────────────────────────────────────────────────

    /// Discard persisted state for faults that need a rebuild, unless the
    /// operator asked to keep it, and hand the fault back to the caller.
    fn trip(&self, fault: FeeFault) -> FeeFault {
        log::error!("{}", fault);
        if !fault.requires_rebuild() {
            return fault;
        }
        if self.config.override_forced_shutdown {
            log::warn!("Forced shutdown overridden, leaving persisted state on disk");
            return fault;
        }
        if let Err(e) = self.tree.clear() {
            log::error!("Failed to clear fee cache: {}", e);
        }
        if let Some(persist_dir) = &self.config.persist_dir {
            if persist_dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(persist_dir) {
                    log::error!(
                        "Failed to remove persisted state at {}: {}",
                        persist_dir.display(),
                        e
                    );
                }
            }
        }
        fault
    }

    // ─────────────────────────────────────────────────────────────
    // DIAGNOSTICS
    // ─────────────────────────────────────────────────────────────

    pub fn stats(&self) -> LedgerStats {
        self.counters.snapshot()
    }

    pub fn dump(&self) -> Result<Vec<(String, String)>, FeeFault> {
        Ok(dump_tree("fee cache", &self.tree)?)
    }
}
