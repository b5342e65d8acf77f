//! In-memory collaborators for exercising the fee ledgers without a node.
//!
//! Deterministic stand-ins for the supply table, the pro-rata receiver
//! algorithm, the balance tally and the asset registry.

use feepool_core::{
    AssetId, AssetRegistry, BalanceLedger, Namespace, ReceiverSelector, SupplySource,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::fee_cache::FeeCollaborators;

/// Total supply table.
#[derive(Debug, Default)]
pub struct FixedSupply {
    supply: Mutex<HashMap<AssetId, i64>>,
}

impl FixedSupply {
    pub fn set(&self, asset_id: AssetId, total: i64) {
        if let Ok(mut supply) = self.supply.lock() {
            supply.insert(asset_id, total);
        }
    }
}

impl SupplySource for FixedSupply {
    fn total_supply(&self, asset_id: AssetId) -> i64 {
        self.supply
            .lock()
            .ok()
            .and_then(|s| s.get(&asset_id).copied())
            .unwrap_or(0)
    }
}

/// Splits a pool across registered holders in proportion to their
/// holdings. Rounding remainder is handed out one unit at a time to the
/// largest holders, so the result always sums to the pool.
#[derive(Debug, Default)]
pub struct ProRataSelector {
    holders: Mutex<HashMap<AssetId, Vec<(String, i64)>>>,
    calls: Mutex<Vec<(String, AssetId, i64)>>,
}

impl ProRataSelector {
    pub fn add_holder(&self, settlement_asset: AssetId, address: &str, holding: i64) {
        if let Ok(mut holders) = self.holders.lock() {
            holders
                .entry(settlement_asset)
                .or_default()
                .push((address.to_string(), holding));
        }
    }

    /// `(label, settlement asset, pool size)` of every request so far.
    pub fn calls(&self) -> Vec<(String, AssetId, i64)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ReceiverSelector for ProRataSelector {
    fn select_receivers(
        &self,
        label: &str,
        settlement_asset: AssetId,
        pool_size: i64,
    ) -> Vec<(i64, String)> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((label.to_string(), settlement_asset, pool_size));
        }
        let mut holders = self
            .holders
            .lock()
            .ok()
            .and_then(|h| h.get(&settlement_asset).cloned())
            .unwrap_or_default();
        holders.retain(|(_, holding)| *holding > 0);
        if holders.is_empty() || pool_size <= 0 {
            return Vec::new();
        }
        holders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let total: i128 = holders.iter().map(|(_, h)| *h as i128).sum();
        let mut shares: Vec<i64> = holders
            .iter()
            .map(|(_, h)| (pool_size as i128 * *h as i128 / total) as i64)
            .collect();
        let mut remainder = pool_size - shares.iter().sum::<i64>();
        let n = shares.len();
        let mut i = 0;
        while remainder > 0 {
            shares[i % n] += 1;
            remainder -= 1;
            i += 1;
        }

        holders
            .into_iter()
            .zip(shares)
            .filter(|(_, share)| *share > 0)
            .map(|((address, _), share)| (share, address))
            .collect()
    }
}

/// Balance tally kept in a map. Credits to `refuse` addresses fail.
#[derive(Debug, Default)]
pub struct MemoryTally {
    balances: HashMap<(String, AssetId), i64>,
    refuse: Vec<String>,
    credits: Vec<(String, AssetId, i64)>,
}

impl MemoryTally {
    pub fn balance(&self, address: &str, asset_id: AssetId) -> i64 {
        self.balances
            .get(&(address.to_string(), asset_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn refuse(&mut self, address: &str) {
        self.refuse.push(address.to_string());
    }

    /// Credits in the order they were applied.
    pub fn credits(&self) -> &[(String, AssetId, i64)] {
        &self.credits
    }
}

impl BalanceLedger for MemoryTally {
    fn credit_balance(&mut self, address: &str, asset_id: AssetId, amount: i64) -> bool {
        if self.refuse.iter().any(|a| a == address) {
            return false;
        }
        let entry = self.balances.entry((address.to_string(), asset_id)).or_insert(0);
        match entry.checked_add(amount) {
            Some(v) => {
                *entry = v;
                self.credits.push((address.to_string(), asset_id, amount));
                true
            }
            None => false,
        }
    }
}

/// Asset id allocation per namespace.
#[derive(Debug)]
pub struct FixedRegistry {
    next: Mutex<HashMap<Namespace, AssetId>>,
}

impl Default for FixedRegistry {
    fn default() -> Self {
        let mut next = HashMap::new();
        for namespace in Namespace::ALL {
            next.insert(namespace, namespace.first_asset());
        }
        Self {
            next: Mutex::new(next),
        }
    }
}

impl FixedRegistry {
    pub fn set_next(&self, namespace: Namespace, next_asset_id: AssetId) {
        if let Ok(mut next) = self.next.lock() {
            next.insert(namespace, next_asset_id);
        }
    }
}

impl AssetRegistry for FixedRegistry {
    fn next_asset_id(&self, namespace: Namespace) -> AssetId {
        self.next
            .lock()
            .ok()
            .and_then(|n| n.get(&namespace).copied())
            .unwrap_or_else(|| namespace.first_asset())
    }
}

/// One set of doubles, shared between the fee cache and the test body.
pub struct TestCollaborators {
    pub supply: Arc<FixedSupply>,
    pub selector: Arc<ProRataSelector>,
    pub tally: Arc<Mutex<MemoryTally>>,
    pub registry: Arc<FixedRegistry>,
}

impl Default for TestCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCollaborators {
    pub fn new() -> Self {
        Self {
            supply: Arc::new(FixedSupply::default()),
            selector: Arc::new(ProRataSelector::default()),
            tally: Arc::new(Mutex::new(MemoryTally::default())),
            registry: Arc::new(FixedRegistry::default()),
        }
    }

    pub fn collaborators(&self) -> FeeCollaborators {
        FeeCollaborators {
            supply: self.supply.clone(),
            receivers: self.selector.clone(),
            tally: self.tally.clone(),
            registry: self.registry.clone(),
        }
    }
}
