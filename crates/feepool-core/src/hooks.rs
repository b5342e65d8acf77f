//! Collaborators the fee engine calls out to. Block connection, the
//! balance tally and the pro-rata receiver algorithm live elsewhere in the
//! node; the ledgers only see them through these traits.

use crate::{AssetId, Namespace};

/// Total issued supply per asset, used to derive distribution thresholds.
pub trait SupplySource: Send + Sync {
    fn total_supply(&self, asset_id: AssetId) -> i64;
}

/// Splits a pool across holders of the settlement currency.
///
/// Returns `(amount, address)` pairs whose amounts sum exactly to
/// `pool_size`.
pub trait ReceiverSelector: Send + Sync {
    fn select_receivers(
        &self,
        label: &str,
        settlement_asset: AssetId,
        pool_size: i64,
    ) -> Vec<(i64, String)>;
}

/// Balance tally credited by distributions. Held behind the same lock for
/// the whole payout so readers never observe a half-applied distribution.
pub trait BalanceLedger: Send {
    /// Returns false if the credit could not be applied.
    fn credit_balance(&mut self, address: &str, asset_id: AssetId, amount: i64) -> bool;
}

/// Asset id allocation, used to enumerate assets on rollback.
pub trait AssetRegistry: Send + Sync {
    /// Exclusive upper bound of allocated ids in a namespace.
    fn next_asset_id(&self, namespace: Namespace) -> AssetId;
}
