// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - CORE TYPES
//
// Asset namespaces, protocol constants and the distribution threshold rule
// shared by the fee cache and fee history ledgers.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod codec;
pub mod config;
pub mod hooks;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use codec::CodecError;
pub use config::FeeConfig;
pub use hooks::{AssetRegistry, BalanceLedger, ReceiverSelector, SupplySource};

/// Token identifier. Main namespace ids start at 1, test namespace ids at
/// [`TEST_NAMESPACE_FIRST_ASSET`].
pub type AssetId = u32;

/// Chain height of the block being connected or disconnected.
pub type BlockHeight = u64;

/// Settlement currency of the main namespace.
pub const MAIN_SETTLEMENT_ASSET: AssetId = 1;

/// Settlement currency of the test namespace.
pub const TEST_SETTLEMENT_ASSET: AssetId = 2;

/// First asset id allocated in the test namespace.
pub const TEST_NAMESPACE_FIRST_ASSET: AssetId = 0x8000_0003;

/// Pool is distributed once it reaches `total_supply / FEE_THRESHOLD_DIVISOR`.
pub const FEE_THRESHOLD_DIVISOR: i64 = 100_000;

/// Number of blocks of fee cache history retained below the tip.
pub const MAX_HISTORY_DEPTH: u64 = 50;

/// Context label passed to the receiver selector for fee payouts.
pub const DISTRIBUTION_LABEL: &str = "FEEDISTRIBUTION";

/// Fee cache history of one asset: block height → cumulative pool value.
/// Ascending by block; the last entry is the current cached amount.
pub type CacheHistory = BTreeMap<BlockHeight, i64>;

/// Recipients of one distribution, unique by address.
pub type Recipients = BTreeMap<String, i64>;

/// The two asset id spaces tracked by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Main,
    Test,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Main, Namespace::Test];

    /// Namespace an asset belongs to. The test settlement asset lives in
    /// the test namespace even though its id is small.
    pub fn of(asset_id: AssetId) -> Self {
        if asset_id == TEST_SETTLEMENT_ASSET || asset_id >= TEST_NAMESPACE_FIRST_ASSET {
            Namespace::Test
        } else {
            Namespace::Main
        }
    }

    /// Lowest asset id enumerated when walking this namespace.
    pub fn first_asset(self) -> AssetId {
        match self {
            Namespace::Main => 1,
            Namespace::Test => TEST_NAMESPACE_FIRST_ASSET,
        }
    }

    /// Currency whose holders receive fees collected in this namespace.
    pub fn settlement_asset(self) -> AssetId {
        match self {
            Namespace::Main => MAIN_SETTLEMENT_ASSET,
            Namespace::Test => TEST_SETTLEMENT_ASSET,
        }
    }
}

/// Header of a recorded distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionData {
    pub asset_id: AssetId,
    pub block: BlockHeight,
    pub total: i64,
}

/// A completed fee distribution as stored in the history ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDistribution {
    pub id: u32,
    pub data: DistributionData,
    pub recipients: Recipients,
}

impl FeeDistribution {
    /// Sum of recipient receipts. Equals `data.total` for every record the
    /// engine writes.
    pub fn recipients_total(&self) -> i64 {
        self.recipients
            .values()
            .fold(0i64, |acc, v| acc.saturating_add(*v))
    }
}

/// Distribution threshold for an asset with the given total supply.
/// Never below 1, so low-supply assets still get a usable trigger.
pub fn distribution_threshold(total_supply: i64, divisor: i64) -> i64 {
    let divisor = divisor.max(1);
    (total_supply / divisor).max(1)
}
