// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - FATAL FAULTS
//
// The fee ledgers have no recoverable error path. Every error a mutating
// operation can return means ledger state can no longer be trusted and the
// node has to stop; the caller hands the fault to `abort_node`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use feepool_core::{AssetId, BlockHeight};
use std::fmt;

#[derive(Debug)]
#[must_use]
pub enum FeeFault {
    /// Adding a fee would overflow the cached pool.
    CacheOverflow {
        asset_id: AssetId,
        block: BlockHeight,
        cached: i64,
        amount: i64,
    },
    /// AddFee called with a negative amount.
    NegativeFee {
        asset_id: AssetId,
        block: BlockHeight,
        amount: i64,
    },
    /// The storage engine failed a read or did not acknowledge a write.
    Storage(String),
    /// The balance tally refused a distribution credit.
    CreditFailed {
        asset_id: AssetId,
        address: String,
        amount: i64,
    },
    /// Credited amounts did not add up to the pool being distributed.
    DistributionMismatch {
        asset_id: AssetId,
        distributed: i64,
        cached: i64,
    },
    /// A thread panicked while holding the balance tally lock.
    LockPoisoned,
}

impl fmt::Display for FeeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheOverflow {
                asset_id,
                block,
                cached,
                amount,
            } => write!(
                f,
                "fee cache overflow (block {} property {} current {} amount {})",
                block, asset_id, cached, amount
            ),
            Self::NegativeFee {
                asset_id,
                block,
                amount,
            } => write!(
                f,
                "negative fee {} for property {} at block {}",
                amount, asset_id, block
            ),
            Self::Storage(e) => write!(f, "fee database error: {}", e),
            Self::CreditFailed {
                asset_id,
                address,
                amount,
            } => write!(
                f,
                "failed to credit {} of property {} to {}",
                amount, asset_id, address
            ),
            Self::DistributionMismatch {
                asset_id,
                distributed,
                cached,
            } => write!(
                f,
                "fee distribution for property {} sent {} out of {}",
                asset_id, distributed, cached
            ),
            Self::LockPoisoned => write!(f, "balance tally lock poisoned"),
        }
    }
}

impl std::error::Error for FeeFault {}

impl From<sled::Error> for FeeFault {
    fn from(e: sled::Error) -> Self {
        FeeFault::Storage(e.to_string())
    }
}

impl FeeFault {
    /// Faults that leave the fee cache inconsistent with balances or with
    /// the value bound of the pool. Persisted state is discarded for these
    /// so the next start rebuilds it from the chain.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            Self::CacheOverflow { .. } | Self::CreditFailed { .. } | Self::DistributionMismatch { .. }
        )
    }
}

/// Log the fault and terminate the process.
pub fn abort_node(fault: &FeeFault) -> ! {
    log::error!("Shutting down due to {}", fault);
    eprintln!("❌ FATAL: Shutting down due to {}", fault);
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_message_names_inputs() {
        let fault = FeeFault::CacheOverflow {
            asset_id: 3,
            block: 100,
            cached: i64::MAX,
            amount: 1,
        };
        let msg = fault.to_string();
        assert!(msg.contains("block 100"));
        assert!(msg.contains("property 3"));
        assert!(fault.requires_rebuild());
    }

    #[test]
    fn test_storage_faults_keep_state() {
        assert!(!FeeFault::Storage("io".to_string()).requires_rebuild());
        assert!(!FeeFault::LockPoisoned.requires_rebuild());
        assert!(!FeeFault::NegativeFee {
            asset_id: 1,
            block: 1,
            amount: -1
        }
        .requires_rebuild());
    }
}
