// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - FEE DISTRIBUTION HISTORY
//
// Append-only record of completed distributions, keyed by a sequential id.
// Records are only ever removed by a reorg rollback.
//
// There is no maintained record counter: ids are `count + 1` where the
// count comes from a full scan. Counting only happens on the distribution
// write path, so the scan stays off the per-block hot path.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use feepool_core::codec::{
    decode_distribution, decode_recipients, encode_distribution, history_key, parse_history_key,
};
use feepool_core::{AssetId, BlockHeight, DistributionData, FeeDistribution, Recipients};
use sled::{IVec, Tree};
use std::collections::BTreeSet;

use crate::db::{dump_tree, LedgerCounters, LedgerStats};
use crate::fault::FeeFault;

pub struct FeeHistory {
    tree: Tree,
    counters: LedgerCounters,
}

impl FeeHistory {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            counters: LedgerCounters::default(),
        }
    }

    /// Number of stored records.
    pub fn count_records(&self) -> Result<u32, FeeFault> {
        let mut count = 0u32;
        for item in self.tree.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Store a distribution and return its id.
    pub fn record_fee_distribution(
        &self,
        asset_id: AssetId,
        block: BlockHeight,
        total: i64,
        recipients: &Recipients,
    ) -> Result<u32, FeeFault> {
        let id = self.count_records()? + 1;
        let key = history_key(id);
        let data = DistributionData {
            asset_id,
            block,
            total,
        };
        let value = encode_distribution(&data, recipients);
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.counters.record_write();
        log::debug!(
            "Added fee distribution to fee history - key={} value={}",
            key,
            value
        );
        Ok(id)
    }

    /// Ids of every distribution of `asset_id`.
    pub fn get_distributions_for_property(
        &self,
        asset_id: AssetId,
    ) -> Result<BTreeSet<u32>, FeeFault> {
        let mut ids = BTreeSet::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            self.counters.record_read();
            let Some(data) = Self::decode_header(&key, &value) else {
                continue;
            };
            if data.asset_id != asset_id {
                continue;
            }
            match parse_history_key(&String::from_utf8_lossy(&key)) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(e) => log::warn!("Skipping fee history record: {}", e),
            }
        }
        Ok(ids)
    }

    /// Header of one distribution. `None` for unknown ids and for records
    /// that fail to decode.
    pub fn get_distribution_data(&self, id: u32) -> Result<Option<DistributionData>, FeeFault> {
        let key = history_key(id);
        let Some(value) = self.tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        self.counters.record_read();
        Ok(Self::decode_header(key.as_bytes(), &value))
    }

    /// Recipients of one distribution. Empty for unknown ids.
    pub fn get_fee_distribution(&self, id: u32) -> Result<Recipients, FeeFault> {
        Ok(self
            .get_distribution(id)?
            .map(|dist| dist.recipients)
            .unwrap_or_default())
    }

    /// Full record of one distribution.
    pub fn get_distribution(&self, id: u32) -> Result<Option<FeeDistribution>, FeeFault> {
        let key = history_key(id);
        let Some(value) = self.tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        self.counters.record_read();
        let raw = String::from_utf8_lossy(&value);
        let (data, raw_recipients) = match decode_distribution(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Fee history record {} is malformed: {}", key, e);
                return Ok(None);
            }
        };
        let (recipients, errors) = decode_recipients(raw_recipients);
        for e in errors {
            log::warn!("Fee history record {} has a malformed recipient: {}", key, e);
        }
        Ok(Some(FeeDistribution {
            id,
            data,
            recipients,
        }))
    }

    /// Delete every record for a block at or above `block`. Returns the
    /// number of records removed.
    pub fn roll_back_history(&self, block: BlockHeight) -> Result<usize, FeeFault> {
        let mut doomed: Vec<IVec> = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            let Some(data) = Self::decode_header(&key, &value) else {
                continue;
            };
            if data.block >= block {
                log::info!(
                    "Deleting from fee history: {} {}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
                doomed.push(key);
            }
        }
        for key in &doomed {
            self.tree.remove(key)?;
            self.counters.record_write();
        }
        Ok(doomed.len())
    }

    pub fn stats(&self) -> LedgerStats {
        self.counters.snapshot()
    }

    pub fn dump(&self) -> Result<Vec<(String, String)>, FeeFault> {
        Ok(dump_tree("fee history", &self.tree)?)
    }

    fn decode_header(key: &[u8], value: &[u8]) -> Option<DistributionData> {
        match decode_distribution(&String::from_utf8_lossy(value)) {
            Ok((data, _)) => Some(data),
            Err(e) => {
                log::warn!(
                    "Skipping fee history record {}: {}",
                    String::from_utf8_lossy(key),
                    e
                );
                None
            }
        }
    }
}
