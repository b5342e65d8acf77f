// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - DATABASE MODULE
//
// sled embedded database holding both fee ledgers, one tree each.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const TREE_FEE_CACHE: &str = "fee_cache";
const TREE_FEE_HISTORY: &str = "fee_history";

/// Database wrapper owning the fee cache and fee history trees
pub struct FeeDatabase {
    db: Db,
}

impl FeeDatabase {
    /// Open or create the fee database.
    ///
    /// Retries up to 3 times with backoff (500ms, 1s, 2s) when the sled
    /// lock is still held by a process that is shutting down.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path_ref = path.as_ref();
        let retry_delays_ms: [u64; 3] = [500, 1000, 2000];

        match sled::open(path_ref) {
            Ok(db) => return Ok(FeeDatabase { db }),
            Err(e) if Self::is_lock_error(&e) => {
                log::warn!(
                    "Fee database lock held at {}, retrying ({} attempts remain)",
                    path_ref.display(),
                    retry_delays_ms.len()
                );
            }
            Err(e) => return Err(format!("Failed to open fee database: {}", e)),
        }

        for (i, delay_ms) in retry_delays_ms.iter().enumerate() {
            std::thread::sleep(std::time::Duration::from_millis(*delay_ms));
            match sled::open(path_ref) {
                Ok(db) => {
                    log::info!("Fee database lock acquired on retry {}", i + 1);
                    return Ok(FeeDatabase { db });
                }
                Err(e) if Self::is_lock_error(&e) && i + 1 < retry_delays_ms.len() => continue,
                Err(e) => {
                    return Err(format!(
                        "Failed to open fee database after {} retries: {}",
                        i + 1,
                        e
                    ))
                }
            }
        }

        Err("Fee database lock acquisition timed out".to_string())
    }

    fn is_lock_error(e: &sled::Error) -> bool {
        let msg = e.to_string();
        msg.contains("Resource temporarily unavailable")
            || msg.contains("WouldBlock")
            || msg.contains("Would block")
            || msg.contains("lock")
            || msg.contains("EAGAIN")
    }

    pub fn fee_cache_tree(&self) -> Result<Tree, String> {
        self.db
            .open_tree(TREE_FEE_CACHE)
            .map_err(|e| format!("Failed to open fee cache tree: {}", e))
    }

    pub fn fee_history_tree(&self) -> Result<Tree, String> {
        self.db
            .open_tree(TREE_FEE_HISTORY)
            .map_err(|e| format!("Failed to open fee history tree: {}", e))
    }

    /// Flush all pending writes to disk. Called once per connected block.
    pub fn flush(&self) -> Result<(), String> {
        self.db
            .flush()
            .map_err(|e| format!("Failed to flush fee database: {}", e))?;
        Ok(())
    }
}

/// Read/write counters of one ledger
#[derive(Debug, Default)]
pub struct LedgerCounters {
    written: AtomicU64,
    read: AtomicU64,
}

impl LedgerCounters {
    pub fn record_write(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LedgerStats {
        LedgerStats {
            written: self.written.load(Ordering::Relaxed),
            read: self.read.load(Ordering::Relaxed),
        }
    }
}

/// Ledger statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub written: u64,
    pub read: u64,
}

/// All raw key/value pairs of a tree, logged at debug level.
pub(crate) fn dump_tree(name: &str, tree: &Tree) -> Result<Vec<(String, String)>, sled::Error> {
    let mut entries = Vec::new();
    for item in tree.iter() {
        let (key, value) = item?;
        let key = String::from_utf8_lossy(&key).into_owned();
        let value = String::from_utf8_lossy(&value).into_owned();
        log::debug!("{} entry #{:8}= {}:{}", name, entries.len() + 1, key, value);
        entries.push((key, value));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_both_trees() {
        let temp_dir = TempDir::new().unwrap();
        let db = FeeDatabase::open(temp_dir.path().join("fees")).unwrap();
        let cache = db.fee_cache_tree().unwrap();
        let history = db.fee_history_tree().unwrap();

        cache.insert("0000000003", "100:70").unwrap();
        assert!(history.is_empty());
        assert_eq!(cache.len(), 1);
        db.flush().unwrap();
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fees");
        {
            let db = FeeDatabase::open(&path).unwrap();
            db.fee_history_tree()
                .unwrap()
                .insert("1", "60:7:105:alice=105")
                .unwrap();
            db.flush().unwrap();
        }
        let db = FeeDatabase::open(&path).unwrap();
        let value = db.fee_history_tree().unwrap().get("1").unwrap().unwrap();
        assert_eq!(value.as_ref(), b"60:7:105:alice=105");
    }

    #[test]
    fn test_counters() {
        let counters = LedgerCounters::default();
        counters.record_write();
        counters.record_read();
        counters.record_read();
        assert_eq!(
            counters.snapshot(),
            LedgerStats {
                written: 1,
                read: 2
            }
        );
    }

    #[test]
    fn test_dump_tree() {
        let temp_dir = TempDir::new().unwrap();
        let db = FeeDatabase::open(temp_dir.path().join("fees")).unwrap();
        let tree = db.fee_cache_tree().unwrap();
        tree.insert("0000000001", "5:1").unwrap();
        tree.insert("0000000002", "6:2").unwrap();
        let entries = dump_tree("cache", &tree).unwrap();
        assert_eq!(
            entries,
            vec![
                ("0000000001".to_string(), "5:1".to_string()),
                ("0000000002".to_string(), "6:2".to_string()),
            ]
        );
    }
}
