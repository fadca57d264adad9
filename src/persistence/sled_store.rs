//! Topic log storage backed by `sled`
//!
//! Each topic is a sled tree named `topic/<name>` whose keys are big-endian
//! offsets, so iteration yields records in offset order. Two more trees hold
//! the topic catalog (`__topics`) and committed consumer-group offsets
//! (`__offsets`).
//!
//! Configuration options supported:
//! - `max_records_per_topic`: optional cap to limit storage per topic; when
//!   exceeded the oldest records are removed. Offsets are never reused.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

pub const TOPIC_TREE_PREFIX: &str = "topic/";
const CATALOG_TREE: &str = "__topics";
const OFFSETS_TREE: &str = "__offsets";
const META_TREE: &str = "__meta";

/// A record as stored in a topic tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub timestamp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreFailure {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct LogStore {
    db: Db,
    max_records_per_topic: Option<usize>,
    // serializes offset allocation across producers sharing this store
    append_lock: Arc<Mutex<()>>,
}

impl LogStore {
    /// Open or create a sled database at `path` with the given retention policy.
    pub fn open(path: &str, max_records_per_topic: Option<usize>) -> Result<Self, StoreFailure> {
        let db = sled::open(path)?;
        Ok(Self::with_db(db, max_records_per_topic))
    }

    /// A throwaway store that lives only in memory.
    pub fn temporary(max_records_per_topic: Option<usize>) -> Result<Self, StoreFailure> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::with_db(db, max_records_per_topic))
    }

    fn with_db(db: Db, max_records_per_topic: Option<usize>) -> Self {
        Self {
            db,
            max_records_per_topic,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    fn topic_tree(&self, topic: &str) -> Result<Tree, StoreFailure> {
        Ok(self.db.open_tree(format!("{TOPIC_TREE_PREFIX}{topic}"))?)
    }

    /// Append a record and return its offset.
    pub fn append(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<i64, StoreFailure> {
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let tree = self.topic_tree(topic)?;
        let offset = self.next_offset(topic, &tree)?;
        let record = StoredRecord {
            offset,
            key: key.map(<[u8]>::to_vec),
            value: Some(value.to_vec()),
            timestamp: Utc::now().timestamp_millis(),
        };
        tree.insert(offset.to_be_bytes(), serde_json::to_vec(&record)?)?;
        self.put_meta(&format!("next/{topic}"), &(offset + 1))?;

        if let Some(max) = self.max_records_per_topic {
            let total = tree.len();
            if total > max {
                let excess = total - max;
                let keys_to_delete: Vec<_> = tree
                    .iter()
                    .keys()
                    .take(excess)
                    .filter_map(Result::ok)
                    .collect();
                for key in keys_to_delete {
                    tree.remove(key)?;
                }
            }
        }

        Ok(offset)
    }

    // Offsets survive retention trimming, so the high-water mark lives in the meta tree.
    fn next_offset(&self, topic: &str, tree: &Tree) -> Result<i64, StoreFailure> {
        if let Some(next) = self.get_meta::<i64>(&format!("next/{topic}"))? {
            return Ok(next);
        }
        Ok(match tree.last()? {
            Some((key, _)) => decode_offset(&key) + 1,
            None => 0,
        })
    }

    /// First stored record at or after `offset`.
    pub fn read_at(&self, topic: &str, offset: i64) -> Result<Option<StoredRecord>, StoreFailure> {
        let tree = self.topic_tree(topic)?;
        match tree.range(offset.max(0).to_be_bytes()..).next() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub fn record_count(&self, topic: &str) -> Result<usize, StoreFailure> {
        Ok(self.topic_tree(topic)?.len())
    }

    /// Remove the topic's records, catalog entry, offset high-water mark and committed offsets.
    pub fn drop_topic(&self, topic: &str) -> Result<bool, StoreFailure> {
        let existed = self.db.drop_tree(format!("{TOPIC_TREE_PREFIX}{topic}"))?;
        let catalog = self.db.open_tree(CATALOG_TREE)?;
        let listed = catalog.remove(topic)?.is_some();
        self.db
            .open_tree(META_TREE)?
            .remove(format!("next/{topic}"))?;

        let offsets = self.db.open_tree(OFFSETS_TREE)?;
        let stale: Vec<_> = offsets
            .iter()
            .keys()
            .filter_map(Result::ok)
            .filter(|k| k.ends_with(format!("\0{topic}").as_bytes()))
            .collect();
        for key in stale {
            offsets.remove(key)?;
        }
        Ok(existed || listed)
    }

    /// Catalog entry for `topic`, stored as JSON.
    #[cfg(test)]
    pub fn catalog_get<T: DeserializeOwned>(
        &self,
        topic: &str,
    ) -> Result<Option<T>, StoreFailure> {
        let catalog = self.db.open_tree(CATALOG_TREE)?;
        match catalog.get(topic)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Insert the entry only if the topic is not in the catalog yet.
    ///
    /// Returns false when the topic already existed.
    pub fn catalog_insert_new<T: Serialize>(
        &self,
        topic: &str,
        entry: &T,
    ) -> Result<bool, StoreFailure> {
        let catalog = self.db.open_tree(CATALOG_TREE)?;
        let swapped = catalog.compare_and_swap(
            topic,
            None as Option<&[u8]>,
            Some(serde_json::to_vec(entry)?),
        )?;
        Ok(swapped.is_ok())
    }

    /// Catalog entries in name order.
    pub fn catalog_entries<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreFailure> {
        let catalog = self.db.open_tree(CATALOG_TREE)?;
        catalog
            .iter()
            .values()
            .map(|value| -> Result<T, StoreFailure> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }

    pub fn committed_offset(
        &self,
        group: &str,
        topic: &str,
    ) -> Result<Option<i64>, StoreFailure> {
        let offsets = self.db.open_tree(OFFSETS_TREE)?;
        Ok(offsets
            .get(offset_key(group, topic))?
            .map(|raw| decode_offset(&raw)))
    }

    /// Record `next_offset` as the position the group resumes from.
    pub fn commit_offset(
        &self,
        group: &str,
        topic: &str,
        next_offset: i64,
    ) -> Result<(), StoreFailure> {
        let offsets = self.db.open_tree(OFFSETS_TREE)?;
        offsets.insert(offset_key(group, topic), next_offset.to_be_bytes().to_vec())?;
        Ok(())
    }

    /// A persistent identifier for this store, created on first use.
    pub fn store_id(&self) -> Result<String, StoreFailure> {
        if let Some(id) = self.get_meta::<String>("store_id")? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.put_meta("store_id", &id)?;
        Ok(id)
    }

    pub fn size_on_disk(&self) -> Result<u64, StoreFailure> {
        Ok(self.db.size_on_disk()?)
    }

    #[cfg(test)]
    pub fn flush(&self) -> Result<(), StoreFailure> {
        self.db.flush()?;
        Ok(())
    }

    fn get_meta<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreFailure> {
        let meta = self.db.open_tree(META_TREE)?;
        match meta.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreFailure> {
        let meta = self.db.open_tree(META_TREE)?;
        meta.insert(key, serde_json::to_vec(value)?)?;
        Ok(())
    }
}

fn offset_key(group: &str, topic: &str) -> Vec<u8> {
    format!("{group}\0{topic}").into_bytes()
}

fn decode_offset(raw: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    let len = raw.len().min(8);
    buf[8 - len..].copy_from_slice(&raw[raw.len() - len..]);
    i64::from_be_bytes(buf)
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("db", &"sled::Db")
            .field("max_records_per_topic", &self.max_records_per_topic)
            .finish()
    }
}
