//! Local broker engine
//!
//! A single-node broker stored in a `LogStore`. It is what `local://`
//! connections talk to, so the whole client can be exercised without a
//! cluster. Responsibilities:
//! - keeping the topic catalog (explicit creation, implicit creation on publish)
//! - appending records and reading them back by offset
//! - storing committed offsets per consumer group
//! - waking pollers when new records arrive
//!
//! The engine is cheap to clone; clones share the store and the wake-up signal.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::broker::topic::TopicMeta;
use crate::client::{BackendError, ClusterInfo, ConsumedRecord, NewTopic};
use crate::persistence::{LogStore, StoreFailure};

impl From<StoreFailure> for BackendError {
    fn from(e: StoreFailure) -> Self {
        BackendError::broker(e)
    }
}

/// Generation counter bumped on every append and on stream close.
#[derive(Debug, Default)]
pub struct AppendSignal {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl AppendSignal {
    pub fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    pub fn notify(&self) {
        let mut generation = self.lock_generation();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the generation moves past `seen` or `timeout` elapses.
    pub fn wait_past(&self, seen: u64, timeout: Duration) {
        let guard = self.lock_generation();
        let _ = self
            .cond
            .wait_timeout_while(guard, timeout, |generation| *generation == seen);
    }
}

#[derive(Debug, Clone)]
pub struct LocalBroker {
    store: LogStore,
    location: String,
    signal: Arc<AppendSignal>,
}

impl LocalBroker {
    pub fn new(store: LogStore, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
            signal: Arc::new(AppendSignal::default()),
        }
    }

    pub fn signal(&self) -> &Arc<AppendSignal> {
        &self.signal
    }

    pub fn create_topic(&self, topic: &NewTopic) -> Result<(), BackendError> {
        if topic.partitions == 0 {
            return Err(BackendError::broker("number of partitions must be at least 1"));
        }
        if topic.replication_factor != 1 {
            return Err(BackendError::Broker(format!(
                "replication factor {} is larger than the 1 available broker",
                topic.replication_factor
            )));
        }
        let meta = TopicMeta::new(&topic.name, topic.partitions, topic.replication_factor);
        if !self.store.catalog_insert_new(&topic.name, &meta)? {
            return Err(BackendError::Broker(format!(
                "topic '{}' already exists",
                topic.name
            )));
        }
        info!(topic = %topic.name, partitions = topic.partitions, "local topic created");
        Ok(())
    }

    pub fn delete_topic(&self, name: &str) -> Result<(), BackendError> {
        if !self.store.drop_topic(name)? {
            return Err(BackendError::Broker(format!(
                "unknown topic or partition '{name}'"
            )));
        }
        info!(topic = %name, "local topic deleted");
        Ok(())
    }

    pub fn topics(&self) -> Result<Vec<String>, BackendError> {
        let entries: Vec<TopicMeta> = self.store.catalog_entries()?;
        Ok(entries.into_iter().map(|meta| meta.name).collect())
    }

    #[cfg(test)]
    pub fn topic(&self, name: &str) -> Result<Option<TopicMeta>, BackendError> {
        Ok(self.store.catalog_get(name)?)
    }

    /// Append a record, creating the topic on first use. Returns the offset.
    pub fn publish(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<i64, BackendError> {
        if topic.trim().is_empty() {
            return Err(BackendError::broker("topic name must not be empty"));
        }
        if self
            .store
            .catalog_insert_new(topic, &TopicMeta::auto_created(topic))?
        {
            debug!(topic = %topic, "local topic auto-created");
        }
        let offset = self.store.append(topic, key, value)?;
        self.signal.notify();
        Ok(offset)
    }

    /// First record of `topic` at or after `offset`.
    pub fn read(&self, topic: &str, offset: i64) -> Result<Option<ConsumedRecord>, BackendError> {
        Ok(self
            .store
            .read_at(topic, offset)?
            .map(|stored| ConsumedRecord {
                topic: topic.to_string(),
                partition: 0,
                offset: stored.offset,
                key: stored.key,
                value: stored.value,
            }))
    }

    pub fn committed_offset(&self, group: &str, topic: &str) -> Result<Option<i64>, BackendError> {
        Ok(self.store.committed_offset(group, topic)?)
    }

    pub fn commit(&self, group: &str, topic: &str, next_offset: i64) -> Result<(), BackendError> {
        Ok(self.store.commit_offset(group, topic, next_offset)?)
    }

    pub fn describe(&self) -> Result<ClusterInfo, BackendError> {
        let topics: Vec<TopicMeta> = self.store.catalog_entries()?;
        let partitions: u32 = topics.iter().map(|t| t.partitions).sum();

        let mut info = ClusterInfo::new();
        info.push("cluster_id", self.store.store_id()?);
        info.push("controller_id", 0);
        info.push("brokers", format!("0@{}", self.location));
        info.push("topics", topics.len());
        info.push("partitions", partitions);
        info.push("size_on_disk", self.store.size_on_disk()?);
        Ok(info)
    }
}
