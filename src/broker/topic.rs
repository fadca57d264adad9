//! Topic catalog entries of the local broker.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicMeta {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
    /// Milliseconds since the UNIX epoch.
    pub created_at: i64,
}

impl TopicMeta {
    pub fn new(name: &str, partitions: u32, replication_factor: u32) -> Self {
        Self {
            name: name.to_string(),
            partitions,
            replication_factor,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Entry for a topic created implicitly by the first publish.
    pub fn auto_created(name: &str) -> Self {
        Self::new(name, 1, 1)
    }
}
