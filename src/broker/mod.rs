//! The embedded single-node broker behind `local://` addresses.
//!
//! Public types:
//! - `LocalBroker`: topic catalog, record log and group offsets on top of `LogStore`.
//! - `TopicMeta`: catalog entry of one topic.

pub mod engine;
pub mod topic;

pub use engine::{AppendSignal, LocalBroker};
pub use topic::TopicMeta;
