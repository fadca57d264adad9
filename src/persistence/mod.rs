//! The `persistence` module stores the data of the embedded `local://` broker.
//!
//! It uses `sled` as an embedded key-value store: one tree per topic log plus
//! small trees for the topic catalog and committed consumer-group offsets.

pub mod sled_store;

pub use sled_store::{LogStore, StoreFailure, StoredRecord};
