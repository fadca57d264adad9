//! # boarlink
//!
//! `boarlink` is a client-side session manager for a publish/subscribe
//! broker. It connects with named profiles, administers topics, publishes
//! single messages and streams consumed records to the caller, with
//! cancellation.
//!
//! ## Core Modules
//!
//! - `session`: the one active connection (producer, consumer, admin) and the synchronous operations on it.
//! - `worker`: background streaming and bounded preview fetches, reporting over channels.
//! - `client`: the handle traits the core talks to, plus the local and Kafka backends.
//! - `broker`: the embedded single-node broker behind `local://` addresses.
//! - `persistence`: sled storage for the embedded broker.
//! - `store`: connection profiles and preferences persisted as JSON.
//! - `commands`: the text command protocol and its dispatcher.
//! - `config`: application settings.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod commands;
pub mod config;
pub mod persistence;
pub mod session;
pub mod store;
pub mod utils;
pub mod worker;

#[cfg(test)]
pub mod testing;

#[cfg(test)]
mod tests;
