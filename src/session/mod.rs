//! The `session` module owns the one live broker connection.
//!
//! A [`Session`] is the producer, consumer and admin handle triple built
//! from one profile. [`SessionManager`] holds at most one at a time and is
//! the entry point for the synchronous operations:
//! - connection lifecycle (`manager`)
//! - topic administration (`admin`)
//! - single-message publish (`publish`)

pub mod admin;
pub mod manager;
pub mod publish;

use chrono::{DateTime, Utc};

use crate::client::{AdminHandle, ConnectionParams, ConsumerHandle, ProducerHandle};
use crate::store::{ConnectionProfile, SecurityProtocol};

pub use manager::SessionManager;
pub use publish::PublishReceipt;

/// Snapshot of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub profile: String,
    pub bootstrap_address: String,
    pub security_protocol: SecurityProtocol,
    pub connected_at: DateTime<Utc>,
}

/// Live handles bound to one profile. Dropping the session closes them.
pub struct Session {
    profile: ConnectionProfile,
    params: ConnectionParams,
    connected_at: DateTime<Utc>,
    producer: Box<dyn ProducerHandle>,
    consumer: Box<dyn ConsumerHandle>,
    admin: Box<dyn AdminHandle>,
}

impl Session {
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            profile: self.profile.name.clone(),
            bootstrap_address: self.params.bootstrap_address.clone(),
            security_protocol: self.params.security_protocol,
            connected_at: self.connected_at,
        }
    }

    pub(crate) fn producer(&self) -> &dyn ProducerHandle {
        self.producer.as_ref()
    }

    pub(crate) fn consumer(&self) -> &dyn ConsumerHandle {
        self.consumer.as_ref()
    }

    pub(crate) fn admin(&self) -> &dyn AdminHandle {
        self.admin.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.producer.close();
        self.consumer.close();
        self.admin.close();
    }
}
