//! The `client` module is the seam between `boarlink` and a broker client library.
//!
//! A [`Connector`] builds handles from [`ConnectionParams`]: the three handles
//! that make up a session (producer, consumer, admin) and topic-scoped
//! [`RecordStream`]s for the background workers. All handle methods are
//! blocking and take `&self`; `close` must be idempotent and must wake a
//! thread parked in [`RecordStream::poll`].
//!
//! Backends:
//! - [`local::LocalConnector`]: the embedded sled broker behind `local://` addresses.
//! - `kafka::KafkaConnector` (feature `kafka`, on by default): rdkafka clients for real clusters.

pub mod local;
pub mod params;

#[cfg(feature = "kafka")]
pub mod kafka;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::Settings;

pub use params::{ConnectionParams, LOCAL_SCHEME, Subscription};

/// Failure reported by a backend handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("handle is closed")]
    Closed,

    #[error("unsupported address '{0}'")]
    UnsupportedAddress(String),

    #[error("{0}")]
    Broker(String),
}

impl BackendError {
    pub fn broker(message: impl fmt::Display) -> Self {
        BackendError::Broker(message.to_string())
    }
}

/// Why a send was not acknowledged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no acknowledgment within {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Rejected(String),
}

/// Broker acknowledgment of a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// A record as handed over by the backend. Not retained after emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// Outcome of one bounded wait on a [`RecordStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    Record(ConsumedRecord),
    /// Nothing arrived within the timeout.
    Idle,
    /// The stream was closed or has no more records.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopic {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
}

/// Cluster description as ordered `(field, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    entries: Vec<(String, String)>,
}

impl ClusterInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl fmt::Display) {
        self.entries.push((field.into(), value.to_string()));
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ClusterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, value) in self.iter() {
            writeln!(f, "{field}: {value}")?;
        }
        Ok(())
    }
}

pub trait ProducerHandle: Send + Sync {
    /// Send one record and wait at most `timeout` for the acknowledgment.
    fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Delivery, DeliveryError>;

    fn close(&self);
}

pub trait ConsumerHandle: Send + Sync {
    /// Topic names as currently reported by the broker.
    fn topics(&self) -> Result<Vec<String>, BackendError>;

    fn close(&self);
}

pub trait AdminHandle: Send + Sync {
    fn create_topic(&self, topic: &NewTopic) -> Result<(), BackendError>;

    fn delete_topic(&self, name: &str) -> Result<(), BackendError>;

    fn describe_cluster(&self) -> Result<ClusterInfo, BackendError>;

    fn close(&self);
}

/// A topic-scoped consumer owned by one background worker.
pub trait RecordStream: Send + Sync {
    /// Wait up to `timeout` for the next record.
    fn poll(&self, timeout: Duration) -> Result<Polled, BackendError>;

    /// Release the connection. A concurrent `poll` returns promptly with `Closed`.
    fn close(&self);
}

/// Factory for backend handles.
pub trait Connector: Send + Sync {
    fn producer(&self, params: &ConnectionParams) -> Result<Box<dyn ProducerHandle>, BackendError>;

    fn consumer(&self, params: &ConnectionParams) -> Result<Box<dyn ConsumerHandle>, BackendError>;

    fn admin(&self, params: &ConnectionParams) -> Result<Box<dyn AdminHandle>, BackendError>;

    fn subscribe(
        &self,
        params: &ConnectionParams,
        subscription: &Subscription,
    ) -> Result<Arc<dyn RecordStream>, BackendError>;
}

/// Routes `local://` addresses to the embedded broker and everything else to
/// the Kafka backend when it is compiled in.
pub struct RoutingConnector {
    local: local::LocalConnector,
    remote: Option<Arc<dyn Connector>>,
}

impl RoutingConnector {
    pub fn new(local: local::LocalConnector, remote: Option<Arc<dyn Connector>>) -> Self {
        Self { local, remote }
    }

    /// The embedded broker plus every remote backend this build carries.
    pub fn from_settings(settings: &Settings) -> Self {
        let local = local::LocalConnector::new(settings.local.max_records_per_topic);
        #[cfg(feature = "kafka")]
        let remote: Option<Arc<dyn Connector>> =
            Some(Arc::new(kafka::KafkaConnector::new(settings.client.clone())));
        #[cfg(not(feature = "kafka"))]
        let remote: Option<Arc<dyn Connector>> = None;
        Self::new(local, remote)
    }

    fn route(&self, params: &ConnectionParams) -> Result<&dyn Connector, BackendError> {
        if params.local_path().is_some() {
            return Ok(&self.local);
        }
        self.remote
            .as_deref()
            .ok_or_else(|| BackendError::UnsupportedAddress(params.bootstrap_address.clone()))
    }
}

impl Connector for RoutingConnector {
    fn producer(&self, params: &ConnectionParams) -> Result<Box<dyn ProducerHandle>, BackendError> {
        self.route(params)?.producer(params)
    }

    fn consumer(&self, params: &ConnectionParams) -> Result<Box<dyn ConsumerHandle>, BackendError> {
        self.route(params)?.consumer(params)
    }

    fn admin(&self, params: &ConnectionParams) -> Result<Box<dyn AdminHandle>, BackendError> {
        self.route(params)?.admin(params)
    }

    fn subscribe(
        &self,
        params: &ConnectionParams,
        subscription: &Subscription,
    ) -> Result<Arc<dyn RecordStream>, BackendError> {
        self.route(params)?.subscribe(params, subscription)
    }
}
