//! Handles for the embedded broker behind `local://<path>` addresses.
//!
//! `local://:memory:` opens a throwaway in-memory store. Any other path is a
//! sled directory. Sled locks its directory, so the connector keeps one
//! broker per path and hands clones of it to every handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::broker::LocalBroker;
use crate::client::{
    AdminHandle, BackendError, ClusterInfo, ConnectionParams, Connector, ConsumerHandle,
    Delivery, DeliveryError, NewTopic, Polled, ProducerHandle, RecordStream, Subscription,
};
use crate::persistence::LogStore;

pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Default)]
pub struct LocalConnector {
    max_records_per_topic: Option<usize>,
    brokers: Mutex<HashMap<String, LocalBroker>>,
}

impl LocalConnector {
    pub fn new(max_records_per_topic: Option<usize>) -> Self {
        Self {
            max_records_per_topic,
            brokers: Mutex::new(HashMap::new()),
        }
    }

    /// The broker serving `params`, opened on first use.
    pub fn broker(&self, params: &ConnectionParams) -> Result<LocalBroker, BackendError> {
        let path = params
            .local_path()
            .ok_or_else(|| BackendError::UnsupportedAddress(params.bootstrap_address.clone()))?;
        if path.is_empty() {
            return Err(BackendError::UnsupportedAddress(params.bootstrap_address.clone()));
        }

        let mut brokers = self.brokers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(broker) = brokers.get(path) {
            return Ok(broker.clone());
        }

        let store = if path == MEMORY_PATH {
            LogStore::temporary(self.max_records_per_topic)?
        } else {
            LogStore::open(path, self.max_records_per_topic)?
        };
        info!(path = %path, "opened local broker");
        let broker = LocalBroker::new(store, path);
        brokers.insert(path.to_string(), broker.clone());
        Ok(broker)
    }
}

impl Connector for LocalConnector {
    fn producer(&self, params: &ConnectionParams) -> Result<Box<dyn ProducerHandle>, BackendError> {
        Ok(Box::new(LocalProducer {
            broker: self.broker(params)?,
            closed: AtomicBool::new(false),
        }))
    }

    fn consumer(&self, params: &ConnectionParams) -> Result<Box<dyn ConsumerHandle>, BackendError> {
        Ok(Box::new(LocalConsumer {
            broker: self.broker(params)?,
            closed: AtomicBool::new(false),
        }))
    }

    fn admin(&self, params: &ConnectionParams) -> Result<Box<dyn AdminHandle>, BackendError> {
        Ok(Box::new(LocalAdmin {
            broker: self.broker(params)?,
            closed: AtomicBool::new(false),
        }))
    }

    fn subscribe(
        &self,
        params: &ConnectionParams,
        subscription: &Subscription,
    ) -> Result<Arc<dyn RecordStream>, BackendError> {
        let broker = self.broker(params)?;
        let committed = match &subscription.group_id {
            Some(group) => broker.committed_offset(group, &subscription.topic)?,
            None => None,
        };
        let start = committed.unwrap_or(0);
        debug!(
            topic = %subscription.topic,
            group = ?subscription.group_id,
            start,
            "local stream subscribed"
        );
        Ok(Arc::new(LocalRecordStream {
            broker,
            subscription: subscription.clone(),
            cursor: Mutex::new(start),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct LocalProducer {
    broker: LocalBroker,
    closed: AtomicBool,
}

impl ProducerHandle for LocalProducer {
    // appends are synchronous, so the timeout never elapses
    fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
        _timeout: Duration,
    ) -> Result<Delivery, DeliveryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected(BackendError::Closed.to_string()));
        }
        let offset = self
            .broker
            .publish(topic, key, payload)
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        Ok(Delivery {
            partition: 0,
            offset,
        })
    }

    fn close(&self) {
        self.closed.swap(true, Ordering::SeqCst);
    }
}

pub struct LocalConsumer {
    broker: LocalBroker,
    closed: AtomicBool,
}

impl ConsumerHandle for LocalConsumer {
    fn topics(&self) -> Result<Vec<String>, BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Closed);
        }
        self.broker.topics()
    }

    fn close(&self) {
        self.closed.swap(true, Ordering::SeqCst);
    }
}

pub struct LocalAdmin {
    broker: LocalBroker,
    closed: AtomicBool,
}

impl LocalAdmin {
    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Closed);
        }
        Ok(())
    }
}

impl AdminHandle for LocalAdmin {
    fn create_topic(&self, topic: &NewTopic) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.broker.create_topic(topic)
    }

    fn delete_topic(&self, name: &str) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.broker.delete_topic(name)
    }

    fn describe_cluster(&self) -> Result<ClusterInfo, BackendError> {
        self.ensure_open()?;
        self.broker.describe()
    }

    fn close(&self) {
        self.closed.swap(true, Ordering::SeqCst);
    }
}

/// Single-partition reader with its own cursor. With a group the cursor is
/// committed after every record.
pub struct LocalRecordStream {
    broker: LocalBroker,
    subscription: Subscription,
    cursor: Mutex<i64>,
    closed: AtomicBool,
}

impl RecordStream for LocalRecordStream {
    fn poll(&self, timeout: Duration) -> Result<Polled, BackendError> {
        let deadline = Instant::now() + timeout;
        let signal = self.broker.signal().clone();
        let topic = self.subscription.topic.as_str();

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(Polled::Closed);
            }
            // read the generation first so an append between the read and the wait is not missed
            let seen = signal.generation();
            {
                let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(record) = self.broker.read(topic, *cursor)? {
                    *cursor = record.offset + 1;
                    if let Some(group) = &self.subscription.group_id {
                        self.broker.commit(group, topic, *cursor)?;
                    }
                    return Ok(Polled::Record(record));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Polled::Idle);
            }
            signal.wait_past(seen, deadline - now);
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // wake a poller parked on the append signal
            self.broker.signal().notify();
        }
    }
}
