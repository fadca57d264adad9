//! Handles backed by `rdkafka` for real Kafka clusters.
//!
//! librdkafka runs its own background threads, so the async producer and
//! admin futures are driven with `futures::executor::block_on` from whatever
//! thread calls the handle. Every client is created from the same
//! [`ConnectionParams`] through [`client_config`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::executor::block_on;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic as KafkaNewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::debug;

use crate::client::{
    AdminHandle, BackendError, ClusterInfo, ConnectionParams, Connector, ConsumedRecord,
    ConsumerHandle, Delivery, DeliveryError, NewTopic, Polled, ProducerHandle, RecordStream,
    Subscription,
};
use crate::config::ClientSettings;

/// Base librdkafka configuration for `params`, security settings included.
pub fn client_config(params: &ConnectionParams) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", &params.bootstrap_address);
    config.set("security.protocol", params.security_protocol.as_str());

    if let Some(mechanism) = &params.sasl_mechanism {
        config.set("sasl.mechanism", mechanism);
    }
    if let Some(username) = &params.sasl_username {
        config.set("sasl.username", username);
    }
    if let Some(password) = &params.sasl_password {
        config.set("sasl.password", password);
    }
    if let Some(ca) = &params.tls_ca_path {
        config.set("ssl.ca.location", ca);
    }
    if let Some(cert) = &params.tls_cert_path {
        config.set("ssl.certificate.location", cert);
    }
    if let Some(key) = &params.tls_key_path {
        config.set("ssl.key.location", key);
    }
    config
}

fn backend_error(e: KafkaError) -> BackendError {
    BackendError::broker(e)
}

pub struct KafkaConnector {
    settings: ClientSettings,
}

impl KafkaConnector {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl Connector for KafkaConnector {
    fn producer(&self, params: &ConnectionParams) -> Result<Box<dyn ProducerHandle>, BackendError> {
        let timeout_ms = self.settings.publish_timeout().as_millis().to_string();
        let producer: FutureProducer = client_config(params)
            .set("message.timeout.ms", &timeout_ms)
            .create()
            .map_err(backend_error)?;
        Ok(Box::new(KafkaProducer {
            producer: Mutex::new(Some(producer)),
        }))
    }

    fn consumer(&self, params: &ConnectionParams) -> Result<Box<dyn ConsumerHandle>, BackendError> {
        let consumer: BaseConsumer = client_config(params)
            .set("group.id", &self.settings.consumer_group)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(backend_error)?;
        // fail the connect early when the cluster is unreachable
        consumer
            .fetch_metadata(None, self.settings.admin_timeout())
            .map_err(backend_error)?;
        Ok(Box::new(KafkaConsumer {
            consumer: Mutex::new(Some(consumer)),
            timeout: self.settings.admin_timeout(),
        }))
    }

    fn admin(&self, params: &ConnectionParams) -> Result<Box<dyn AdminHandle>, BackendError> {
        let admin: AdminClient<DefaultClientContext> =
            client_config(params).create().map_err(backend_error)?;
        Ok(Box::new(KafkaAdmin {
            admin: Mutex::new(Some(admin)),
            timeout: self.settings.admin_timeout(),
        }))
    }

    fn subscribe(
        &self,
        params: &ConnectionParams,
        subscription: &Subscription,
    ) -> Result<Arc<dyn RecordStream>, BackendError> {
        let topic = subscription.topic.as_str();
        let mut config = client_config(params);
        config.set("auto.offset.reset", "earliest");

        let consumer: BaseConsumer = match &subscription.group_id {
            Some(group) => {
                let consumer: BaseConsumer = config
                    .set("group.id", group)
                    .set("enable.auto.commit", "true")
                    .create()
                    .map_err(backend_error)?;
                consumer.subscribe(&[topic]).map_err(backend_error)?;
                consumer
            }
            None => {
                // no group: no rebalance wait and nothing left on the broker
                let consumer: BaseConsumer = config
                    .set("enable.auto.commit", "false")
                    .set("enable.auto.offset.store", "false")
                    .create()
                    .map_err(backend_error)?;
                let assignment = beginning_of(&consumer, topic, self.settings.admin_timeout())?;
                consumer.assign(&assignment).map_err(backend_error)?;
                consumer
            }
        };
        debug!(topic = %topic, group = ?subscription.group_id, "kafka stream opened");

        Ok(Arc::new(KafkaRecordStream {
            consumer: Mutex::new(Some(consumer)),
            closed: AtomicBool::new(false),
            slice: self.settings.poll_interval(),
        }))
    }
}

/// Every partition of `topic` at its earliest offset.
fn beginning_of(
    consumer: &BaseConsumer,
    topic: &str,
    timeout: Duration,
) -> Result<TopicPartitionList, BackendError> {
    let metadata = consumer
        .fetch_metadata(Some(topic), timeout)
        .map_err(backend_error)?;
    let Some(entry) = metadata.topics().iter().find(|t| t.name() == topic) else {
        return Err(BackendError::Broker(format!("topic '{topic}' not found")));
    };
    if let Some(code) = entry.error() {
        return Err(BackendError::Broker(format!(
            "topic '{topic}': {}",
            RDKafkaErrorCode::from(code)
        )));
    }

    let mut assignment = TopicPartitionList::new();
    for partition in entry.partitions() {
        assignment
            .add_partition_offset(topic, partition.id(), Offset::Beginning)
            .map_err(backend_error)?;
    }
    Ok(assignment)
}

/// Delivery failure for a send that waited `timeout`. Only an expired
/// message counts as a timeout; everything else is a rejection.
pub(crate) fn delivery_error(error: KafkaError, timeout: Duration) -> DeliveryError {
    match error {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
            DeliveryError::TimedOut(timeout)
        }
        other => DeliveryError::Rejected(other.to_string()),
    }
}

struct KafkaProducer {
    producer: Mutex<Option<FutureProducer>>,
}

impl ProducerHandle for KafkaProducer {
    fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Delivery, DeliveryError> {
        // clone out of the lock so close() is not held up by an in-flight send
        let producer = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| DeliveryError::Rejected(BackendError::Closed.to_string()))?;

        let mut record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        match block_on(producer.send(record, timeout)) {
            Ok((partition, offset)) => Ok(Delivery { partition, offset }),
            Err((e, _)) => Err(delivery_error(e, timeout)),
        }
    }

    fn close(&self) {
        self.producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

struct KafkaConsumer {
    consumer: Mutex<Option<BaseConsumer>>,
    timeout: Duration,
}

impl ConsumerHandle for KafkaConsumer {
    fn topics(&self) -> Result<Vec<String>, BackendError> {
        let guard = self.consumer.lock().unwrap_or_else(PoisonError::into_inner);
        let consumer = guard.as_ref().ok_or(BackendError::Closed)?;
        let metadata = consumer
            .fetch_metadata(None, self.timeout)
            .map_err(backend_error)?;
        let mut names: Vec<String> = metadata
            .topics()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn close(&self) {
        self.consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

struct KafkaAdmin {
    admin: Mutex<Option<AdminClient<DefaultClientContext>>>,
    timeout: Duration,
}

impl KafkaAdmin {
    fn options(&self) -> AdminOptions {
        AdminOptions::new()
            .operation_timeout(Some(self.timeout))
            .request_timeout(Some(self.timeout))
    }
}

impl AdminHandle for KafkaAdmin {
    fn create_topic(&self, topic: &NewTopic) -> Result<(), BackendError> {
        let guard = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        let admin = guard.as_ref().ok_or(BackendError::Closed)?;
        let new_topic = KafkaNewTopic::new(
            &topic.name,
            i32::try_from(topic.partitions).map_err(BackendError::broker)?,
            TopicReplication::Fixed(
                i32::try_from(topic.replication_factor).map_err(BackendError::broker)?,
            ),
        );

        let results = block_on(admin.create_topics(&[new_topic], &self.options()))
            .map_err(backend_error)?;
        for result in results {
            if let Err((name, code)) = result {
                return Err(BackendError::Broker(format!("topic '{name}': {code}")));
            }
        }
        Ok(())
    }

    fn delete_topic(&self, name: &str) -> Result<(), BackendError> {
        let guard = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        let admin = guard.as_ref().ok_or(BackendError::Closed)?;

        let results =
            block_on(admin.delete_topics(&[name], &self.options())).map_err(backend_error)?;
        for result in results {
            if let Err((name, code)) = result {
                return Err(BackendError::Broker(format!("topic '{name}': {code}")));
            }
        }
        Ok(())
    }

    fn describe_cluster(&self) -> Result<ClusterInfo, BackendError> {
        let guard = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        let admin = guard.as_ref().ok_or(BackendError::Closed)?;
        let client = admin.inner();
        let metadata = client
            .fetch_metadata(None, self.timeout)
            .map_err(backend_error)?;

        let brokers: Vec<String> = metadata
            .brokers()
            .iter()
            .map(|b| format!("{}@{}:{}", b.id(), b.host(), b.port()))
            .collect();
        let partitions: usize = metadata.topics().iter().map(|t| t.partitions().len()).sum();

        let mut info = ClusterInfo::new();
        info.push(
            "cluster_id",
            client
                .fetch_cluster_id(self.timeout)
                .unwrap_or_else(|| "unknown".to_string()),
        );
        info.push("controller_id", metadata.orig_broker_id());
        info.push("brokers", brokers.join(", "));
        info.push("topics", metadata.topics().len());
        info.push("partitions", partitions);
        Ok(info)
    }

    fn close(&self) {
        self.admin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Consumer polled in slices so a concurrent `close` gets the lock
/// within one slice.
struct KafkaRecordStream {
    consumer: Mutex<Option<BaseConsumer>>,
    closed: AtomicBool,
    slice: Duration,
}

impl RecordStream for KafkaRecordStream {
    fn poll(&self, timeout: Duration) -> Result<Polled, BackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(Polled::Closed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            {
                let guard = self.consumer.lock().unwrap_or_else(PoisonError::into_inner);
                let Some(consumer) = guard.as_ref() else {
                    return Ok(Polled::Closed);
                };
                match consumer.poll(remaining.min(self.slice)) {
                    Some(Ok(message)) => {
                        return Ok(Polled::Record(ConsumedRecord {
                            topic: message.topic().to_string(),
                            partition: message.partition(),
                            offset: message.offset(),
                            key: message.key().map(<[u8]>::to_vec),
                            value: message.payload().map(<[u8]>::to_vec),
                        }));
                    }
                    Some(Err(KafkaError::PartitionEOF(_))) => {}
                    Some(Err(e)) => return Err(backend_error(e)),
                    None => {}
                }
            }
            if Instant::now() >= deadline {
                return Ok(Polled::Idle);
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // dropping the consumer leaves its group, if any
        self.consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
