//! Scripted in-memory connector for tests.
//!
//! A [`MockConnector`]:
//! - counts every handle it opens and closes, per kind
//! - fails building a chosen handle kind on demand
//! - returns a configurable outcome for every send
//! - records admin and publish calls
//! - feeds per-topic scripted items to subscribed streams

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TryRecvError;

use crate::client::{
    AdminHandle, BackendError, ClusterInfo, ConnectionParams, Connector, ConsumedRecord,
    ConsumerHandle, Delivery, DeliveryError, NewTopic, Polled, ProducerHandle, RecordStream,
    Subscription,
};
use crate::config::{ClientSettings, Settings};
use crate::worker::{EventReceiver, WorkerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Producer,
    Consumer,
    Admin,
    Stream,
}

impl HandleKind {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Ack,
    Timeout,
    Reject(String),
}

#[derive(Debug, Clone)]
enum FeedItem {
    Record(ConsumedRecord),
    Error(String),
    End,
    Panic,
}

#[derive(Default)]
struct Feeds {
    queues: HashMap<String, VecDeque<FeedItem>>,
    next_offsets: HashMap<String, i64>,
}

struct MockState {
    topics: Mutex<Vec<String>>,
    fail_on: Mutex<Option<HandleKind>>,
    publish: Mutex<PublishOutcome>,
    opened: [AtomicUsize; 4],
    closed: [AtomicUsize; 4],
    calls: Mutex<Vec<String>>,
    subscriptions: Mutex<Vec<Subscription>>,
    params: Mutex<Vec<ConnectionParams>>,
    feeds: Mutex<Feeds>,
    fed: Condvar,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            topics: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            publish: Mutex::new(PublishOutcome::Ack),
            opened: Default::default(),
            closed: Default::default(),
            calls: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
            feeds: Mutex::new(Feeds::default()),
            fed: Condvar::new(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topics(topics: &[&str]) -> Self {
        let mock = Self::new();
        mock.set_topics(topics);
        mock
    }

    pub fn set_topics(&self, topics: &[&str]) {
        *lock(&self.state.topics) = topics.iter().map(|t| t.to_string()).collect();
    }

    pub fn fail_on(&self, kind: HandleKind) {
        *lock(&self.state.fail_on) = Some(kind);
    }

    pub fn set_publish(&self, outcome: PublishOutcome) {
        *lock(&self.state.publish) = outcome;
    }

    pub fn opened(&self, kind: HandleKind) -> usize {
        self.state.opened[kind.index()].load(Ordering::SeqCst)
    }

    pub fn closed(&self, kind: HandleKind) -> usize {
        self.state.closed[kind.index()].load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state.calls).clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        lock(&self.state.subscriptions).clone()
    }

    /// Parameters of every handle built, in build order.
    pub fn params(&self) -> Vec<ConnectionParams> {
        lock(&self.state.params).clone()
    }

    pub fn push_record(&self, topic: &str, value: &[u8]) {
        let mut feeds = lock(&self.state.feeds);
        let next = feeds.next_offsets.entry(topic.to_string()).or_insert(0);
        let offset = *next;
        *next += 1;
        let record = ConsumedRecord {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key: None,
            value: Some(value.to_vec()),
        };
        self.push_locked(&mut feeds, topic, FeedItem::Record(record));
    }

    pub fn push_error(&self, topic: &str, message: &str) {
        let mut feeds = lock(&self.state.feeds);
        self.push_locked(&mut feeds, topic, FeedItem::Error(message.to_string()));
    }

    /// The stream reports `Closed` once it reaches this item.
    pub fn push_end(&self, topic: &str) {
        let mut feeds = lock(&self.state.feeds);
        self.push_locked(&mut feeds, topic, FeedItem::End);
    }

    /// The polling thread panics once it reaches this item.
    pub fn push_panic(&self, topic: &str) {
        let mut feeds = lock(&self.state.feeds);
        self.push_locked(&mut feeds, topic, FeedItem::Panic);
    }

    fn push_locked(&self, feeds: &mut Feeds, topic: &str, item: FeedItem) {
        feeds
            .queues
            .entry(topic.to_string())
            .or_default()
            .push_back(item);
        self.state.fed.notify_all();
    }

    fn open(&self, kind: HandleKind, params: &ConnectionParams) -> Result<(), BackendError> {
        if *lock(&self.state.fail_on) == Some(kind) {
            return Err(BackendError::Broker(format!("{kind:?} unavailable")));
        }
        lock(&self.state.params).push(params.clone());
        self.state.opened[kind.index()].fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn record_call(&self, call: String) {
        lock(&self.state.calls).push(call);
    }
}

/// Closes are counted once per handle.
struct Closer {
    state: Arc<MockState>,
    kind: HandleKind,
    closed: AtomicBool,
}

impl Closer {
    fn new(state: &Arc<MockState>, kind: HandleKind) -> Self {
        Self {
            state: state.clone(),
            kind,
            closed: AtomicBool::new(false),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closed[self.kind.index()].fetch_add(1, Ordering::SeqCst);
            let _feeds = lock(&self.state.feeds);
            self.state.fed.notify_all();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn producer(&self, params: &ConnectionParams) -> Result<Box<dyn ProducerHandle>, BackendError> {
        self.open(HandleKind::Producer, params)?;
        Ok(Box::new(MockProducer {
            mock: self.clone(),
            closer: Closer::new(&self.state, HandleKind::Producer),
        }))
    }

    fn consumer(&self, params: &ConnectionParams) -> Result<Box<dyn ConsumerHandle>, BackendError> {
        self.open(HandleKind::Consumer, params)?;
        Ok(Box::new(MockConsumer {
            mock: self.clone(),
            closer: Closer::new(&self.state, HandleKind::Consumer),
        }))
    }

    fn admin(&self, params: &ConnectionParams) -> Result<Box<dyn AdminHandle>, BackendError> {
        self.open(HandleKind::Admin, params)?;
        Ok(Box::new(MockAdmin {
            mock: self.clone(),
            closer: Closer::new(&self.state, HandleKind::Admin),
        }))
    }

    fn subscribe(
        &self,
        params: &ConnectionParams,
        subscription: &Subscription,
    ) -> Result<Arc<dyn RecordStream>, BackendError> {
        self.open(HandleKind::Stream, params)?;
        lock(&self.state.subscriptions).push(subscription.clone());
        Ok(Arc::new(MockStream {
            mock: self.clone(),
            topic: subscription.topic.clone(),
            closer: Closer::new(&self.state, HandleKind::Stream),
        }))
    }
}

struct MockProducer {
    mock: MockConnector,
    closer: Closer,
}

impl ProducerHandle for MockProducer {
    fn send(
        &self,
        topic: &str,
        _key: Option<&[u8]>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Delivery, DeliveryError> {
        if self.closer.is_closed() {
            return Err(DeliveryError::Rejected(BackendError::Closed.to_string()));
        }
        self.mock.record_call(format!("send:{topic}"));
        match lock(&self.mock.state.publish).clone() {
            PublishOutcome::Ack => {
                let mut feeds = lock(&self.mock.state.feeds);
                let next = feeds.next_offsets.entry(topic.to_string()).or_insert(0);
                let offset = *next;
                *next += 1;
                let record = ConsumedRecord {
                    topic: topic.to_string(),
                    partition: 0,
                    offset,
                    key: None,
                    value: Some(payload.to_vec()),
                };
                self.mock
                    .push_locked(&mut feeds, topic, FeedItem::Record(record));
                Ok(Delivery {
                    partition: 0,
                    offset,
                })
            }
            PublishOutcome::Timeout => Err(DeliveryError::TimedOut(timeout)),
            PublishOutcome::Reject(message) => Err(DeliveryError::Rejected(message)),
        }
    }

    fn close(&self) {
        self.closer.close();
    }
}

struct MockConsumer {
    mock: MockConnector,
    closer: Closer,
}

impl ConsumerHandle for MockConsumer {
    fn topics(&self) -> Result<Vec<String>, BackendError> {
        if self.closer.is_closed() {
            return Err(BackendError::Closed);
        }
        self.mock.record_call("topics".to_string());
        Ok(lock(&self.mock.state.topics).clone())
    }

    fn close(&self) {
        self.closer.close();
    }
}

struct MockAdmin {
    mock: MockConnector,
    closer: Closer,
}

impl AdminHandle for MockAdmin {
    fn create_topic(&self, topic: &NewTopic) -> Result<(), BackendError> {
        self.mock.record_call(format!(
            "create:{}:{}:{}",
            topic.name, topic.partitions, topic.replication_factor
        ));
        let mut topics = lock(&self.mock.state.topics);
        if topics.contains(&topic.name) {
            return Err(BackendError::Broker(format!("topic '{}' already exists", topic.name)));
        }
        topics.push(topic.name.clone());
        Ok(())
    }

    fn delete_topic(&self, name: &str) -> Result<(), BackendError> {
        self.mock.record_call(format!("delete:{name}"));
        lock(&self.mock.state.topics).retain(|t| t != name);
        Ok(())
    }

    fn describe_cluster(&self) -> Result<ClusterInfo, BackendError> {
        let mut info = ClusterInfo::new();
        info.push("cluster_id", "mock-cluster");
        info.push("topics", lock(&self.mock.state.topics).len());
        Ok(info)
    }

    fn close(&self) {
        self.closer.close();
    }
}

struct MockStream {
    mock: MockConnector,
    topic: String,
    closer: Closer,
}

impl RecordStream for MockStream {
    fn poll(&self, timeout: Duration) -> Result<Polled, BackendError> {
        let deadline = Instant::now() + timeout;
        let mut feeds = lock(&self.mock.state.feeds);
        loop {
            if self.closer.is_closed() {
                return Ok(Polled::Closed);
            }
            let item = feeds
                .queues
                .get_mut(&self.topic)
                .and_then(VecDeque::pop_front);
            match item {
                Some(FeedItem::Record(record)) => return Ok(Polled::Record(record)),
                Some(FeedItem::Error(message)) => return Err(BackendError::Broker(message)),
                Some(FeedItem::End) => return Ok(Polled::Closed),
                Some(FeedItem::Panic) => {
                    drop(feeds);
                    panic!("scripted stream panic");
                }
                None => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Polled::Idle);
            }
            feeds = self
                .mock
                .state
                .fed
                .wait_timeout(feeds, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn close(&self) {
        self.closer.close();
    }
}

/// Client settings with short timings for tests.
pub fn fast_settings() -> ClientSettings {
    ClientSettings {
        poll_interval_ms: 10,
        overview_idle_timeout_ms: 200,
        ..Settings::default().client
    }
}

/// Wait up to `timeout` for the next event without a runtime.
pub fn next_event(events: &mut EventReceiver, timeout: Duration) -> Option<WorkerEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        match events.try_recv() {
            Ok(event) => return Some(event),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => {
                if Instant::now() >= deadline {
                    return None;
                }
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }
}

/// All events up to and including `Finished`.
pub fn collect_until_finished(events: &mut EventReceiver, timeout: Duration) -> Vec<WorkerEvent> {
    let deadline = Instant::now() + timeout;
    let mut collected = Vec::new();
    while let Some(event) = next_event(events, deadline.saturating_duration_since(Instant::now())) {
        let finished = event == WorkerEvent::Finished;
        collected.push(event);
        if finished {
            break;
        }
    }
    collected
}
