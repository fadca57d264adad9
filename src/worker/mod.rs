//! Background consumption workers.
//!
//! Both workers run on a dedicated `std::thread` with their own topic-scoped
//! [`RecordStream`], never the session's handles, and report through a
//! per-worker unbounded channel of [`WorkerEvent`]s. A worker never returns
//! an error: a failure becomes one `Error` event. Every started worker emits
//! exactly one `Finished`, also when it unwinds.
//!
//! - [`StreamingConsumer`]: long-running, stopped explicitly.
//! - [`BoundedFetcher`]: one-shot preview of at most `overview_cap` records.

pub mod overview;
pub mod streaming;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::client::{
    ConnectionParams, Connector, ConsumedRecord, Polled, RecordStream, Subscription,
};

pub use overview::{BoundedFetcher, FetchHandle};
pub use streaming::StreamingConsumer;

pub type EventSender = UnboundedSender<WorkerEvent>;
pub type EventReceiver = UnboundedReceiver<WorkerEvent>;

/// A consumed record with key and value decoded as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: String,
}

impl RecordView {
    pub fn decode(record: &ConsumedRecord) -> Self {
        Self {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            key: record
                .key
                .as_deref()
                .map(|key| decode_lossy(key, &record.topic, record.offset, "key")),
            value: record
                .value
                .as_deref()
                .map(|value| decode_lossy(value, &record.topic, record.offset, "value"))
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for RecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}@{}] ", self.topic, self.partition, self.offset)?;
        if let Some(key) = &self.key {
            write!(f, "{key} => ")?;
        }
        f.write_str(&self.value)
    }
}

/// UTF-8 decode that never fails. Invalid sequences become U+FFFD and are logged.
pub fn decode_lossy(bytes: &[u8], topic: &str, offset: i64, field: &str) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(topic = %topic, offset, field, error = %e, "invalid UTF-8 replaced");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Stream,
    Fetch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Stream => f.write_str("stream"),
            FailureKind::Fetch => f.write_str("fetch"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} failed: {message}")]
pub struct WorkerFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Record(RecordView),
    Error(WorkerFailure),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Running,
    StopRequested,
    Stopped,
}

pub(crate) type SharedState = Arc<Mutex<WorkerState>>;

pub(crate) fn set_state(state: &SharedState, next: WorkerState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

pub(crate) fn get_state(state: &SharedState) -> WorkerState {
    *state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The worker's stream, reachable from the foreground so a stop can close it.
#[derive(Clone, Default)]
pub(crate) struct StreamSlot(Arc<Mutex<Option<Arc<dyn RecordStream>>>>);

impl StreamSlot {
    fn set(&self, stream: Arc<dyn RecordStream>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(stream);
    }

    pub(crate) fn close(&self) {
        let stream = self.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(stream) = stream {
            stream.close();
        }
    }
}

/// Emits `Finished` exactly once when the worker body ends, however it ends.
/// The stream is closed and the state settled first, so a receiver that sees
/// `Finished` also sees the connection released.
struct FinishGuard {
    sink: EventSender,
    slot: StreamSlot,
    state: Option<SharedState>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.slot.close();
        if let Some(state) = &self.state {
            set_state(state, WorkerState::Stopped);
        }
        if std::thread::panicking() {
            warn!("worker panicked; finishing");
        }
        let _ = self.sink.send(WorkerEvent::Finished);
    }
}

/// Bounds of one worker's emission loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub cap: Option<usize>,
    pub idle_timeout: Option<Duration>,
    pub slice: Duration,
}

/// Everything a worker thread needs; moved into the thread.
pub(crate) struct WorkerJob {
    pub connector: Arc<dyn Connector>,
    pub params: ConnectionParams,
    pub subscription: Subscription,
    pub sink: EventSender,
    pub stop: Arc<AtomicBool>,
    pub slot: StreamSlot,
    pub state: Option<SharedState>,
    pub kind: FailureKind,
    pub limits: Limits,
}

impl WorkerJob {
    pub(crate) fn run(self) {
        let _guard = FinishGuard {
            sink: self.sink.clone(),
            slot: self.slot.clone(),
            state: self.state.clone(),
        };
        let topic = self.subscription.topic.as_str();

        let stream = match self.connector.subscribe(&self.params, &self.subscription) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(topic = %topic, kind = %self.kind, error = %e, "worker could not subscribe");
                self.fail(e.to_string());
                return;
            }
        };
        self.slot.set(stream.clone());

        let emitted = self.pump(stream.as_ref());
        debug!(topic = %topic, kind = %self.kind, emitted, "worker loop ended");
    }

    fn fail(&self, message: String) {
        let _ = self.sink.send(WorkerEvent::Error(WorkerFailure {
            kind: self.kind,
            message,
        }));
    }

    /// Poll and emit until stopped, capped, idle too long, closed or failed.
    fn pump(&self, stream: &dyn RecordStream) -> usize {
        let mut emitted = 0usize;
        let mut last_activity = Instant::now();

        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            if self.limits.cap.is_some_and(|cap| emitted >= cap) {
                break;
            }

            match stream.poll(self.limits.slice) {
                Ok(Polled::Record(record)) => {
                    if self.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let view = RecordView::decode(&record);
                    if self.sink.send(WorkerEvent::Record(view)).is_err() {
                        debug!(topic = %record.topic, "event receiver dropped");
                        break;
                    }
                    emitted += 1;
                    last_activity = Instant::now();
                }
                Ok(Polled::Idle) => {
                    if self
                        .limits
                        .idle_timeout
                        .is_some_and(|idle| last_activity.elapsed() >= idle)
                    {
                        break;
                    }
                }
                Ok(Polled::Closed) => break,
                Err(e) => {
                    let topic = self.subscription.topic.as_str();
                    if self.stop.load(Ordering::SeqCst) {
                        debug!(topic = %topic, kind = %self.kind, error = %e, "stream error after stop");
                    } else {
                        warn!(topic = %topic, kind = %self.kind, error = %e, "worker stream failed");
                        self.fail(e.to_string());
                    }
                    break;
                }
            }
        }
        emitted
    }
}
