//! One-shot topic previews.
//!
//! Each fetch reads without a consumer group, so it always starts at the
//! earliest record and leaves no position behind. It ends after
//! `overview_cap` records, after `overview_idle_timeout_ms` without a new
//! record, or on the first error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::client::{ConnectionParams, Connector, Subscription};
use crate::config::ClientSettings;
use crate::session::SessionManager;
use crate::utils::error::{ClientError, Result};
use crate::worker::{EventReceiver, FailureKind, Limits, StreamSlot, WorkerJob};

pub struct BoundedFetcher {
    connector: Arc<dyn Connector>,
    settings: ClientSettings,
}

impl BoundedFetcher {
    pub fn new(connector: Arc<dyn Connector>, settings: ClientSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Preview `topic` on a worker thread using the session's profile.
    ///
    /// The topic must be in the session's current listing.
    pub fn fetch(
        &self,
        session: &SessionManager,
        topic: &str,
    ) -> Result<(FetchHandle, EventReceiver)> {
        let profile = session.current_profile().ok_or(ClientError::NotConnected)?;
        let topics = session.list_topics()?;
        if topics.is_empty() {
            return Err(ClientError::NoTopics);
        }
        if !topics.iter().any(|t| t == topic) {
            return Err(ClientError::UnknownTopic(topic.to_string()));
        }

        let (sink, events) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let slot = StreamSlot::default();
        let job = WorkerJob {
            connector: self.connector.clone(),
            params: ConnectionParams::from_profile(&profile),
            subscription: Subscription::preview(topic),
            sink,
            stop: stop.clone(),
            slot: slot.clone(),
            state: None,
            kind: FailureKind::Fetch,
            limits: Limits {
                cap: Some(self.settings.overview_cap),
                idle_timeout: Some(self.settings.overview_idle_timeout()),
                slice: self.settings.poll_interval(),
            },
        };
        let join = thread::spawn(move || job.run());
        info!(topic = %topic, cap = self.settings.overview_cap, "overview started");

        Ok((
            FetchHandle {
                topic: topic.to_string(),
                stop,
                slot,
                join: Some(join),
            },
            events,
        ))
    }
}

/// Handle of a running fetch. Dropping it detaches the worker, which still
/// finishes on its own.
pub struct FetchHandle {
    topic: String,
    stop: Arc<AtomicBool>,
    slot: StreamSlot,
    join: Option<JoinHandle<()>>,
}

impl FetchHandle {
    /// End the fetch early. The worker still emits `Finished`.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.slot.close();
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(topic = %self.topic, "overview worker panicked");
            }
        }
    }
}
