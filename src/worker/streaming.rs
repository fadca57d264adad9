//! Live streaming of one topic until stopped.
//!
//! The consumer joins the stable group `client.consumer_group` with
//! auto-commit on, so a restarted stream resumes after the last record it
//! delivered. One worker at most: starting again stops and joins the
//! previous one first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::client::{ConnectionParams, Connector, Subscription};
use crate::config::ClientSettings;
use crate::store::ConnectionProfile;
use crate::worker::{
    EventReceiver, FailureKind, Limits, SharedState, StreamSlot, WorkerJob, WorkerState,
    get_state, set_state,
};

struct RunningWorker {
    topic: String,
    stop: Arc<AtomicBool>,
    slot: StreamSlot,
    join: JoinHandle<()>,
}

pub struct StreamingConsumer {
    connector: Arc<dyn Connector>,
    settings: ClientSettings,
    state: SharedState,
    worker: Option<RunningWorker>,
}

impl StreamingConsumer {
    pub fn new(connector: Arc<dyn Connector>, settings: ClientSettings) -> Self {
        Self {
            connector,
            settings,
            state: Arc::new(Mutex::new(WorkerState::Idle)),
            worker: None,
        }
    }

    /// Start streaming `topic` with a connection built from `profile`.
    ///
    /// Records, a possible failure and the final `Finished` arrive on the
    /// returned receiver.
    pub fn start(&mut self, topic: &str, profile: &ConnectionProfile) -> EventReceiver {
        if self.worker.is_some() {
            self.stop();
        }

        let (sink, events) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let slot = StreamSlot::default();
        set_state(&self.state, WorkerState::Running);

        let job = WorkerJob {
            connector: self.connector.clone(),
            params: ConnectionParams::from_profile(profile),
            subscription: Subscription::streaming(topic, self.settings.consumer_group.clone()),
            sink,
            stop: stop.clone(),
            slot: slot.clone(),
            state: Some(self.state.clone()),
            kind: FailureKind::Stream,
            limits: Limits {
                cap: None,
                idle_timeout: None,
                slice: self.settings.poll_interval(),
            },
        };
        let join = thread::spawn(move || job.run());
        info!(topic = %topic, profile = %profile.name, "streaming started");

        self.worker = Some(RunningWorker {
            topic: topic.to_string(),
            stop,
            slot,
            join,
        });
        events
    }

    /// Stop the worker and wait for it. Returns once the state is `Stopped`.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if get_state(&self.state) == WorkerState::Running {
            set_state(&self.state, WorkerState::StopRequested);
        }
        worker.stop.store(true, Ordering::SeqCst);
        worker.slot.close();
        if worker.join.join().is_err() {
            error!(topic = %worker.topic, "streaming worker panicked");
        }
        set_state(&self.state, WorkerState::Stopped);
        info!(topic = %worker.topic, "streaming stopped");
    }

    /// Current state. A worker that ended on its own is joined here, so
    /// `Stopped` always means the thread is gone.
    pub fn state(&mut self) -> WorkerState {
        self.reap();
        get_state(&self.state)
    }

    /// Topic of the running worker.
    pub fn topic(&mut self) -> Option<&str> {
        self.reap();
        self.worker.as_ref().map(|w| w.topic.as_str())
    }

    // the worker body marks the shared state `Stopped` just before its thread exits
    fn reap(&mut self) {
        if self.worker.is_some() && get_state(&self.state) == WorkerState::Stopped {
            self.stop();
        }
    }
}

impl Drop for StreamingConsumer {
    fn drop(&mut self) {
        self.stop();
    }
}
