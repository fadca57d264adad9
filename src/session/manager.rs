use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{error, info};

use crate::client::{BackendError, ConnectionParams, Connector};
use crate::config::ClientSettings;
use crate::session::{Session, SessionInfo};
use crate::store::ConnectionProfile;
use crate::utils::error::{AdminAction, ClientError, Result};

/// Owner of the single active [`Session`].
///
/// The session lives behind a mutex: connects are serialized, and an
/// operation never sees a handle that a concurrent connect has replaced.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    settings: ClientSettings,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, settings: ClientSettings) -> Self {
        Self {
            connector,
            settings,
            session: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active session with one built from `profile`.
    ///
    /// The previous session is closed first. When any handle cannot be built
    /// the ones already built are closed and no session remains.
    pub fn connect(&self, profile: &ConnectionProfile) -> Result<SessionInfo> {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            info!(profile = %previous.profile().name, "closing previous session");
            drop(previous);
        }

        match open_session(self.connector.as_ref(), profile) {
            Ok(session) => {
                let info = session.info();
                info!(
                    profile = %info.profile,
                    bootstrap = %info.bootstrap_address,
                    protocol = %info.security_protocol,
                    "connected"
                );
                *slot = Some(session);
                Ok(info)
            }
            Err(e) => {
                error!(profile = %profile.name, error = %e, "connect failed");
                Err(ClientError::Connection {
                    profile: profile.name.clone(),
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Close the active session. Returns whether there was one.
    pub fn disconnect(&self) -> bool {
        match self.slot().take() {
            Some(session) => {
                info!(profile = %session.profile().name, "disconnected");
                true
            }
            None => false,
        }
    }

    pub fn current_session(&self) -> Option<SessionInfo> {
        self.slot().as_ref().map(Session::info)
    }

    /// Profile of the active session, for opening worker connections.
    pub fn current_profile(&self) -> Option<ConnectionProfile> {
        self.slot().as_ref().map(|s| s.profile().clone())
    }

    /// Run `f` against the active session, or fail with `NotConnected`.
    pub(crate) fn with_session<T>(&self, f: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        let slot = self.slot();
        let session = slot.as_ref().ok_or(ClientError::NotConnected)?;
        f(session)
    }

    /// Topic names, fetched fresh from the broker.
    pub fn list_topics(&self) -> Result<Vec<String>> {
        self.with_session(list_topics)
    }
}

pub(crate) fn list_topics(session: &Session) -> Result<Vec<String>> {
    session
        .consumer()
        .topics()
        .map_err(|e| ClientError::admin(AdminAction::ListTopics, e.to_string()))
}

/// Ensure `topic` is in a fresh, non-empty listing.
pub(crate) fn require_topic(session: &Session, topic: &str) -> Result<()> {
    let topics = list_topics(session)?;
    if topics.is_empty() {
        return Err(ClientError::NoTopics);
    }
    if !topics.iter().any(|t| t == topic) {
        return Err(ClientError::UnknownTopic(topic.to_string()));
    }
    Ok(())
}

fn open_session(
    connector: &dyn Connector,
    profile: &ConnectionProfile,
) -> std::result::Result<Session, BackendError> {
    let params = ConnectionParams::from_profile(profile);

    let producer = connector.producer(&params)?;
    let consumer = match connector.consumer(&params) {
        Ok(consumer) => consumer,
        Err(e) => {
            producer.close();
            return Err(e);
        }
    };
    let admin = match connector.admin(&params) {
        Ok(admin) => admin,
        Err(e) => {
            producer.close();
            consumer.close();
            return Err(e);
        }
    };

    Ok(Session {
        profile: profile.clone(),
        params,
        connected_at: Utc::now(),
        producer,
        consumer,
        admin,
    })
}
