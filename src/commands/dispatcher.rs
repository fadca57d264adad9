use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::client::{ClusterInfo, Connector};
use crate::commands::message::Command;
use crate::config::ClientSettings;
use crate::session::{PublishReceipt, SessionInfo, SessionManager};
use crate::store::ProfileStore;
use crate::utils::error::{ClientError, Result};
use crate::worker::{BoundedFetcher, EventReceiver, FetchHandle, StreamingConsumer};

/// Outcome of one dispatched [`Command`].
pub enum Reply {
    Connected(SessionInfo),
    Disconnected(bool),
    Profiles(Vec<String>),
    ProfileAdded(String),
    ProfileRemoved {
        name: String,
        /// The session moved to this profile because the removed one was active.
        reconnected: Option<SessionInfo>,
    },
    Topics(Vec<String>),
    Published(PublishReceipt),
    TopicCreated(String),
    TopicDeleted(String),
    Cluster(ClusterInfo),
    Streaming {
        topic: String,
        events: EventReceiver,
    },
    /// Topic of the worker that was running, if any.
    StreamStopped(Option<String>),
    Overview {
        topic: String,
        handle: FetchHandle,
        events: EventReceiver,
    },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Connected(info) => write!(
                f,
                "Connected to {} ({}, {})",
                info.bootstrap_address, info.profile, info.security_protocol
            ),
            Reply::Disconnected(true) => f.write_str("Disconnected"),
            Reply::Disconnected(false) => f.write_str("Not connected"),
            Reply::Profiles(names) => f.write_str(&names.join("\n")),
            Reply::ProfileAdded(name) => write!(f, "Profile '{name}' added"),
            Reply::ProfileRemoved { name, reconnected } => {
                write!(f, "Profile '{name}' removed")?;
                match reconnected {
                    Some(info) => write!(f, "; connected to '{}'", info.profile),
                    None => Ok(()),
                }
            }
            Reply::Topics(topics) if topics.is_empty() => f.write_str("No topics available"),
            Reply::Topics(topics) => f.write_str(&topics.join("\n")),
            Reply::Published(receipt) => write!(
                f,
                "Published to {} (partition {}, offset {})",
                receipt.topic, receipt.partition, receipt.offset
            ),
            Reply::TopicCreated(name) => write!(f, "Topic '{name}' created"),
            Reply::TopicDeleted(name) => write!(f, "Topic '{name}' deleted"),
            Reply::Cluster(info) => write!(f, "{}", info.to_string().trim_end()),
            Reply::Streaming { topic, .. } => write!(f, "Streaming '{topic}'"),
            Reply::StreamStopped(Some(topic)) => write!(f, "Stopped consuming '{topic}'"),
            Reply::StreamStopped(None) => f.write_str("Not consuming"),
            Reply::Overview { topic, .. } => write!(f, "Fetching overview of '{topic}'"),
        }
    }
}

/// Runs commands against the profile store, the session and the workers.
pub struct Dispatcher {
    profiles: ProfileStore,
    session: SessionManager,
    streaming: StreamingConsumer,
    fetcher: BoundedFetcher,
}

impl Dispatcher {
    pub fn new(
        connector: Arc<dyn Connector>,
        settings: ClientSettings,
        profiles: ProfileStore,
    ) -> Self {
        Self {
            profiles,
            session: SessionManager::new(connector.clone(), settings.clone()),
            streaming: StreamingConsumer::new(connector.clone(), settings.clone()),
            fetcher: BoundedFetcher::new(connector, settings),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Reply> {
        match command {
            Command::Connect { profile } => {
                let profile = self
                    .profiles
                    .get(&profile)
                    .ok_or(ClientError::UnknownProfile(profile))?;
                Ok(Reply::Connected(self.session.connect(profile)?))
            }
            Command::Disconnect => Ok(Reply::Disconnected(self.session.disconnect())),
            Command::ListProfiles => Ok(Reply::Profiles(self.profiles.names())),
            Command::AddProfile { name, mut profile } => {
                profile.name = name;
                self.profiles.add(profile.clone())?;
                self.profiles.save()?;
                info!(profile = %profile.name, "profile added");
                Ok(Reply::ProfileAdded(profile.name.trim().to_string()))
            }
            Command::RemoveProfile { name } => self.remove_profile(name),
            Command::ListTopics => Ok(Reply::Topics(self.session.list_topics()?)),
            Command::Publish { topic, payload } => {
                Ok(Reply::Published(self.session.publish_text(&topic, &payload)?))
            }
            Command::CreateTopic {
                name,
                partitions,
                replicas,
            } => {
                self.session.create_topic(&name, partitions, replicas)?;
                Ok(Reply::TopicCreated(name.trim().to_string()))
            }
            Command::DeleteTopic { name } => {
                self.session.delete_topic(&name)?;
                Ok(Reply::TopicDeleted(name))
            }
            Command::DescribeCluster => Ok(Reply::Cluster(self.session.describe_cluster()?)),
            Command::StartStreaming { topic } => {
                let profile = self
                    .session
                    .current_profile()
                    .ok_or(ClientError::NotConnected)?;
                let events = self.streaming.start(&topic, &profile);
                Ok(Reply::Streaming { topic, events })
            }
            Command::StopStreaming => {
                let topic = self.streaming.topic().map(str::to_string);
                self.streaming.stop();
                Ok(Reply::StreamStopped(topic))
            }
            Command::FetchOverview { topic } => {
                let (handle, events) = self.fetcher.fetch(&self.session, &topic)?;
                Ok(Reply::Overview {
                    topic,
                    handle,
                    events,
                })
            }
        }
    }

    /// Remove a profile. When it backs the active session, the session moves
    /// to the first remaining profile, or is closed when none is left.
    fn remove_profile(&mut self, name: String) -> Result<Reply> {
        if self.profiles.remove(&name).is_none() {
            return Err(ClientError::UnknownProfile(name));
        }
        self.profiles.save()?;
        info!(profile = %name, "profile removed");

        let was_active = self
            .session
            .current_session()
            .is_some_and(|info| info.profile == name);
        if !was_active {
            return Ok(Reply::ProfileRemoved {
                name,
                reconnected: None,
            });
        }

        let reconnected = match self.profiles.first().cloned() {
            Some(next) => Some(self.session.connect(&next)?),
            None => {
                self.session.disconnect();
                None
            }
        };
        Ok(Reply::ProfileRemoved { name, reconnected })
    }
}
