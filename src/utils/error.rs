//! The `error` module defines the error types surfaced by `boarlink`.
//!
//! Synchronous operations (connect, admin, publish, profile storage) return
//! [`ClientError`]. Background workers never return errors; they report a
//! single failure event on their sink instead (see `crate::worker`).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Admin operation that failed, used to label [`ClientError::Admin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    CreateTopic,
    DeleteTopic,
    DescribeCluster,
    ListTopics,
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AdminAction::CreateTopic => "create topic",
            AdminAction::DeleteTopic => "delete topic",
            AdminAction::DescribeCluster => "describe cluster",
            AdminAction::ListTopics => "list topics",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// Building one of the session handles failed. No session is active afterwards.
    #[error("failed to connect profile '{profile}': {cause}")]
    Connection { profile: String, cause: String },

    #[error("not connected to any server")]
    NotConnected,

    #[error("no topics available")]
    NoTopics,

    #[error("topic '{0}' does not exist")]
    UnknownTopic(String),

    #[error("publish to '{topic}' timed out after {}s", .timeout.as_secs())]
    PublishTimeout { topic: String, timeout: Duration },

    #[error("publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    #[error("{action} failed: {message}")]
    Admin {
        action: AdminAction,
        message: String,
    },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    pub(crate) fn admin(action: AdminAction, message: impl Into<String>) -> Self {
        ClientError::Admin {
            action,
            message: message.into(),
        }
    }
}

/// Failures reading or writing the JSON profile and preference files.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store file '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("profile '{0}' already exists")]
    DuplicateProfile(String),

    #[error("profile name must not be empty")]
    EmptyProfileName,

    #[error("no connection profiles stored")]
    NoProfiles,
}

pub type Result<T> = std::result::Result<T, ClientError>;
