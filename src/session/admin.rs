//! Topic administration through the session's admin handle.

use tracing::{info, warn};

use crate::client::{ClusterInfo, NewTopic};
use crate::session::SessionManager;
use crate::session::manager::require_topic;
use crate::utils::error::{AdminAction, ClientError, Result};

impl SessionManager {
    pub fn create_topic(&self, name: &str, partitions: u32, replication_factor: u32) -> Result<()> {
        self.with_session(|session| {
            let name = name.trim();
            if name.is_empty() {
                return Err(ClientError::admin(
                    AdminAction::CreateTopic,
                    "topic name must not be empty",
                ));
            }
            if partitions < 1 || replication_factor < 1 {
                return Err(ClientError::admin(
                    AdminAction::CreateTopic,
                    "partitions and replication factor must be at least 1",
                ));
            }

            let topic = NewTopic {
                name: name.to_string(),
                partitions,
                replication_factor,
            };
            session.admin().create_topic(&topic).map_err(|e| {
                warn!(topic = %name, error = %e, "create topic failed");
                ClientError::admin(AdminAction::CreateTopic, e.to_string())
            })?;
            info!(topic = %name, partitions, replication_factor, "topic created");
            Ok(())
        })
    }

    /// Delete `name` after checking it against a fresh listing.
    pub fn delete_topic(&self, name: &str) -> Result<()> {
        self.with_session(|session| {
            require_topic(session, name)?;
            session.admin().delete_topic(name).map_err(|e| {
                warn!(topic = %name, error = %e, "delete topic failed");
                ClientError::admin(AdminAction::DeleteTopic, e.to_string())
            })?;
            info!(topic = %name, "topic deleted");
            Ok(())
        })
    }

    pub fn describe_cluster(&self) -> Result<ClusterInfo> {
        self.with_session(|session| {
            session
                .admin()
                .describe_cluster()
                .map_err(|e| ClientError::admin(AdminAction::DescribeCluster, e.to_string()))
        })
    }
}
