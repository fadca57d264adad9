use tracing::{info, warn};

use crate::client::DeliveryError;
use crate::session::SessionManager;
use crate::session::manager::require_topic;
use crate::utils::error::{ClientError, Result};

/// Where the broker stored a published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl SessionManager {
    /// Send one record and block until it is acknowledged or the publish timeout passes.
    ///
    /// The topic must exist in a fresh listing.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<PublishReceipt> {
        let timeout = self.settings().publish_timeout();
        self.with_session(|session| {
            require_topic(session, topic)?;

            match session.producer().send(topic, None, payload, timeout) {
                Ok(delivery) => {
                    info!(
                        topic = %topic,
                        partition = delivery.partition,
                        offset = delivery.offset,
                        "published"
                    );
                    Ok(PublishReceipt {
                        topic: topic.to_string(),
                        partition: delivery.partition,
                        offset: delivery.offset,
                    })
                }
                Err(DeliveryError::TimedOut(_)) => {
                    warn!(topic = %topic, timeout_secs = timeout.as_secs(), "publish timed out");
                    Err(ClientError::PublishTimeout {
                        topic: topic.to_string(),
                        timeout,
                    })
                }
                Err(DeliveryError::Rejected(message)) => {
                    warn!(topic = %topic, error = %message, "publish rejected");
                    Err(ClientError::Publish {
                        topic: topic.to_string(),
                        message,
                    })
                }
            }
        })
    }

    pub fn publish_text(&self, topic: &str, text: &str) -> Result<PublishReceipt> {
        self.publish(topic, text.as_bytes())
    }
}
