use crate::store::{ConnectionProfile, SecurityProtocol};

/// Connection parameters derived from a [`ConnectionProfile`].
///
/// Every handle of a session, and every worker connection, is built from the
/// same value. Optional profile fields that hold only whitespace are `None`
/// here: broker clients treat an empty string differently from an absent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub bootstrap_address: String,
    pub security_protocol: SecurityProtocol,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub tls_ca_path: Option<String>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ConnectionParams {
    pub fn from_profile(profile: &ConnectionProfile) -> Self {
        Self {
            bootstrap_address: profile.bootstrap_address.trim().to_string(),
            security_protocol: profile.security_protocol,
            sasl_mechanism: non_empty(&profile.sasl_mechanism),
            sasl_username: non_empty(&profile.sasl_username),
            // passwords may legitimately carry surrounding spaces
            sasl_password: profile
                .sasl_password
                .clone()
                .filter(|p| !p.is_empty()),
            tls_ca_path: non_empty(&profile.tls_ca_path),
            tls_cert_path: non_empty(&profile.tls_cert_path),
            tls_key_path: non_empty(&profile.tls_key_path),
        }
    }

    /// Path of the embedded broker when the address uses the `local://` scheme.
    pub fn local_path(&self) -> Option<&str> {
        self.bootstrap_address.strip_prefix(LOCAL_SCHEME)
    }
}

pub const LOCAL_SCHEME: &str = "local://";

/// How a topic-scoped worker consumer reads.
///
/// A consumer with a group resumes from the group's committed position, or
/// from the earliest record when there is none, and commits every record it
/// delivers. A consumer without a group reads every partition from the
/// earliest record and leaves no position behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub group_id: Option<String>,
}

impl Subscription {
    /// Live streaming: resumes and persists the group's read position.
    pub fn streaming(topic: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group_id: Some(group_id.into()),
        }
    }

    /// Preview: no group, so repeated previews always start from the
    /// earliest record.
    pub fn preview(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group_id: None,
        }
    }

    pub fn commits(&self) -> bool {
        self.group_id.is_some()
    }
}
