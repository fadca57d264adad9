use serde::Deserialize;
use thiserror::Error;

use crate::store::ConnectionProfile;

fn one() -> u32 {
    1
}

/// One request of the command surface.
///
/// JSON form is tagged by `type`, e.g. `{"type":"publish","topic":"t","payload":"hi"}`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "connect")]
    Connect { profile: String },

    #[serde(rename = "disconnect")]
    Disconnect,

    #[serde(rename = "list_profiles")]
    ListProfiles,

    #[serde(rename = "add_profile")]
    AddProfile {
        name: String,
        #[serde(flatten)]
        profile: ConnectionProfile,
    },

    #[serde(rename = "remove_profile")]
    RemoveProfile { name: String },

    #[serde(rename = "list_topics")]
    ListTopics,

    #[serde(rename = "publish")]
    Publish { topic: String, payload: String },

    #[serde(rename = "create_topic")]
    CreateTopic {
        name: String,
        #[serde(default = "one")]
        partitions: u32,
        #[serde(default = "one")]
        replicas: u32,
    },

    #[serde(rename = "delete_topic")]
    DeleteTopic { name: String },

    #[serde(rename = "describe_cluster")]
    DescribeCluster,

    #[serde(rename = "start_streaming")]
    StartStreaming { topic: String },

    #[serde(rename = "stop_streaming")]
    StopStreaming,

    #[serde(rename = "fetch_overview")]
    FetchOverview { topic: String },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid JSON command: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse one shell line: a JSON object, or a command word followed by arguments.
///
/// Command words ignore case, `-` and `_`, so `listTopics`, `list-topics`
/// and `list_topics` are the same. Profile names and payloads take the rest
/// of the line and may contain spaces.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    if line.starts_with('{') {
        return Ok(serde_json::from_str(line)?);
    }

    let (word, rest) = split_word(line);
    let rest = rest.trim();
    let normalized: String = word
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase();

    let command = match normalized.as_str() {
        "connect" => Command::Connect {
            profile: required(rest, "connect <profile name>")?.to_string(),
        },
        "disconnect" => Command::Disconnect,
        "listprofiles" | "profiles" => Command::ListProfiles,
        "addprofile" => {
            let usage = "add_profile <bootstrap address> <profile name>";
            let (address, name) = split_word(required(rest, usage)?);
            let name = required(name.trim(), usage)?;
            Command::AddProfile {
                name: name.to_string(),
                profile: ConnectionProfile::new(name, address),
            }
        }
        "removeprofile" => Command::RemoveProfile {
            name: required(rest, "remove_profile <profile name>")?.to_string(),
        },
        "listtopics" | "topics" => Command::ListTopics,
        "publish" => {
            let usage = "publish <topic> <payload>";
            let (topic, payload) = split_word(required(rest, usage)?);
            Command::Publish {
                topic: topic.to_string(),
                payload: payload.strip_prefix(' ').unwrap_or(payload).to_string(),
            }
        }
        "createtopic" => {
            let usage = "create_topic <name> [partitions] [replicas]";
            let mut args = rest.split_whitespace();
            let name = args.next().ok_or(ParseError::Usage(usage))?;
            let partitions = parse_count(args.next(), usage)?;
            let replicas = parse_count(args.next(), usage)?;
            if args.next().is_some() {
                return Err(ParseError::Usage(usage));
            }
            Command::CreateTopic {
                name: name.to_string(),
                partitions,
                replicas,
            }
        }
        "deletetopic" => Command::DeleteTopic {
            name: single(rest, "delete_topic <name>")?,
        },
        "describecluster" | "describe" => Command::DescribeCluster,
        "startstreaming" | "consume" => Command::StartStreaming {
            topic: single(rest, "start_streaming <topic>")?,
        },
        "stopstreaming" | "stop" => Command::StopStreaming,
        "fetchoverview" | "overview" => Command::FetchOverview {
            topic: single(rest, "fetch_overview <topic>")?,
        },
        _ => return Err(ParseError::Unknown(word.to_string())),
    };
    Ok(command)
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}

fn required<'a>(rest: &'a str, usage: &'static str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        Err(ParseError::Usage(usage))
    } else {
        Ok(rest)
    }
}

fn single(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(word), None) => Ok(word.to_string()),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn parse_count(arg: Option<&str>, usage: &'static str) -> Result<u32, ParseError> {
    match arg {
        None => Ok(1),
        Some(text) => text.parse().map_err(|_| ParseError::Usage(usage)),
    }
}
