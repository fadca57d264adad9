use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::error;

use boarlink::client::RoutingConnector;
use boarlink::commands::{Command, Dispatcher, Reply, parse_line};
use boarlink::config::{Settings, load_config};
use boarlink::store::{ConnectionProfile, PreferencesStore, ProfileStore, SecurityProtocol};
use boarlink::utils::error::{ClientError, Result, StoreError};
use boarlink::utils::logging;
use boarlink::worker::WorkerEvent;

#[derive(Parser)]
#[command(
    name = "boarlink",
    version,
    about = "Connect to a message broker, manage topics, publish and consume"
)]
struct Cli {
    /// Connection profile store (JSON)
    #[arg(long, value_name = "FILE")]
    profiles: Option<PathBuf>,

    /// Preferences store (JSON)
    #[arg(long, value_name = "FILE")]
    preferences: Option<PathBuf>,

    /// Profile to connect with; defaults to the first stored profile
    #[arg(long, short = 'p', value_name = "NAME")]
    profile: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List topics
    Topics,
    /// Publish one text message
    Publish { topic: String, payload: String },
    /// Stream a topic until Ctrl-C
    Consume { topic: String },
    /// Show the first messages of a topic
    Overview { topic: String },
    CreateTopic {
        name: String,
        #[arg(long, default_value_t = 1)]
        partitions: u32,
        #[arg(long, default_value_t = 1)]
        replicas: u32,
    },
    DeleteTopic { name: String },
    /// Describe the cluster
    Describe,
    /// Manage stored connection profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Show the preferences, or turn logging on or off
    Logging {
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        enabled: Option<bool>,
    },
    /// Interactive shell, one command per line
    Shell,
}

#[derive(Subcommand)]
enum ProfileAction {
    List,
    Add {
        name: String,
        bootstrap_address: String,
        #[arg(long, default_value = "PLAINTEXT")]
        security_protocol: SecurityProtocol,
        #[arg(long)]
        sasl_mechanism: Option<String>,
        #[arg(long)]
        sasl_username: Option<String>,
        #[arg(long)]
        sasl_password: Option<String>,
        #[arg(long)]
        tls_ca: Option<String>,
        #[arg(long)]
        tls_cert: Option<String>,
        #[arg(long)]
        tls_key: Option<String>,
    },
    Remove {
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let preferences_path = cli
        .preferences
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.storage.preferences_path));
    let mut preferences = match PreferencesStore::load(preferences_path) {
        Ok(preferences) => preferences,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let CliCommand::Logging { enabled } = cli.command {
        return match manage_logging(&mut preferences, enabled) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }
    let log_dir = settings.storage.log_dir.as_deref().map(Path::new);
    if let Some(path) = logging::init(&cli.log_level, preferences.logging_enabled(), log_dir) {
        eprintln!("Logging to {}", path.display());
    }

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let profiles_path = cli
        .profiles
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.storage.profiles_path));
    let mut profiles = ProfileStore::load(profiles_path)?;

    let command = match cli.command {
        CliCommand::Profiles { action } => return manage_profiles(&mut profiles, action),
        CliCommand::Logging { .. } => return Ok(()),
        CliCommand::Shell => None,
        CliCommand::Topics => Some(Command::ListTopics),
        CliCommand::Publish { topic, payload } => Some(Command::Publish { topic, payload }),
        CliCommand::Consume { topic } => Some(Command::StartStreaming { topic }),
        CliCommand::Overview { topic } => Some(Command::FetchOverview { topic }),
        CliCommand::CreateTopic {
            name,
            partitions,
            replicas,
        } => Some(Command::CreateTopic {
            name,
            partitions,
            replicas,
        }),
        CliCommand::DeleteTopic { name } => Some(Command::DeleteTopic { name }),
        CliCommand::Describe => Some(Command::DescribeCluster),
    };

    let profile = match cli.profile {
        Some(name) => name,
        None => profiles
            .first()
            .map(|p| p.name.clone())
            .ok_or(StoreError::NoProfiles)?,
    };
    let mut dispatcher = Dispatcher::new(
        Arc::new(RoutingConnector::from_settings(&settings)),
        settings.client.clone(),
        profiles,
    );
    let reply = dispatcher.dispatch(Command::Connect { profile })?;
    println!("{reply}");

    let Some(command) = command else {
        return shell(dispatcher).await;
    };

    match dispatcher.dispatch(command)? {
        Reply::Streaming { topic, mut events } => {
            println!("Streaming '{topic}', Ctrl-C to stop");
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(WorkerEvent::Finished) | None => break,
                        Some(event) => print_event(&event),
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            let reply =
                tokio::task::block_in_place(|| dispatcher.dispatch(Command::StopStreaming))?;
            println!("{reply}");
        }
        Reply::Overview {
            handle, mut events, ..
        } => {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(WorkerEvent::Finished) | None => break,
                        Some(event) => print_event(&event),
                    },
                    _ = tokio::signal::ctrl_c() => handle.cancel(),
                }
            }
            tokio::task::block_in_place(|| handle.join());
        }
        reply => println!("{reply}"),
    }
    Ok(())
}

fn manage_profiles(profiles: &mut ProfileStore, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::List => {
            for name in profiles.names() {
                println!("{name}");
            }
        }
        ProfileAction::Add {
            name,
            bootstrap_address,
            security_protocol,
            sasl_mechanism,
            sasl_username,
            sasl_password,
            tls_ca,
            tls_cert,
            tls_key,
        } => {
            let profile = ConnectionProfile::new(name, bootstrap_address)
                .with_security(security_protocol)
                .with_sasl(sasl_mechanism, sasl_username, sasl_password)
                .with_tls(tls_ca, tls_cert, tls_key);
            let name = profile.name.trim().to_string();
            profiles.add(profile)?;
            profiles.save()?;
            println!("Profile '{name}' added");
        }
        ProfileAction::Remove { name } => {
            if profiles.remove(&name).is_none() {
                return Err(ClientError::UnknownProfile(name));
            }
            profiles.save()?;
            println!("Profile '{name}' removed");
        }
    }
    Ok(())
}

fn manage_logging(preferences: &mut PreferencesStore, enabled: Option<bool>) -> Result<()> {
    if let Some(enabled) = enabled {
        preferences.set_logging_enabled(enabled)?;
    }
    let current = preferences.get();
    println!("theme: {:?}", current.theme);
    println!("font: {} {}", current.font_family, current.font_size);
    println!(
        "logging: {}",
        if current.logging_enabled { "on" } else { "off" }
    );
    Ok(())
}

fn print_event(event: &WorkerEvent) {
    match event {
        WorkerEvent::Record(view) => println!("{view}"),
        WorkerEvent::Error(failure) => eprintln!("Error: {failure}"),
        WorkerEvent::Finished => println!("-- finished --"),
    }
}

async fn print_until_finished(mut events: UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
        print_event(&event);
        if event == WorkerEvent::Finished {
            break;
        }
    }
}

const SHELL_HELP: &str = "\
commands:
  connect <profile>             disconnect
  list_profiles                 add_profile <address> <name>
  remove_profile <name>         list_topics
  publish <topic> <payload>     create_topic <name> [partitions] [replicas]
  delete_topic <name>           describe_cluster
  start_streaming <topic>       stop_streaming
  fetch_overview <topic>        help | quit
or a JSON object tagged by \"type\", e.g. {\"type\":\"list_topics\"}";

async fn shell(mut dispatcher: Dispatcher) -> Result<()> {
    println!("{SHELL_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                println!("{SHELL_HELP}");
                continue;
            }
            _ => {}
        }
        let command = match parse_line(trimmed) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match tokio::task::block_in_place(|| dispatcher.dispatch(command)) {
            Ok(Reply::Streaming { topic, events }) => {
                println!("Streaming '{topic}'");
                tokio::spawn(print_until_finished(events));
            }
            // the fetch finishes on its own; its handle is not needed here
            Ok(Reply::Overview { topic, events, .. }) => {
                println!("Overview of '{topic}'");
                tokio::spawn(print_until_finished(events));
            }
            Ok(reply) => println!("{reply}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    tokio::task::block_in_place(|| drop(dispatcher));
    Ok(())
}
