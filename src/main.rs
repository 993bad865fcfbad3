use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;

use crate::session::{ConnectionStatus, Snapshot, TrackingSession};
use crate::tracker::Tracker;
use crate::transport::Transport;

mod api;
mod backoff;
mod cache;
mod config;
mod error;
mod messages;
mod mqtt;
mod selection;
mod session;
mod subscription;
mod tracker;
mod transport;

#[derive(Parser, Debug)]
#[command(version, about = "Follow live tracker positions from the console")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Tracker to follow instead of the first one listed
    #[arg(short, long)]
    tracker: Option<String>,

    /// Log filter, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Select(String),
    /// List trackers, optionally filtered by name.
    List(Option<String>),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["list" | "ls"] => Some(Command::List(None)),
        ["list" | "ls", term @ ..] => Some(Command::List(Some(term.join(" ")))),
        ["quit" | "exit"] => Some(Command::Quit),
        ["select", id] | [id] => Some(Command::Select(id.to_string())),
        _ => None,
    }
}

fn init_logging(default_filter: &str) {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filters)
        .init();
}

fn status_line(snapshot: &Snapshot, now: DateTime<Utc>) -> String {
    let status = match snapshot.status {
        ConnectionStatus::Connecting => "connecting".to_string(),
        ConnectionStatus::Connected => "live".to_string(),
        ConnectionStatus::Reconnecting { attempt, .. } => format!("reconnecting #{attempt}"),
        ConnectionStatus::Disconnected => "offline".to_string(),
    };
    match (&snapshot.error, &snapshot.selected) {
        (Some(err), _) => format!("[{status}] error: {err}"),
        (None, Some(tracker)) => {
            let seen = tracker.last_seen(now);
            match snapshot.subscription {
                Some(state) => format!("[{status}] {tracker} (updated {seen}, {state:?})"),
                None => format!("[{status}] {tracker} (updated {seen})"),
            }
        }
        (None, None) if snapshot.loading => format!("[{status}] loading trackers..."),
        (None, None) => format!("[{status}] no trackers available"),
    }
}

fn render(snapshot: &Snapshot) {
    println!("{}", status_line(snapshot, Utc::now()));
}

fn list_lines(
    trackers: &[Tracker],
    selected: Option<&str>,
    term: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<String> {
    trackers
        .iter()
        .filter(|tracker| term.is_none_or(|term| tracker.matches(term)))
        .map(|tracker| {
            let marker = if selected == Some(tracker.id.as_str()) {
                '*'
            } else {
                ' '
            };
            format!(
                "{marker} {tracker} [{:?}, battery {}% {:?}, updated {}]",
                tracker.status,
                tracker.battery_level,
                tracker.battery_band(),
                tracker.last_seen(now)
            )
        })
        .collect()
}

fn list<T: Transport>(session: &TrackingSession<T>, term: Option<&str>) {
    let lines = list_lines(session.trackers(), session.selected(), term, Utc::now());
    if lines.is_empty() {
        println!("No trackers found.");
    }
    for line in lines {
        println!("{line}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = config::AppConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let transport = mqtt::MqttTransport::new(&config.mqtt, &config.reconnect());
    let api = api::TrackerApi::new(&config.api);

    let (tx, mut rx) = mpsc::channel(64);
    let mut session = TrackingSession::activate(transport, config.unsubscribe_policy(), tx);
    if let Some(id) = &cli.tracker {
        session.select(id)?;
    }

    let fetch = api.fetch_trackers();
    tokio::pin!(fetch);
    let mut fetched = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            result = &mut fetch, if !fetched => {
                fetched = true;
                session.load(result);
                render(&session.snapshot());
            }
            Some(event) = rx.recv() => {
                session.handle(event);
                render(&session.snapshot());
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(Command::Select(id)) => match session.select(&id) {
                        Ok(()) => render(&session.snapshot()),
                        Err(err) => warn!("{err}"),
                    },
                    Some(Command::List(term)) => list(&session, term.as_deref()),
                    Some(Command::Quit) => break,
                    None => warn!("Unrecognized command: {}", line.trim()),
                },
                Ok(None) => break,
                Err(err) => {
                    error!("Error reading stdin: {err}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.deactivate();
    Ok(())
}
