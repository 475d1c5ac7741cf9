//! # beacon
//!
//! Command line front end for the notification hub.
//!
//! - `beacon watch <ACCOUNT>` opens one or more contexts on the account and
//!   prints every notification as a JSON line on stdout. Logs and alerts go
//!   to stderr.
//! - `beacon backoff` prints the reconnect delay schedule for the current
//!   settings.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use beacon_client::{Alert, NotificationHub, StopReason};
use beacon_core::{AccountId, ReconnectPolicy};
use beacon_settings::BeaconSettings;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Real-time account notification client.
#[derive(Parser, Debug)]
#[command(name = "beacon", version, about = "Real-time account notification client")]
struct Cli {
    /// Settings file (defaults to `~/.beacon/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream an account's notifications as JSON lines.
    Watch {
        /// Account id to observe.
        account: String,

        /// Server base URL (overrides settings).
        #[arg(long)]
        base_url: Option<String>,

        /// Number of contexts sharing the stream.
        #[arg(long, default_value_t = 1)]
        contexts: usize,
    },
    /// Print the reconnect delay schedule.
    Backoff {
        /// Number of attempts to print.
        #[arg(long, default_value_t = 8)]
        attempts: u32,
    },
}

fn load(path: Option<&PathBuf>) -> Result<BeaconSettings> {
    let settings = match path {
        Some(path) => beacon_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => beacon_settings::load_settings().context("failed to load settings")?,
    };
    Ok(settings)
}

fn init_logging(settings: &BeaconSettings) {
    if settings.logging.json {
        beacon_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        beacon_core::logging::init_subscriber(&settings.logging.level);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load(cli.settings.as_ref())?;
    init_logging(&settings);

    match cli.command {
        Command::Watch {
            account,
            base_url,
            contexts,
        } => {
            if let Some(base_url) = base_url {
                settings.stream.base_url = base_url;
            }
            watch(settings, AccountId::from(account), contexts.max(1)).await
        }
        Command::Backoff { attempts } => {
            print_backoff(settings.reconnect, attempts);
            Ok(())
        }
    }
}

async fn watch(settings: BeaconSettings, account: AccountId, contexts: usize) -> Result<()> {
    if !account.is_authenticated() {
        anyhow::bail!("account id {account:?} is not an authenticated account");
    }

    let hub = NotificationHub::new(settings).context("failed to build notification hub")?;
    let mut alerts = hub.alerts();

    let tabs: Vec<_> = (0..contexts).map(|_| hub.open_context()).collect();
    let mut subscriptions = Vec::with_capacity(contexts);
    for (index, tab) in tabs.iter().enumerate() {
        let context = tab.id().clone();
        let subscription = tab.subscribe(account.clone(), move |notification| {
            let line = json!({
                "context": index,
                "contextId": context,
                "notification": notification,
                "severity": notification.kind.severity(),
            });
            println!("{line}");
        });
        info!(index, role = ?subscription.role(), "context subscribed");
        subscriptions.push(subscription);
    }

    let alert_task = tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => report_alert(&alert),
                Err(RecvError::Lagged(n)) => warn!(lagged = n, "alert receiver lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let leader = subscriptions
        .first_mut()
        .context("at least one context is required")?;
    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            StopReason::Cancelled
        }
        reason = leader.stopped() => reason.unwrap_or(StopReason::Cancelled),
    };

    hub.shutdown();
    alert_task.abort();
    for subscription in subscriptions {
        subscription.close().await;
    }

    match reason {
        StopReason::Cancelled => Ok(()),
        StopReason::Unauthorized => {
            anyhow::bail!("this session is not authorized to read account {account}")
        }
        StopReason::Disabled => {
            anyhow::bail!("too many failed connection attempts; restart to try again")
        }
    }
}

fn report_alert(alert: &Alert) {
    if alert.is_terminal() {
        error!(alert = ?alert, "{}", alert.message());
    } else {
        warn!(alert = ?alert, "{}", alert.message());
    }
}

fn print_backoff(policy: ReconnectPolicy, attempts: u32) {
    println!("attempt  delay_ms");
    for attempt in 0..attempts {
        let delay = policy.delay_for(attempt);
        println!("{attempt:>7}  {:>8}", delay.as_millis());
    }
}
