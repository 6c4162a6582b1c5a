//! `Mailrouter` - SMTP relay that routes mail by filter rules
//!
//! Listens for local submissions and forwards each message to the outbound
//! server chosen by the first matching filter.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod inbound;
mod pidfile;

use anyhow::Context;
use clap::Parser;
use inbound::{DEFAULT_MAX_MESSAGE_SIZE, DRAIN_MARGIN, ListenerSettings};
use mailrouter_core::{ConfigStore, Dispatcher, MailRouter, OutcomeKind, SmtpTransport};
use pidfile::PidFile;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line options.
#[derive(Debug, Parser)]
#[command(name = "mailrouter", version, about)]
struct Cli {
    /// Address & port for SMTP server
    #[arg(long, default_value = ":2525")]
    smtp: String,

    /// Path to the JSON configuration file
    #[arg(long, default_value = "/etc/mailrouter.conf")]
    conf: PathBuf,

    /// Name used in the SMTP greeting and in outbound EHLO
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Seconds allowed for one outbound submission
    #[arg(long, default_value_t = 60)]
    delivery_timeout: u64,

    /// Largest accepted message in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "mailrouter=debug,mailrouter_core=debug,mailrouter_smtp=debug"
    } else {
        "mailrouter=info,mailrouter_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mailrouter");

    let config = ConfigStore::default();
    match config.load_file(&cli.conf) {
        Ok((routes, filters)) => info!("Loaded {routes} routes and {filters} filters."),
        Err(err) => {
            warn!("Could not load configuration file: {err}");
            warn!("No routes or filters are defined. All incoming mail will be dropped.");
        }
    }

    let pid_file = config
        .pid_file()
        .and_then(|path| match PidFile::create(&path) {
            Ok(pid) => Some(pid),
            Err(err) => {
                warn!("Could not create PID file: {err}");
                None
            }
        });

    let transport = SmtpTransport::new(cli.hostname.clone());
    let dispatcher = Dispatcher::new(transport, Duration::from_secs(cli.delivery_timeout));
    let router = Arc::new(MailRouter::new(config, dispatcher));

    let result = run(&cli, Arc::clone(&router)).await;

    let totals = router.stats();
    for kind in [
        OutcomeKind::Sent,
        OutcomeKind::Dropped,
        OutcomeKind::Failed,
        OutcomeKind::Rejected,
    ] {
        let counter = totals.get(kind);
        info!(outcome = %kind, messages = counter.messages, bytes = counter.bytes, "Message totals");
    }

    if let Some(pid) = pid_file {
        let path = pid.path().display().to_string();
        if let Err(err) = pid.remove() {
            error!(%path, "Could not remove PID file: {err}");
        }
    }

    result
}

async fn run(cli: &Cli, router: Arc<MailRouter<SmtpTransport>>) -> anyhow::Result<()> {
    let addr = listen_addr(&cli.smtp);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind SMTP listener on {addr}"))?;
    info!("Mailrouter serving SMTP on {addr}");

    let settings = Arc::new(ListenerSettings {
        max_message_size: cli.max_message_size,
        drain_timeout: Duration::from_secs(cli.delivery_timeout) + DRAIN_MARGIN,
        ..ListenerSettings::new(cli.hostname.clone())
    });

    inbound::serve(listener, router, settings, shutdown_signal()).await
}

/// Expands the `:port` shorthand to all IPv4 interfaces.
fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
