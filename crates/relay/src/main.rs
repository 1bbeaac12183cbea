//! Relay CLI - deliver incident and preview deployment events from JSON files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use notify::Event;
use relay::{
    DeploymentFinalizer, ExternalStatusReconciler, FileStore, FinalizeContext, FinalizeSettings,
    IncidentRelay, RelayConfig, RelayError,
};
use scm::GitHubStatusClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Relay CLI - surface platform events to chat, email and GitHub.
#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Deliver incident and preview deployment events")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON store holding cluster, tenant, policies and deployments
    #[arg(long, env = "RELAY_STORE", default_value = "relay-state.json", global = true)]
    store: PathBuf,

    /// Abort remaining steps after this many seconds
    #[arg(long, env = "RELAY_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fan an `incident_detected` event out to the tenant's channels
    Incident {
        /// Path to the event JSON
        #[arg(long)]
        event: PathBuf,
    },

    /// Apply a `deployment_finalized` event to GitHub and the deployment record
    Finalize {
        /// Path to the event JSON
        #[arg(long)]
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("relay=debug,notify=debug,scm=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if cli.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let config = RelayConfig::from_env();
    let store = Arc::new(
        FileStore::open(&cli.store)
            .await
            .with_context(|| format!("Failed to open store {}", cli.store.display()))?,
    );
    let cancel = cancellation(cli.timeout_secs);

    let result = match cli.command {
        Commands::Incident { event } => run_incident(&config, store, &event, &cancel).await,
        Commands::Finalize { event } => run_finalize(&config, store, &event, &cancel).await,
    };

    if let Err(e) = &result {
        if let Some(relay_err) = e.downcast_ref::<RelayError>() {
            tracing::error!(kind = ?relay_err.kind(), error = %relay_err, "Relay failed");
            eprintln!("error: {}", relay_err.public_message());
        }
    }

    result
}

/// Token cancelled on Ctrl-C or when the deadline passes.
fn cancellation(timeout_secs: Option<u64>) -> CancellationToken {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(timeout_secs = secs, "Deadline exceeded, cancelling");
            on_deadline.cancel();
        });
    }

    cancel
}

async fn read_event(path: &Path) -> Result<Event> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read event {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid event JSON in {}", path.display()))
}

async fn run_incident(
    config: &RelayConfig,
    store: Arc<FileStore>,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let event = read_event(path).await?;
    let cluster = store.cluster().await?;
    let tenant = store.tenant().await;

    let relay = IncidentRelay::new(store, config.notify.clone());
    let report = relay
        .notify_incident(&cluster, &tenant, &event, cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    Ok(())
}

async fn run_finalize(
    config: &RelayConfig,
    store: Arc<FileStore>,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let event = read_event(path).await?;
    let Event::DeploymentFinalized { environment_id, .. } = &event else {
        bail!("{} does not contain a deployment_finalized event", path.display());
    };

    let Some(token) = config.github_token.as_deref() else {
        bail!("GITHUB_TOKEN must be set to finalize deployments");
    };
    let client = GitHubStatusClient::with_api_url(token, &config.github_api_url)?;

    let ctx = FinalizeContext {
        cluster: store.cluster().await?,
        environment: store.environment(*environment_id).await?,
    };

    let finalizer = DeploymentFinalizer::new(
        store,
        ExternalStatusReconciler::new(Arc::new(client)),
        FinalizeSettings::from(config),
    );
    let record = finalizer.finalize(&ctx, &event, cancel).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn report_json(report: &notify::DispatchReport) -> serde_json::Value {
    match report {
        notify::DispatchReport::Suppressed => serde_json::json!({ "suppressed": true }),
        notify::DispatchReport::Delivered { delivered, skipped } => serde_json::json!({
            "suppressed": false,
            "delivered": delivered,
            "skipped": skipped,
        }),
    }
}
