//! routine-worker: runs every pipe on a fixed schedule until Ctrl-C.
//!
//! Pipes are seeded into the in-memory store from a JSON file of
//! `[{"urn": "...", "json": {...}}]`. With `TELEGRAM_TOKEN` set, pipes with
//! a `notify` chat get their events mirrored to Telegram, and the bot
//! answers anyone who messages it with their chat id.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use wring_agents::{AgentRegistry, Cycle, LogTracker, Routine};
use wring_core::config::load_dotenv;
use wring_core::memory::MemoryBase;
use wring_core::Config;
use wring_notify::{ChatIdResponder, Notifier, NullNotifier, TelegramNotifier};

// ── CLI ─────────────────────────────────────────────────────────────

/// Periodic pipe runner.
#[derive(Parser, Debug)]
#[command(name = "routine-worker", version, about)]
struct Cli {
    /// JSON file with the pipes to run.
    #[arg(long, env = "WRING_PIPES", default_value = "pipes.json")]
    pipes: PathBuf,

    /// Run one pass immediately, then exit.
    #[arg(long, default_value_t = false)]
    once: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let base = MemoryBase::new();
    base.load_pipes(&cli.pipes)
        .await
        .with_context(|| format!("loading pipes from {}", cli.pipes.display()))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let notifier: Arc<dyn Notifier> = match &config.telegram.token {
        Some(token) => {
            let telegram = TelegramNotifier::from_config(token.clone())
                .context("configuring Telegram")?;
            let responder = ChatIdResponder::new(telegram.clone());
            tokio::spawn(async move { responder.run(stop_rx).await });
            Arc::new(telegram)
        }
        None => {
            warn!("TELEGRAM_TOKEN is not set, notify filters will only log");
            Arc::new(NullNotifier)
        }
    };

    let cycle = Arc::new(Cycle::new(
        Arc::new(base),
        Arc::new(AgentRegistry::standard(config.github.clone())),
        notifier,
        Arc::new(LogTracker),
    ));
    let routine = Arc::new(Routine::new(cycle, &config.routine));

    if cli.once {
        let report = routine.call().await?;
        info!(
            submitted = report.submitted,
            completed = report.completed,
            "single run finished"
        );
        return Ok(());
    }

    routine.start();
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutdown signal received");
    stop_tx.send_replace(true);
    routine.stop().await.context("routine did not stop cleanly")?;
    info!("routine-worker stopped");
    Ok(())
}
