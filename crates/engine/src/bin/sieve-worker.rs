//! sieve-worker — rule matching and dispatch over a JSONL event feed.
//!
//! Reads one JSON event per line from stdin, runs each through the
//! engine pipeline, and delivers notifications through the configured
//! webhook. Rules hot-reload from the rules directory while running.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};

use sieve_core::{load_dotenv, EngineConfig, Event};
use sieve_engine::cleanup::spawn_cleanup;
use sieve_engine::{Engine, RuleLoader};
use sieve_notify::WebhookSink;

// ── CLI ─────────────────────────────────────────────────────────────

/// Rule matching and notification dispatch worker.
#[derive(Parser, Debug)]
#[command(name = "sieve-worker", version, about)]
struct Cli {
    /// Path to the rules directory to load and watch.
    #[arg(long, env = "RULES_DIR", default_value = "data/rules")]
    rules_dir: PathBuf,

    /// Base URL of the notification webhook.
    #[arg(long, env = "SIEVE_WEBHOOK_URL")]
    webhook_url: String,
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
    let config = EngineConfig::from_env();
    config.log_summary();

    let mut loader = RuleLoader::new(cli.rules_dir.clone());
    let results = loader.load_all()?;
    info!(
        path = %cli.rules_dir.display(),
        files = results.len(),
        "initial rule scan complete"
    );
    loader.watch()?;

    let sink = Arc::new(WebhookSink::new(cli.webhook_url));
    let engine = Arc::new(Engine::new(
        config.clone(),
        Arc::new(loader),
        sink.clone(),
        sink,
    ));

    let shutdown = Arc::new(Notify::new());
    let cleanup = spawn_cleanup(
        engine.gate_store(),
        config.cleanup_interval(),
        shutdown.clone(),
    );

    info!("sieve-worker started, reading events from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        let event: Event = match serde_json::from_str(&line) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(error = %e, "skipping malformed event line");
                                continue;
                            }
                        };
                        if let Some(report) = engine.process(&event).await {
                            info!(
                                event_id = %event.id,
                                forwarded = report.forwarded,
                                deleted = report.deleted,
                                fallback_sent = report.fallback_sent,
                                failures = report.failures.len(),
                                "event dispatched"
                            );
                        }
                    }
                    None => {
                        info!("event feed closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    shutdown.notify_waiters();
    cleanup.await?;
    info!("sieve-worker exited cleanly");
    Ok(())
}
