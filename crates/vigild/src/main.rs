//! vigild — the Vigil demo daemon.
//!
//! Single binary that assembles the whole detection pipeline against the
//! in-memory broker and store:
//! - Stream transport (in-memory broker)
//! - Sample store
//! - Detection engine (discovery, baseline scans, scoring)
//! - Synthetic traffic generator
//!
//! # Usage
//!
//! ```text
//! vigild demo --duration 120
//! vigild check --config vigil.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use vigil_core::EngineEvent;
use vigil_dsl::CompiledDsl;
use vigil_engine::{Engine, EngineConfig, Hooks};
use vigil_store::MemoryStore;
use vigil_stream::MemoryBroker;

mod generator;

/// Configuration used when `demo` runs without `--config`. Two static
/// fields on the generator's steady topic plus discovery for everything
/// else; anomalies are produced back onto the stream.
const DEMO_CONFIG: &str = r#"
cooldown_ms = 30000

[analysis.sensor-readings.fields."sub.one"]
windows = ["1m", "15m"]

[analysis.sensor-readings.fields."two"]
windows = ["1m"]

[discovery]
scan_interval_ms = 5000
field_reset_ms = 10000
default_windows = ["1m"]

[scan]
interval_ms = 5000

[target]
topic = "vigil-anomalies"
partitions = 1
"#;

#[derive(Parser)]
#[command(name = "vigild", about = "Vigil anomaly detection daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline against synthetic in-memory traffic.
    Demo {
        /// Engine configuration file. Omit for the built-in demo config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many seconds. Omit to run until Ctrl-C.
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Parse a configuration file, compile its analysis table and print it.
    Check {
        /// Engine configuration file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vigild=debug,vigil_engine=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo { config, duration } => run_demo(config, duration).await,
        Command::Check { config } => run_check(&config),
    }
}

fn demo_config() -> anyhow::Result<EngineConfig> {
    Ok(toml::from_str(DEMO_CONFIG)?)
}

async fn run_demo(config_path: Option<PathBuf>, duration: Option<u64>) -> anyhow::Result<()> {
    info!("Vigil daemon starting in demo mode");

    let config = match &config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => demo_config()?,
    };
    config.validate()?;
    info!(
        topics = config.analysis.topics.len(),
        discovery = config.discovery.enabled,
        "configuration loaded"
    );

    // ── Initialize collaborators ───────────────────────────────

    let broker = Arc::new(MemoryBroker::new());
    let store = Arc::new(MemoryStore::new());
    info!("in-memory broker and store initialized");

    let engine = Engine::new(config, Hooks::passthrough(), broker.clone(), store)?;

    // Subscribe before start so startup discovery events are not missed.
    let mut events = engine.events();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            log_event(&event);
        }
    });

    let handle = engine.start().await?;
    info!("engine started");

    // ── Synthetic traffic ──────────────────────────────────────

    let (generator_tx, generator_rx) = watch::channel(false);
    let generator = tokio::spawn(generator::run(broker, generator_rx));
    info!("traffic generator started");

    // ── Run until the deadline or Ctrl-C ───────────────────────

    match duration {
        Some(secs) => {
            info!(secs, "running for a fixed duration");
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
        }
    }

    // ── Shutdown ───────────────────────────────────────────────

    let _ = generator_tx.send(true);
    let _ = generator.await;

    let status = handle.status().await?;
    info!(
        messages = status.counters.messages,
        anomalies = status.counters.anomalies,
        scans = status.counters.scan_runs,
        errors = status.counters.errors,
        stored = status.stored_events,
        baselines = status.baselines.len(),
        "final status"
    );

    handle.shutdown().await;
    event_log.abort();

    info!("Vigil daemon stopped");
    Ok(())
}

fn run_check(path: &Path) -> anyhow::Result<()> {
    let config = EngineConfig::from_file(path)?;
    config.validate()?;

    let dsl = CompiledDsl::compile(&config.analysis);
    println!("{}", serde_json::to_string_pretty(&dsl)?);
    info!(
        topics = dsl.subscribe_topics().len(),
        triples = dsl.triple_count(),
        "configuration is valid"
    );
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Anomaly(a) => info!(
            topic = %a.topic,
            path = %a.field_path,
            window = %a.window_label,
            value = a.value,
            median = a.median,
            score = a.score,
            "ANOMALY"
        ),
        EngineEvent::TopicsCreated(topics) => info!(?topics, "topics created"),
        EngineEvent::TopicsDeleted(topics) => info!(?topics, "topics deleted"),
        EngineEvent::TopicsDiscovered(topics) => info!(count = topics.len(), "topic set refreshed"),
        EngineEvent::FieldsDiscovered { topic, paths } => {
            info!(topic = %topic, ?paths, "fields discovered")
        }
        EngineEvent::Error(err) => warn!(%err, "engine error"),
        // Per-message events are too chatty for the demo log.
        EngineEvent::Message(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_demo_config_is_valid() {
        let config = demo_config().unwrap();
        config.validate().unwrap();

        assert!(config.analysis.topics.contains_key("sensor-readings"));
        assert!(config.discovery.enabled);
        assert_eq!(config.target.as_ref().unwrap().topic, "vigil-anomalies");

        let dsl = CompiledDsl::compile(&config.analysis);
        assert_eq!(dsl.triple_count(), 3);
    }
}
