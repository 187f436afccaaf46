//! Command-line fee watcher.
//!
//! Connects to a node, subscribes to new blocks, and logs the current fee
//! suggestion as blocks arrive. Connection selection follows the layered
//! config (file + `FEEWATCH__*` env vars), with command-line flags taking
//! final precedence.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use feewatch_core::{
    config::AppConfig,
    engine::{EngineSnapshot, FeeEngine},
    types::WEI_PER_GWEI,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "feewatch")]
#[command(about = "Watch EIP-1559 fee suggestions for new blocks")]
struct Cli {
    /// Path to the TOML config file (default: config/config.toml, or
    /// the FEEWATCH_CONFIG env var).
    #[arg(long)]
    config: Option<String>,

    /// Named network to connect to (e.g., mainnet, sepolia).
    #[arg(long, conflicts_with = "chain_id")]
    network: Option<String>,

    /// Network selected by chain id.
    #[arg(long)]
    chain_id: Option<u64>,

    /// Explicit JSON-RPC endpoint URL (http(s):// or ws(s)://).
    #[arg(long)]
    url: Option<String>,

    /// Infura project id.
    #[arg(long, env = "FEEWATCH_INFURA_PROJECT_ID")]
    infura_project_id: Option<String>,

    /// Infura project secret.
    #[arg(long, env = "FEEWATCH_INFURA_PROJECT_SECRET")]
    infura_project_secret: Option<String>,

    /// Alchemy API key.
    #[arg(long, env = "FEEWATCH_ALCHEMY_API_KEY")]
    alchemy_api_key: Option<String>,

    /// Polling cadence in milliseconds for endpoints without a
    /// WebSocket feed.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

impl Cli {
    /// Folds command-line flags into the loaded configuration.
    fn apply_to(&self, config: &mut AppConfig) {
        let c = &mut config.connection;
        if self.network.is_some() {
            c.network.clone_from(&self.network);
            c.chain_id = None;
        }
        if self.chain_id.is_some() {
            c.chain_id = self.chain_id;
            c.network = None;
        }
        if self.url.is_some() {
            c.url.clone_from(&self.url);
        }
        if self.infura_project_id.is_some() {
            c.infura_project_id.clone_from(&self.infura_project_id);
        }
        if self.infura_project_secret.is_some() {
            c.infura_project_secret.clone_from(&self.infura_project_secret);
        }
        if self.alchemy_api_key.is_some() {
            c.alchemy_api_key.clone_from(&self.alchemy_api_key);
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            c.poll_interval_ms = poll_interval_ms;
        }
    }
}

/// Initializes the logging system based on the configuration.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,feewatch_core={0},feewatch={0}",
            config.logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer().pretty().with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI as f64
}

/// Logs a snapshot when it differs from the previously reported one.
fn report(snapshot: &EngineSnapshot, last_block: &mut Option<u64>, last_error: &mut Option<String>) {
    if let Some(error) = &snapshot.error {
        let message = error.to_string();
        if last_error.as_ref() != Some(&message) {
            warn!(error = %error, "engine fault");
            *last_error = Some(message);
        }
    } else {
        *last_error = None;
    }

    let Some(data) = &snapshot.data else { return };
    if *last_block == Some(data.latest_block.block_number) {
        return;
    }
    *last_block = Some(data.latest_block.block_number);

    info!(
        block_number = data.latest_block.block_number,
        gas_used_ratio = format!("{:.2}", data.latest_block.gas_used_ratio),
        base_fee_gwei = format!("{:.6}", as_gwei(data.suggestion.base_fee_per_gas)),
        max_priority_fee_gwei = format!("{:.6}", as_gwei(data.suggestion.max_priority_fee_per_gas)),
        max_fee_gwei = format!("{:.6}", as_gwei(data.suggestion.max_fee_per_gas)),
        history_len = data.history.len(),
        "fee suggestion"
    );
}

/// How long to wait for the connect outcome to land in the snapshot.
/// Sized past the connection's own request timeout, so a slow or hung
/// node still reports its fault here instead of tripping this deadline.
const CONNECT_WAIT: Duration = Duration::from_secs(60);

const CONNECT_POLL: Duration = Duration::from_millis(100);

/// Waits until the connect outcome is visible in the snapshot.
async fn await_connection(engine: &FeeEngine) -> EngineSnapshot {
    let deadline = tokio::time::Instant::now() + CONNECT_WAIT;
    while tokio::time::Instant::now() < deadline {
        let snapshot = engine.snapshot();
        if snapshot.network.is_some() || snapshot.error.is_some() {
            return snapshot;
        }
        tokio::time::sleep(CONNECT_POLL).await;
    }
    engine.snapshot()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    cli.apply_to(&mut config);
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;

    init_logging(&config);

    let engine = FeeEngine::new(config.poll_interval());
    engine.connect(&config.connection_spec()).await;

    let snapshot = await_connection(&engine).await;
    match (&snapshot.network, &snapshot.error) {
        (Some(network), _) => info!(network = %network, "connected"),
        (None, Some(error)) => return Err(anyhow!("connection failed: {error}")),
        (None, None) => return Err(anyhow!("connection failed")),
    }

    engine.subscribe();
    info!("watching for new blocks (ctrl-c to exit)");

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_block = None;
    let mut last_error = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => report(&engine.snapshot(), &mut last_block, &mut last_error),
        }
    }

    info!("shutting down");
    engine.reset();
    engine.shutdown();
    Ok(())
}
