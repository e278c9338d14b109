//! ECG digitization and interpretation server.
//!
//! Runs as a service that digitizes printed/scanned ECG images and runs the
//! clinical interpretation engine over the result, either in one-shot batch
//! mode over an inbox directory or as a long-running TCP JSON-RPC service.

mod config;
mod digitizer_service;
mod server;
mod tiered;
mod vlm;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{Config, TierThresholds, VlmConfig};

#[derive(Parser)]
#[command(name = "ecg-server")]
#[command(about = "Digitize printed ECGs and run age-aware clinical interpretation")]
struct Cli {
    /// Directory scanned for images awaiting digitization.
    #[arg(short, long, default_value = "/var/lib/ecg-digitizer/inbox")]
    inbox_dir: PathBuf,

    /// Cache directory for VLM response bodies.
    #[arg(short, long, default_value = "/var/lib/ecg-digitizer/cache")]
    cache_dir: PathBuf,

    /// TCP bind address for the CLI-facing service.
    #[arg(long, default_value = "127.0.0.1:8420")]
    bind_addr: String,

    /// Run the inbox scan once and exit instead of starting the service.
    #[arg(long)]
    batch_only: bool,

    /// Maximum concurrent digitization jobs.
    #[arg(long, default_value = "2")]
    max_concurrent: usize,

    /// VLM provider endpoint. Omit to run local-CV only.
    #[arg(long)]
    vlm_endpoint: Option<String>,

    /// VLM provider API key, read from the environment if unset.
    #[arg(long, env = "ECG_VLM_API_KEY")]
    vlm_api_key: Option<String>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).compact().finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("ecg-server starting");
    info!(inbox = ?cli.inbox_dir, cache = ?cli.cache_dir, "configuration loaded");

    let vlm = cli.vlm_endpoint.map(|endpoint| VlmConfig {
        endpoint,
        api_key: cli.vlm_api_key.unwrap_or_default(),
        model_tag: "default".to_string(),
        prompt_revision: "v1".to_string(),
        timeout_ms: 15_000,
    });

    let config = Config {
        inbox_dir: cli.inbox_dir,
        cache_dir: cli.cache_dir,
        bind_addr: cli.bind_addr,
        max_concurrent: cli.max_concurrent,
        vlm,
        tiers: TierThresholds::default(),
    };

    let cache = ecg_core::cache::ResponseCache::new(&config.cache_dir)?;
    info!(stats = ?cache.stats()?, "cache initialized");

    let providers: Vec<Box<dyn vlm::VlmProvider>> = match &config.vlm {
        Some(vlm_config) => vec![Box::new(vlm::HttpVlmProvider::new("tier1-primary", vlm_config.clone())?)],
        None => Vec::new(),
    };

    if cli.batch_only {
        let paths = digitizer_service::scan_inbox(&config);
        info!(count = paths.len(), "inbox scan complete");
    } else {
        server::run(config, cache, providers).await?;
    }

    Ok(())
}
