use crate::analyser::{AnalyserSettings, BlockAnalyser, OutputFormat};
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::rpc::{BitcoinRpcClient, RetryPolicy};
use crate::utils::currency::format_sats_as_btc;
use clap::Args;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Args)]
pub struct AnalyseCommand {
    /// Hash of the block to analyse
    #[arg(long)]
    pub block_hash: String,

    /// Configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers (overrides config.toml)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Network used to derive addresses: bitcoin, testnet, signet, regtest
    #[arg(long)]
    pub network: Option<String>,

    /// Bitcoin RPC URL (overrides config.toml)
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Bitcoin RPC username (overrides config.toml)
    #[arg(long)]
    pub rpc_username: Option<String>,

    /// Bitcoin RPC password (overrides config.toml)
    #[arg(long)]
    pub rpc_password: Option<String>,

    /// Maximum RPC attempts per call (overrides config.toml)
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// Stop at the first transaction that cannot be analysed
    #[arg(long)]
    pub fail_fast: bool,

    /// Cancel the run after this many seconds (0 disables)
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Output format: console or json
    #[arg(long, default_value = "console")]
    pub format: String,
}

impl AnalyseCommand {
    pub async fn run(&self) -> AppResult<()> {
        info!("=== Block Fee Analyser ===");

        let config = self.resolve_config()?;
        let format: OutputFormat = self.format.parse()?;
        let settings = AnalyserSettings::from_config(&config.analysis, format)?;
        let policy = RetryPolicy::from(&config.bitcoin_rpc);

        info!("Connecting to Bitcoin RPC at {}", config.bitcoin_rpc.url);
        let client = BitcoinRpcClient::connect(&config.bitcoin_rpc)?;
        let analyser = BlockAnalyser::new(Arc::new(client), policy, settings);

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping workers");
                interrupt.cancel();
            }
        });

        let stdout = io::stdout();
        let out = BufWriter::new(stdout.lock());
        let summary = analyser
            .run_with_cancel(&self.block_hash, out, cancel)
            .await?;

        info!(
            "Block {}: {} transactions, {} analysed, {} failed",
            summary.block_hash, summary.transactions, summary.succeeded, summary.failed
        );
        info!("Total fees: {}", format_sats_as_btc(summary.total_fees_sats));
        info!(
            "Prior-transaction cache: {} entries, {} fetches, {:.1}% hit rate",
            summary.cache.entries,
            summary.cache.fetches,
            summary.cache.hit_rate()
        );

        if summary.failed > 0 {
            return Err(AppError::PartialFailure {
                failed: summary.failed,
                total: summary.transactions,
            });
        }
        Ok(())
    }

    /// Config file and environment first, then CLI arguments on top
    fn resolve_config(&self) -> AppResult<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from(path)?,
            None => AppConfig::get_defaults()?,
        };

        if let Some(url) = &self.rpc_url {
            config.bitcoin_rpc.url = url.clone();
        }
        if let Some(username) = &self.rpc_username {
            config.bitcoin_rpc.username = username.clone();
        }
        if let Some(password) = &self.rpc_password {
            config.bitcoin_rpc.password = password.clone();
        }
        if let Some(max_retries) = self.max_retries {
            config.bitcoin_rpc.max_retries = max_retries;
        }
        if let Some(workers) = self.workers {
            config.analysis.workers = workers;
        }
        if let Some(network) = &self.network {
            config.analysis.network = network.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            config.analysis.run_timeout_seconds = timeout;
        }
        if self.fail_fast {
            config.analysis.fail_fast = true;
        }

        config.validate()?;
        Ok(config)
    }
}
