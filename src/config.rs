use config::{Config, ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use bitcoin::Network;

use crate::errors::{AppError, AppResult};

/// Prefix of environment variables overriding configuration
pub const ENV_PREFIX: &str = "BLOCK_ANALYSER";

/// Application configuration loaded from config.toml or environment variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub bitcoin_rpc: BitcoinRpcConfig,
    pub analysis: AnalysisConfig,
}

/// Bitcoin RPC configuration for block and prior-transaction fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinRpcConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
}

/// Worker pool and reporting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of parallel workers
    pub workers: usize,
    /// Network used to encode addresses ("bitcoin", "testnet", "signet", "regtest")
    pub network: String,
    /// Abort the whole run on the first failed transaction
    pub fail_fast: bool,
    /// Deadline for the whole run, 0 disables it
    pub run_timeout_seconds: u64,
}

impl Default for BitcoinRpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8332".to_string(),
            username: "bitcoin".to_string(),
            password: "password".to_string(),
            timeout_seconds: 60,
            max_retries: 5,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 30,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            network: "bitcoin".to_string(),
            fail_fast: false,
            run_timeout_seconds: 0,
        }
    }
}

impl AnalysisConfig {
    /// Parse the configured network name
    pub fn network(&self) -> AppResult<Network> {
        Network::from_str(&self.network)
            .map_err(|_| AppError::Config(format!("Unknown network: {}", self.network)))
    }
}

impl AppConfig {
    /// Load configuration from config.toml file and environment variables
    /// Environment variables take precedence over file configuration
    pub fn load() -> AppResult<Self> {
        let config = Self::builder_with_defaults()?
            // Load from config.toml if it exists
            .add_source(File::with_name("config").required(false))
            .add_source(Self::environment())
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Load configuration from a specific file on top of the defaults,
    /// environment variables still taking precedence
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(Self::environment())
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// BLOCK_ANALYSER_<SECTION>__<KEY> variables,
    /// e.g. BLOCK_ANALYSER_BITCOIN_RPC__URL or BLOCK_ANALYSER_ANALYSIS__WORKERS
    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        let rpc = BitcoinRpcConfig::default();
        let analysis = AnalysisConfig::default();
        Config::builder()
            // Bitcoin RPC defaults
            .set_default("bitcoin_rpc.url", rpc.url)?
            .set_default("bitcoin_rpc.username", rpc.username)?
            .set_default("bitcoin_rpc.password", rpc.password)?
            .set_default("bitcoin_rpc.timeout_seconds", rpc.timeout_seconds)?
            .set_default("bitcoin_rpc.max_retries", rpc.max_retries as i64)?
            .set_default("bitcoin_rpc.initial_backoff_ms", rpc.initial_backoff_ms)?
            .set_default("bitcoin_rpc.backoff_multiplier", rpc.backoff_multiplier)?
            .set_default("bitcoin_rpc.max_backoff_seconds", rpc.max_backoff_seconds)?
            // Analysis defaults
            .set_default("analysis.workers", analysis.workers as i64)?
            .set_default("analysis.network", analysis.network)?
            .set_default("analysis.fail_fast", analysis.fail_fast)?
            .set_default("analysis.run_timeout_seconds", analysis.run_timeout_seconds)
    }

    /// Reject settings the analyser cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.analysis.workers == 0 {
            return Err(AppError::Config(
                "analysis.workers must be at least 1".to_string(),
            ));
        }
        if self.bitcoin_rpc.max_retries == 0 {
            return Err(AppError::Config(
                "bitcoin_rpc.max_retries must be at least 1".to_string(),
            ));
        }
        if self.bitcoin_rpc.timeout_seconds == 0 {
            return Err(AppError::Config(
                "bitcoin_rpc.timeout_seconds must be at least 1".to_string(),
            ));
        }
        self.analysis.network()?;
        Ok(())
    }

    /// Get default config values for CLI argument defaults
    ///
    /// Built-in defaults apply when neither config.toml nor any environment
    /// variable is present. A value that is present but unusable is an error.
    pub fn get_defaults() -> AppResult<Self> {
        if !Path::new("config.toml").exists() {
            tracing::debug!("No config.toml found, using built-in defaults and environment");
        }
        Self::load()
    }
}
