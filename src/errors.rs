use thiserror::Error;

use crate::decoder::DecodeError;

/// Application-wide error type - single point of truth
#[derive(Error, Debug)]
pub enum AppError {
    /// Bitcoin RPC operations
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Per-transaction analysis failures surfaced as fatal (fail-fast mode)
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// File I/O operations (report output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration issues
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was torn down before every report was emitted
    #[error("Analysis cancelled: {0}")]
    Cancelled(String),

    /// Some transactions could not be analysed (reports were still emitted)
    #[error("{failed} of {total} transactions failed analysis")]
    PartialFailure { failed: usize, total: usize },
}

/// RPC error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Failed to establish connection to Bitcoin Core RPC server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// TXID string format is invalid (not valid hex or wrong length)
    #[error("Invalid txid: {txid}")]
    InvalidTxid { txid: String },

    /// Block hash string format is invalid
    #[error("Invalid block hash: {hash}")]
    InvalidBlockHash { hash: String },

    /// RPC method call failed (covers network errors, authentication, etc.)
    #[error("RPC call failed: {method} - {message}")]
    CallFailed { method: String, message: String },

    /// Failed to deserialise RPC response data
    #[error("Deserialisation failed: {0}")]
    DeserialisationFailed(String),

    /// Retry limit exceeded for RPC operation
    #[error("Max retries exceeded: {operation} (last error: {last_error})")]
    MaxRetriesExceeded {
        operation: String,
        last_error: String,
    },

    /// RPC request timed out
    #[error("Request timeout: {timeout_seconds}s for {operation}")]
    Timeout {
        timeout_seconds: u64,
        operation: String,
    },

    /// Transaction exists in valid format but not found in blockchain/mempool
    #[error("Transaction not found: {txid}")]
    TransactionNotFound { txid: String },

    /// Block exists in valid format but is unknown to the node
    #[error("Block not found: {hash}")]
    BlockNotFound { hash: String },
}

impl RpcError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Malformed identifiers, unknown objects and undecodable payloads fail
    /// the same way every time and are surfaced verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectionFailed(_) | RpcError::CallFailed { .. } | RpcError::Timeout { .. }
        )
    }
}

/// Failure of a single transaction's analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Input references an output index the prior transaction does not have
    #[error("Output {txid}:{vout} does not exist")]
    MissingOutput { txid: String, vout: u32 },

    /// The worker owning the task stopped before reporting
    #[error("Worker stopped before completing transaction {index}")]
    WorkerLost { index: usize },
}

/// Application-wide result type - single point of truth
pub type AppResult<T> = Result<T, AppError>;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Io(std::io::Error::other(err))
    }
}
