//! Bitcoin RPC Test Utilities and Configuration
//!
//! Provides standardised RPC configuration and helper functions for tests
//! that may talk to a local Bitcoin Core node.

use block_fee_analyser::config::BitcoinRpcConfig;
use block_fee_analyser::rpc::BitcoinRpcClient;

/// Standard test RPC URL (localhost)
pub const TEST_RPC_URL: &str = "http://localhost:8332";

/// Standard test RPC username
pub const TEST_RPC_USERNAME: &str = "bitcoin";

/// Standard test RPC password
pub const TEST_RPC_PASSWORD: &str = "bitcoin";

/// Create standard Bitcoin RPC configuration for tests
///
/// # Configuration
/// - URL: `http://localhost:8332`
/// - Username: `bitcoin`
/// - Password: `bitcoin`
/// - Max retries: 3
/// - Timeout: 30 seconds
pub fn create_test_rpc_config() -> BitcoinRpcConfig {
    BitcoinRpcConfig {
        url: TEST_RPC_URL.to_string(),
        username: TEST_RPC_USERNAME.to_string(),
        password: TEST_RPC_PASSWORD.to_string(),
        max_retries: 3,
        initial_backoff_ms: 100,
        timeout_seconds: 30,
        backoff_multiplier: 1.5,
        max_backoff_seconds: 10,
    }
}

/// Connect to the local test node, or explain why not
///
/// # Example
/// ```rust,ignore
/// let client = match create_test_rpc_client() {
///     Ok(c) => c,
///     Err(e) => {
///         eprintln!("Skipping test - Bitcoin RPC not available: {}", e);
///         return;
///     }
/// };
/// ```
pub fn create_test_rpc_client() -> Result<BitcoinRpcClient, String> {
    BitcoinRpcClient::connect(&create_test_rpc_config())
        .map_err(|e| format!("Failed to connect to Bitcoin RPC: {}", e))
}
