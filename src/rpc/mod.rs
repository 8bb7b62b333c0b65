//! Bitcoin Core RPC integration module
//!
//! This module provides all node-facing functionality:
//! - **Source** - The `BlockSource` seam and the retrying async `Fetcher`
//! - **Client** - Bitcoin Core implementation of `BlockSource`
//! - **Cache** - Prior-transaction cache shared by the worker pool
//! - **Retry** - Exponential backoff retry utilities and timeout wrappers
//!
//! The RPC client uses the `corepc-client` crate's blocking client; every call
//! goes through `spawn_blocking` with a per-attempt timeout.

pub mod cache;
pub mod client;
pub mod retry;
pub mod source;

// Re-export main types
pub use cache::{CacheStats, TransactionCache};
pub use client::BitcoinRpcClient;
pub use retry::{calculate_next_backoff, call_with_retry, execute_with_timeout, RetryPolicy};
pub use source::{BlockSource, Fetcher};
