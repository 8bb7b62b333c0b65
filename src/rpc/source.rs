//! The node as seen by the analyser
//!
//! [`BlockSource`] is the seam between the worker pool and whatever serves
//! blocks and transactions: Bitcoin Core over RPC in production, an in-memory
//! map in tests. [`Fetcher`] layers the retry policy on top of any source.

use crate::errors::RpcResult;
use crate::rpc::retry::{call_with_retry, RetryPolicy};
use crate::types::TransactionDetail;
use std::sync::Arc;

/// Blocking access to blocks and transactions by identifier
pub trait BlockSource: Send + Sync {
    /// All transactions of the block, in block order
    fn fetch_block(&self, block_hash: &str) -> RpcResult<Vec<TransactionDetail>>;

    /// A single transaction
    fn fetch_transaction(&self, txid: &str) -> RpcResult<TransactionDetail>;
}

/// Async, retrying front for a [`BlockSource`]
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn BlockSource>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(source: Arc<dyn BlockSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn fetch_block(&self, block_hash: &str) -> RpcResult<Vec<TransactionDetail>> {
        let source = Arc::clone(&self.source);
        let hash = block_hash.to_string();
        call_with_retry(
            &self.policy,
            &format!("fetch_block({})", block_hash),
            move || source.fetch_block(&hash),
        )
        .await
    }

    pub async fn fetch_transaction(&self, txid: &str) -> RpcResult<TransactionDetail> {
        let source = Arc::clone(&self.source);
        let id = txid.to_string();
        call_with_retry(
            &self.policy,
            &format!("fetch_transaction({})", txid),
            move || source.fetch_transaction(&id),
        )
        .await
    }
}
