//! Concurrent block analysis
//!
//! A run fetches the block once, queues one task per transaction, and lets a
//! fixed pool of workers drain the queue while sharing one prior-transaction
//! cache. The collector waits on each task's outcome in block order, so
//! reports come out in the same order whatever the worker count.

pub mod report;
pub mod task;
pub mod worker;

pub use report::{OutputFormat, ReportInput, ReportOutput, ReportWriter, TransactionReport};
pub use task::{build_queue, PendingReport, Task, TaskOutcome, WorkQueue};
pub use worker::{analyse_transaction, resolve_output, Worker};

use crate::config::AnalysisConfig;
use crate::errors::{AppError, AppResult};
use crate::rpc::{BlockSource, CacheStats, Fetcher, RetryPolicy, TransactionCache};
use crate::types::TransactionDetail;
use bitcoin::Network;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run-level knobs for a [`BlockAnalyser`]
#[derive(Debug, Clone)]
pub struct AnalyserSettings {
    pub workers: usize,
    pub network: Network,
    /// Abort the run at the first failed transaction
    pub fail_fast: bool,
    /// Cancel the run if it has not finished by then
    pub run_timeout: Option<Duration>,
    pub format: OutputFormat,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            network: Network::Bitcoin,
            fail_fast: false,
            run_timeout: None,
            format: OutputFormat::Console,
        }
    }
}

impl AnalyserSettings {
    pub fn from_config(config: &AnalysisConfig, format: OutputFormat) -> AppResult<Self> {
        Ok(Self {
            workers: config.workers,
            network: config.network()?,
            fail_fast: config.fail_fast,
            run_timeout: (config.run_timeout_seconds > 0)
                .then(|| Duration::from_secs(config.run_timeout_seconds)),
            format,
        })
    }
}

/// Totals for one completed run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSummary {
    pub block_hash: String,
    pub transactions: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of the fees of every successfully analysed non-coinbase transaction
    pub total_fees_sats: i64,
    pub cache: CacheStats,
}

/// Analyses every transaction of a block with a pool of workers
pub struct BlockAnalyser {
    fetcher: Fetcher,
    cache: TransactionCache,
    settings: AnalyserSettings,
}

impl BlockAnalyser {
    pub fn new(
        source: Arc<dyn BlockSource>,
        policy: RetryPolicy,
        settings: AnalyserSettings,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(source, policy),
            cache: TransactionCache::new(),
            settings,
        }
    }

    /// The prior-transaction cache; it outlives individual runs
    pub fn cache(&self) -> &TransactionCache {
        &self.cache
    }

    pub fn settings(&self) -> &AnalyserSettings {
        &self.settings
    }

    /// Analyse the block `block_hash`, writing one report per transaction to `out`
    pub async fn run<W: Write>(&self, block_hash: &str, out: W) -> AppResult<AnalysisSummary> {
        self.run_with_cancel(block_hash, out, CancellationToken::new())
            .await
    }

    /// As [`BlockAnalyser::run`], stopping early once `cancel` fires.
    ///
    /// Failing to fetch the block is fatal. Individual transaction failures
    /// are written inline and counted unless `fail_fast` is set.
    pub async fn run_with_cancel<W: Write>(
        &self,
        block_hash: &str,
        out: W,
        cancel: CancellationToken,
    ) -> AppResult<AnalysisSummary> {
        let run_token = cancel.child_token();
        if let Some(limit) = self.settings.run_timeout {
            spawn_deadline(run_token.clone(), limit);
        }

        let result = self.run_inner(block_hash, out, &cancel, &run_token).await;
        // Stops the deadline timer and any straggling worker
        run_token.cancel();
        result
    }

    async fn run_inner<W: Write>(
        &self,
        block_hash: &str,
        out: W,
        caller: &CancellationToken,
        run_token: &CancellationToken,
    ) -> AppResult<AnalysisSummary> {
        info!("Fetching block {}", block_hash);
        let transactions = tokio::select! {
            biased;
            _ = run_token.cancelled() => {
                return Err(cancelled(caller, self.settings.run_timeout));
            }
            fetched = self.fetcher.fetch_block(block_hash) => fetched?,
        };

        let mut summary = self
            .analyse_transactions(transactions, out, caller, run_token)
            .await?;
        summary.block_hash = block_hash.to_string();
        Ok(summary)
    }

    async fn analyse_transactions<W: Write>(
        &self,
        transactions: Vec<TransactionDetail>,
        out: W,
        caller: &CancellationToken,
        run_token: &CancellationToken,
    ) -> AppResult<AnalysisSummary> {
        let total = transactions.len();
        let worker_count = self.settings.workers.max(1);
        info!(
            "Analysing {} transactions with {} workers",
            total, worker_count
        );

        let (queue, pending) = build_queue(transactions)?;
        let queue = Arc::new(queue);

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            let worker = Worker {
                id,
                queue: Arc::clone(&queue),
                cache: self.cache.clone(),
                fetcher: self.fetcher.clone(),
                network: self.settings.network,
                cancel: run_token.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(queue);

        let mut writer = ReportWriter::new(out, self.settings.format);
        let mut summary = AnalysisSummary {
            transactions: total,
            ..Default::default()
        };

        for report in pending {
            let index = report.index;
            let txid = report.txid.clone();

            let outcome = tokio::select! {
                biased;
                _ = run_token.cancelled() => None,
                outcome = report.wait() => Some(outcome),
            };

            match outcome {
                Some(Ok(report)) => {
                    summary.succeeded += 1;
                    summary.total_fees_sats += report.fee_sats.unwrap_or(0);
                    writer.write_report(&report)?;
                }
                Some(Err(e)) => {
                    summary.failed += 1;
                    writer.write_failure(index, &txid, &e)?;
                    if self.settings.fail_fast {
                        warn!("Aborting run at transaction {}: {}", index, e);
                        writer.flush()?;
                        run_token.cancel();
                        workers.shutdown().await;
                        return Err(AppError::Analysis(e));
                    }
                }
                None => {
                    writer.flush()?;
                    workers.shutdown().await;
                    warn!(
                        "Run stopped after {} of {} transactions",
                        summary.succeeded + summary.failed,
                        total
                    );
                    return Err(cancelled(caller, self.settings.run_timeout));
                }
            }
        }

        writer.flush()?;
        run_token.cancel();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Worker ended abnormally: {}", e);
            }
        }

        summary.cache = self.cache.get_stats();
        debug!(
            "Run complete: {} succeeded, {} failed, cache {:?}",
            summary.succeeded, summary.failed, summary.cache
        );
        Ok(summary)
    }
}

fn spawn_deadline(token: CancellationToken, limit: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                warn!("Run deadline of {:?} reached, cancelling", limit);
                token.cancel();
            }
        }
    });
}

/// The error for a run torn down by `caller` or by its own deadline
fn cancelled(caller: &CancellationToken, run_timeout: Option<Duration>) -> AppError {
    match run_timeout {
        Some(limit) if !caller.is_cancelled() => {
            AppError::Cancelled(format!("run deadline of {}s exceeded", limit.as_secs_f64()))
        }
        _ => AppError::Cancelled("interrupted".to_string()),
    }
}
