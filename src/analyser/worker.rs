//! Worker pool members and per-transaction analysis

use crate::analyser::report::{ReportInput, ReportOutput, TransactionReport};
use crate::analyser::task::{TaskOutcome, WorkQueue};
use crate::errors::AnalysisError;
use crate::rpc::{Fetcher, TransactionCache};
use crate::types::{InputDetail, TransactionDetail};
use bitcoin::{Network, OutPoint};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// One member of the worker pool
pub struct Worker {
    pub id: usize,
    pub queue: Arc<WorkQueue>,
    pub cache: TransactionCache,
    pub fetcher: Fetcher,
    pub network: Network,
    pub cancel: CancellationToken,
}

impl Worker {
    /// Drain the queue until it is empty or the run is cancelled
    pub async fn run(self) {
        debug!("Worker {} started", self.id);
        let mut processed = 0usize;

        loop {
            let task = tokio::select! {
                _ = self.cancel.cancelled() => None,
                task = self.queue.next() => task,
            };
            let Some(task) = task else { break };

            debug!("Worker {} analysing transaction {}", self.id, task.index);
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => None,
                outcome = analyse_transaction(
                    &task.transaction,
                    task.index,
                    &self.cache,
                    &self.fetcher,
                    self.network,
                ) => Some(outcome),
            };

            match outcome {
                Some(outcome) => {
                    if let Err(e) = &outcome {
                        error!("Failed to analyse transaction {}: {}", task.index, e);
                    }
                    task.complete(outcome);
                    processed += 1;
                }
                // Dropping the task tells the collector it was abandoned
                None => break,
            }
        }

        debug!("Worker {} stopped after {} transactions", self.id, processed);
    }
}

/// Resolve every input and output of `transaction` and build its report
pub async fn analyse_transaction(
    transaction: &TransactionDetail,
    index: usize,
    cache: &TransactionCache,
    fetcher: &Fetcher,
    network: Network,
) -> TaskOutcome {
    let mut inputs = Vec::with_capacity(transaction.inputs.len());
    let mut input_total: u64 = 0;

    for input in &transaction.inputs {
        match input {
            InputDetail::Coinbase => inputs.push(ReportInput::Coinbase),
            InputDetail::Spend(outpoint) => {
                let spent = resolve_output(outpoint, cache, fetcher, network).await?;
                input_total += spent.value_sats;
                inputs.push(ReportInput::Spends(spent));
            }
        }
    }

    let mut outputs = Vec::with_capacity(transaction.outputs.len());
    let mut output_total: u64 = 0;

    for output in &transaction.outputs {
        let mut output = output.clone();
        output.complete_addresses(network)?;
        output_total += output.value.to_sat();
        outputs.push(ReportOutput {
            addresses: output.addresses,
            value_sats: output.value.to_sat(),
        });
    }

    let fee_sats = if transaction.is_coinbase() {
        None
    } else {
        Some(input_total as i64 - output_total as i64)
    };

    Ok(TransactionReport {
        index,
        txid: transaction.txid.to_string(),
        inputs,
        outputs,
        fee_sats,
    })
}

/// Value and addresses of the output `outpoint` refers to, fetching the prior
/// transaction through the shared cache
pub async fn resolve_output(
    outpoint: &OutPoint,
    cache: &TransactionCache,
    fetcher: &Fetcher,
    network: Network,
) -> Result<ReportOutput, AnalysisError> {
    let txid = outpoint.txid.to_string();
    let prior = cache
        .get_or_fetch(&txid, || fetcher.fetch_transaction(&txid))
        .await?;

    let mut output = prior
        .output(outpoint.vout)
        .cloned()
        .ok_or_else(|| AnalysisError::MissingOutput {
            txid: txid.clone(),
            vout: outpoint.vout,
        })?;
    output.complete_addresses(network)?;

    Ok(ReportOutput {
        addresses: output.addresses,
        value_sats: output.value.to_sat(),
    })
}
