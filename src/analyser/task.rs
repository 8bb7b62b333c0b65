//! Work queue and task model
//!
//! One [`Task`] per block transaction, all queued before any worker starts.
//! Each task owns the sending half of a one-shot channel; the collector keeps
//! the receiving halves as [`PendingReport`]s indexed by block position.

use crate::analyser::report::TransactionReport;
use crate::errors::{AnalysisError, AppError, AppResult};
use crate::types::TransactionDetail;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Outcome of analysing one transaction
pub type TaskOutcome = Result<TransactionReport, AnalysisError>;

/// A transaction waiting to be analysed
pub struct Task {
    /// Position in the block, 0 is the coinbase transaction
    pub index: usize,
    pub transaction: TransactionDetail,
    completion: oneshot::Sender<TaskOutcome>,
}

impl Task {
    /// Deliver the outcome. Consumes the task, so it can only happen once.
    pub fn complete(self, outcome: TaskOutcome) {
        // The collector only goes away when the run is being torn down
        let _ = self.completion.send(outcome);
    }
}

/// The collector's handle on a task's outcome
pub struct PendingReport {
    pub index: usize,
    pub txid: String,
    receiver: oneshot::Receiver<TaskOutcome>,
}

impl PendingReport {
    /// Wait for the owning worker to deliver the outcome.
    ///
    /// A task dropped without completion (worker panicked or was torn down)
    /// resolves to [`AnalysisError::WorkerLost`].
    pub async fn wait(self) -> TaskOutcome {
        let index = self.index;
        self.receiver
            .await
            .unwrap_or_else(|_| Err(AnalysisError::WorkerLost { index }))
    }
}

/// Multi-consumer queue of tasks. Filled and closed before workers start.
pub struct WorkQueue {
    receiver: Mutex<mpsc::Receiver<Task>>,
}

impl WorkQueue {
    /// Claim the next task; `None` once the queue is drained.
    ///
    /// Each task is handed to exactly one caller.
    pub async fn next(&self) -> Option<Task> {
        self.receiver.lock().await.recv().await
    }
}

/// Build one task per transaction, in block order.
///
/// The queue's capacity equals the transaction count, so filling it never
/// waits; the sender is dropped on return, which closes the queue.
pub fn build_queue(
    transactions: Vec<TransactionDetail>,
) -> AppResult<(WorkQueue, Vec<PendingReport>)> {
    let (sender, receiver) = mpsc::channel(transactions.len().max(1));
    let mut pending = Vec::with_capacity(transactions.len());

    for (index, transaction) in transactions.into_iter().enumerate() {
        let (completion, report_receiver) = oneshot::channel();
        pending.push(PendingReport {
            index,
            txid: transaction.txid.to_string(),
            receiver: report_receiver,
        });
        sender
            .try_send(Task {
                index,
                transaction,
                completion,
            })
            .map_err(|e| {
                AppError::Cancelled(format!("work queue rejected transaction {}: {}", index, e))
            })?;
    }

    Ok((
        WorkQueue {
            receiver: Mutex::new(receiver),
        },
        pending,
    ))
}
