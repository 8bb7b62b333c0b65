//! Block analysis pipeline
//!
//! Runs `BlockAnalyser` end to end against the in-memory node: ordering,
//! fee arithmetic, shared-cache fetch counts, failure policies and
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use block_fee_analyser::analyser::{AnalyserSettings, BlockAnalyser, OutputFormat};
use block_fee_analyser::errors::{AnalysisError, AppError, RpcError};
use tokio_util::sync::CancellationToken;

use crate::common::fast_retry_policy;
use crate::common::fixtures::{
    block_hash, coinbase_tx, p2pkh_address, prior_tx, spend_tx, txid,
};
use crate::common::mock_source::MockBlockSource;

/// Coinbase, then two transactions spending different outputs of the same
/// out-of-block transaction
fn three_transaction_node() -> MockBlockSource {
    MockBlockSource::new()
        .with_block(
            &block_hash(),
            vec![
                coinbase_tx(0x10, 625_000_000),
                spend_tx(0x11, &[(0x50, 0)], &[55_000]),
                spend_tx(0x12, &[(0x50, 1)], &[30_000, 9_000]),
            ],
        )
        .with_transaction(prior_tx(0x50, &[60_000, 40_000]))
}

fn settings(workers: usize) -> AnalyserSettings {
    AnalyserSettings {
        workers,
        ..Default::default()
    }
}

async fn run_to_string(
    source: Arc<MockBlockSource>,
    settings: AnalyserSettings,
) -> (Result<block_fee_analyser::analyser::AnalysisSummary, AppError>, String) {
    let analyser = BlockAnalyser::new(source, fast_retry_policy(3), settings);
    let mut out = Vec::new();
    let result = analyser.run(&block_hash(), &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_transaction_block() -> Result<()> {
    let source = Arc::new(three_transaction_node());
    let (result, output) = run_to_string(Arc::clone(&source), settings(4)).await;
    let summary = result?;

    let expected = format!(
        "Tx:0 {tx0}\n\tinputs:\n\t\tcoinbase\n\toutputs:\n\t\t[{a10}] 6.25000000\n\
         Tx:1 {tx1}\n\tinputs:\n\t\t[{a50}] 0.00060000\n\toutputs:\n\t\t[{a11}] 0.00055000\n\tfee: 0.00005000\n\
         Tx:2 {tx2}\n\tinputs:\n\t\t[{a51}] 0.00040000\n\toutputs:\n\t\t[{a12}] 0.00030000\n\t\t[{a13}] 0.00009000\n\tfee: 0.00001000\n",
        tx0 = txid(0x10),
        tx1 = txid(0x11),
        tx2 = txid(0x12),
        a10 = p2pkh_address(0x10),
        a11 = p2pkh_address(0x11),
        a12 = p2pkh_address(0x12),
        a13 = p2pkh_address(0x13),
        a50 = p2pkh_address(0x50),
        a51 = p2pkh_address(0x51),
    );
    assert_eq!(output, expected);

    // Both spends share one fetch of the prior transaction
    assert_eq!(source.fetches_of(&txid(0x50).to_string()), 1);
    assert_eq!(source.total_transaction_fetches(), 1);
    assert_eq!(source.block_fetches(), 1);

    assert_eq!(summary.transactions, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total_fees_sats, 6_000);
    assert_eq!(summary.cache.fetches, 1);
    assert_eq!(summary.cache.entries, 1);
    assert_eq!(summary.block_hash, block_hash());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_output_is_identical_for_any_worker_count() -> Result<()> {
    // Many transactions with uneven fetch latency, so completion order varies
    let mut block = vec![coinbase_tx(0x01, 625_000_000)];
    let mut node = MockBlockSource::new().with_delay(Duration::from_millis(2));
    for i in 0..24u8 {
        let prior = 0x80 + i;
        node = node.with_transaction(prior_tx(prior, &[10_000 + i as u64 * 100, 5_000]));
        block.push(spend_tx(0x20 + i, &[(prior, 0), (prior, 1)], &[14_000]));
    }
    let count = block.len();
    let node = Arc::new(node.with_block(&block_hash(), block));

    let mut outputs = Vec::new();
    for workers in [1, 4, count] {
        let (result, output) = run_to_string(Arc::clone(&node), settings(workers)).await;
        let summary = result?;
        assert_eq!(summary.succeeded, count);
        outputs.push(output);
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);

    // Report i describes transaction i
    let headers: Vec<String> = outputs[0]
        .lines()
        .filter(|line| line.starts_with("Tx:"))
        .map(str::to_string)
        .collect();
    assert_eq!(headers.len(), count);
    assert_eq!(headers[0], format!("Tx:0 {}", txid(0x01)));
    for i in 0..24u8 {
        assert_eq!(
            headers[i as usize + 1],
            format!("Tx:{} {}", i + 1, txid(0x20 + i))
        );
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_transaction_is_reported_inline() -> Result<()> {
    let node = MockBlockSource::new()
        .with_block(
            &block_hash(),
            vec![
                coinbase_tx(0x10, 625_000_000),
                spend_tx(0x11, &[(0x66, 0)], &[1_000]),
                spend_tx(0x12, &[(0x50, 0)], &[50_000]),
            ],
        )
        .with_transaction(prior_tx(0x50, &[60_000]));

    let (result, output) = run_to_string(Arc::new(node), settings(2)).await;
    let summary = result?;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_fees_sats, 10_000);

    let failure = format!(
        "Tx:1 {}\n\terror: Transaction not found: {}\n",
        txid(0x11),
        txid(0x66)
    );
    assert!(output.contains(&failure));
    // Siblings after the failure are still reported, in order
    let tx2 = output.find(&format!("Tx:2 {}", txid(0x12))).unwrap();
    assert!(output.find(&failure).unwrap() < tx2);
    assert!(output.ends_with("\tfee: 0.00010000\n"));
    Ok(())
}

#[tokio::test]
async fn test_fail_fast_aborts_run() {
    let node = MockBlockSource::new().with_block(
        &block_hash(),
        vec![
            coinbase_tx(0x10, 625_000_000),
            spend_tx(0x11, &[(0x66, 0)], &[1_000]),
            spend_tx(0x12, &[(0x67, 0)], &[1_000]),
        ],
    );
    let settings = AnalyserSettings {
        fail_fast: true,
        ..settings(1)
    };

    let (result, output) = run_to_string(Arc::new(node), settings).await;

    match result {
        Err(AppError::Analysis(AnalysisError::Rpc(RpcError::TransactionNotFound { txid: missing }))) => {
            assert_eq!(missing, txid(0x66).to_string());
        }
        other => panic!("expected fail-fast analysis error, got {:?}", other),
    }
    assert!(output.starts_with(&format!("Tx:0 {}", txid(0x10))));
    assert!(output.contains(&format!("Tx:1 {}\n\terror:", txid(0x11))));
    assert!(!output.contains("Tx:2"));
}

#[tokio::test]
async fn test_missing_output_index() -> Result<()> {
    let node = MockBlockSource::new()
        .with_block(&block_hash(), vec![spend_tx(0x11, &[(0x50, 3)], &[1_000])])
        .with_transaction(prior_tx(0x50, &[60_000]));

    let (result, output) = run_to_string(Arc::new(node), settings(1)).await;
    assert_eq!(result?.failed, 1);
    assert_eq!(
        output,
        format!(
            "Tx:0 {}\n\terror: Output {}:3 does not exist\n",
            txid(0x11),
            txid(0x50)
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_transient_fetch_failures_are_retried() -> Result<()> {
    let prior = txid(0x50).to_string();
    let source = Arc::new(three_transaction_node().with_transient_failures(&prior, 2));

    let (result, _) = run_to_string(Arc::clone(&source), settings(2)).await;
    let summary = result?;

    assert_eq!(summary.failed, 0);
    assert_eq!(source.fetches_of(&prior), 3);
    assert_eq!(summary.cache.fetches, 1);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_retries_are_not_cached() -> Result<()> {
    let prior = txid(0x50).to_string();
    let source = Arc::new(
        MockBlockSource::new()
            .with_block(&block_hash(), vec![spend_tx(0x11, &[(0x50, 0)], &[55_000])])
            .with_transaction(prior_tx(0x50, &[60_000]))
            .with_transient_failures(&prior, 4),
    );
    let analyser = BlockAnalyser::new(source.clone(), fast_retry_policy(3), settings(1));

    let mut first = Vec::new();
    let summary = analyser.run(&block_hash(), &mut first).await?;
    assert_eq!(summary.failed, 1);
    assert!(String::from_utf8(first)?.contains("Max retries exceeded"));
    assert!(analyser.cache().is_empty());

    // The cache kept nothing, so the next run fetches again and succeeds
    let mut second = Vec::new();
    let summary = analyser.run(&block_hash(), &mut second).await?;
    assert_eq!(summary.failed, 0);
    assert_eq!(source.fetches_of(&prior), 5);
    assert!(String::from_utf8(second)?.contains("fee: 0.00005000"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_block_is_fatal() {
    let source = Arc::new(MockBlockSource::new());
    let (result, output) = run_to_string(source, settings(4)).await;

    assert!(matches!(
        result,
        Err(AppError::Rpc(RpcError::BlockNotFound { .. }))
    ));
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_empty_block() -> Result<()> {
    let node = MockBlockSource::new().with_block(&block_hash(), vec![]);
    let (result, output) = run_to_string(Arc::new(node), settings(4)).await;

    let summary = result?;
    assert_eq!(summary.transactions, 0);
    assert!(output.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_deadline_cancels_workers() {
    let node = three_transaction_node().with_delay(Duration::from_millis(300));
    let settings = AnalyserSettings {
        run_timeout: Some(Duration::from_millis(50)),
        ..settings(2)
    };

    let (result, _) = run_to_string(Arc::new(node), settings).await;
    match result {
        Err(AppError::Cancelled(reason)) => assert!(reason.contains("deadline")),
        other => panic!("expected deadline cancellation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_caller_cancellation() {
    let analyser = BlockAnalyser::new(
        Arc::new(three_transaction_node()),
        fast_retry_policy(3),
        settings(2),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut out = Vec::new();
    let result = analyser.run_with_cancel(&block_hash(), &mut out, cancel).await;
    assert!(matches!(result, Err(AppError::Cancelled(reason)) if reason == "interrupted"));
}

#[tokio::test]
async fn test_json_lines_in_block_order() -> Result<()> {
    let settings = AnalyserSettings {
        format: OutputFormat::Json,
        ..settings(3)
    };
    let (result, output) = run_to_string(Arc::new(three_transaction_node()), settings).await;
    result?;

    let records: Vec<serde_json::Value> = output
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 3);

    assert_eq!(records[0]["index"], 0);
    assert_eq!(records[0]["inputs"][0], "coinbase");
    assert!(records[0]["fee_sats"].is_null());

    assert_eq!(records[1]["txid"], txid(0x11).to_string());
    assert_eq!(records[1]["inputs"][0]["spends"]["value_sats"], 60_000);
    assert_eq!(
        records[1]["inputs"][0]["spends"]["addresses"][0],
        p2pkh_address(0x50)
    );
    assert_eq!(records[1]["fee_sats"], 5_000);
    assert_eq!(records[2]["fee_sats"], 1_000);
    Ok(())
}
