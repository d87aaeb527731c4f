//! Puller, batcher and the full pipeline against fakes.

mod common;

use alloy::sol_types::SolCall;
use std::time::Duration;
use tokio::sync::mpsc;

use common::*;
use relay_maintainer::blockchain::abi::IRelay;
use relay_maintainer::config::PipelineConfig;
use relay_maintainer::lifecycle::Shutdown;
use relay_maintainer::relay::{collect_batch, spawn_pipeline, HeaderBatcher, HeaderPuller, RelayError};

fn sorted_by_nonce(ledger: &FakeLedger) -> Vec<SentTx> {
    let mut sent = ledger.sent();
    sent.sort_by_key(|tx| tx.nonce);
    sent
}

// ---------------------------------------------------------------------------
// Puller
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_puller_enqueues_in_height_order() {
    let headers = chain(0, 11, 0);
    let source = FakeSource::new(&headers);
    let (tx, mut rx) = mpsc::channel(50);
    let handle = tokio::spawn(HeaderPuller::new(source.clone(), &headers[0], tx, &PipelineConfig::default()).run());

    let mut got = Vec::new();
    for _ in 0..10 {
        got.push(rx.recv().await.unwrap());
    }
    assert_eq!(heights(&got), (1..=10).collect::<Vec<_>>());

    // Nothing new at the tip until the node extends its chain.
    source.extend(&extend(&headers[10], 1, 0));
    let next = rx.recv().await.unwrap();
    assert_eq!(next.height, 11);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_puller_skips_repeated_header() {
    let headers = chain(0, 9, 0);
    let source = FakeSource::new(&headers);
    source.repeat_next(2);
    let (tx, mut rx) = mpsc::channel(50);
    let handle = tokio::spawn(HeaderPuller::new(source.clone(), &headers[5], tx, &PipelineConfig::default()).run());

    let mut got = Vec::new();
    for _ in 0..3 {
        got.push(rx.recv().await.unwrap());
    }
    assert_eq!(heights(&got), vec![6, 7, 8]);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_puller_recovers_from_transient_errors() {
    let headers = chain(0, 4, 0);
    let source = FakeSource::new(&headers);
    source.fail_next(3);
    let (tx, mut rx) = mpsc::channel(50);
    let handle = tokio::spawn(HeaderPuller::new(source.clone(), &headers[0], tx, &PipelineConfig::default()).run());

    assert_eq!(rx.recv().await.unwrap(), headers[1]);
    assert_eq!(&source.height_requests()[..4], &[1, 1, 1, 1]);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_puller_gives_up_after_repeated_errors() {
    let headers = chain(0, 4, 0);
    let source = FakeSource::new(&headers);
    source.fail_next(100);
    let (tx, _rx) = mpsc::channel(50);
    let config = PipelineConfig::default();

    let err = HeaderPuller::new(source.clone(), &headers[0], tx, &config)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Source(_)));
    assert_eq!(
        source.height_requests().len(),
        config.max_consecutive_rpc_errors as usize + 1
    );
}

#[tokio::test(start_paused = true)]
async fn test_puller_enqueues_across_midstream_reorg() {
    let headers = chain(0, 7, 0);
    let source = FakeSource::new(&headers);
    let (tx, mut rx) = mpsc::channel(50);
    let handle = tokio::spawn(HeaderPuller::new(source.clone(), &headers[5], tx, &PipelineConfig::default()).run());

    assert_eq!(rx.recv().await.unwrap(), headers[6]);

    let fork = extend(&headers[5], 3, 1);
    source.reorg(&fork);

    let next = rx.recv().await.unwrap();
    assert_eq!(next, fork[1]);
    assert_ne!(next.prevhash, headers[6].hash);

    handle.abort();
}

#[tokio::test]
async fn test_puller_stops_when_queue_closes() {
    let headers = chain(0, 4, 0);
    let source = FakeSource::new(&headers);
    let (tx, rx) = mpsc::channel(50);
    drop(rx);

    let err = HeaderPuller::new(source, &headers[0], tx, &PipelineConfig::default())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::QueueClosed));
}

// ---------------------------------------------------------------------------
// Batch collection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_collect_batch_caps_size() {
    let headers = chain(0, 7, 0);
    let (tx, mut rx) = mpsc::channel(50);
    for h in &headers {
        tx.send(h.clone()).await.unwrap();
    }

    let batch = collect_batch(&mut rx, 5, Duration::from_secs(1)).await.unwrap();
    assert_eq!(heights(&batch), vec![0, 1, 2, 3, 4]);
    let rest = collect_batch(&mut rx, 5, Duration::from_secs(1)).await.unwrap();
    assert_eq!(heights(&rest), vec![5, 6]);
}

#[tokio::test(start_paused = true)]
async fn test_collect_batch_returns_partial_after_idle() {
    let headers = chain(0, 2, 0);
    let (tx, mut rx) = mpsc::channel(50);
    for h in &headers {
        tx.send(h.clone()).await.unwrap();
    }

    let started = tokio::time::Instant::now();
    let batch = collect_batch(&mut rx, 5, Duration::from_secs(1)).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
    drop(tx);
}

#[tokio::test]
async fn test_collect_batch_none_when_closed_and_empty() {
    let (tx, mut rx) = mpsc::channel(50);
    drop(tx);
    assert!(collect_batch(&mut rx, 5, Duration::from_secs(1)).await.is_none());
}

// ---------------------------------------------------------------------------
// Batcher
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_ordinary_batch_submits_then_advances() {
    let headers = chain(0, 11, 0);
    let source = FakeSource::new(&headers);
    let ledger = FakeLedger::new(&headers[5], &headers);
    let (shutdown, _faults) = Shutdown::new();
    let ctx = context(source, ledger.clone(), shutdown).await;
    let (_tx, rx) = mpsc::channel(1);
    let mut batcher = HeaderBatcher::new(ctx, rx);

    batcher.process_batch(headers[6..=10].to_vec()).await.unwrap();
    settle().await;

    let sent = sorted_by_nonce(&ledger);
    assert_eq!(
        sent.iter().map(SentTx::method).collect::<Vec<_>>(),
        vec!["addHeaders", "markNewHeaviest"]
    );
    assert_eq!(sent.iter().map(|tx| tx.nonce).collect::<Vec<_>>(), vec![7, 8]);

    let call = IRelay::addHeadersCall::abi_decode(&sent[0].input).unwrap();
    assert_eq!(call.anchor.as_ref(), &headers[5].raw[..]);
    assert_eq!(call.headers.len(), 5 * 80);
    assert_eq!(&call.headers[..80], &headers[6].raw[..]);
    assert_eq!(ledger.best(), headers[10].hash);
}

#[tokio::test(start_paused = true)]
async fn test_small_batches_accumulate_before_advancing() {
    let headers = chain(0, 11, 0);
    let source = FakeSource::new(&headers);
    let ledger = FakeLedger::new(&headers[5], &headers);
    let (shutdown, _faults) = Shutdown::new();
    let ctx = context(source, ledger.clone(), shutdown).await;
    let (_tx, rx) = mpsc::channel(1);
    let mut batcher = HeaderBatcher::new(ctx, rx);

    batcher.process_batch(headers[6..=8].to_vec()).await.unwrap();
    settle().await;
    assert_eq!(ledger.sent_methods(), vec!["addHeaders"]);

    batcher.process_batch(headers[9..=10].to_vec()).await.unwrap();
    settle().await;
    let methods: Vec<_> = sorted_by_nonce(&ledger).iter().map(SentTx::method).collect();
    assert_eq!(methods, vec!["addHeaders", "addHeaders", "markNewHeaviest"]);
}

#[tokio::test(start_paused = true)]
async fn test_epoch_crossing_batch_is_split_in_order() {
    let headers = chain(0, 2019, 0);
    let source = FakeSource::new(&headers);
    let ledger = FakeLedger::new(&headers[2013], &headers);
    let (shutdown, _faults) = Shutdown::new();
    let ctx = context(source, ledger.clone(), shutdown).await;
    let (_tx, rx) = mpsc::channel(1);
    let mut batcher = HeaderBatcher::new(ctx, rx);

    batcher.process_batch(headers[2014..=2018].to_vec()).await.unwrap();
    settle().await;

    let sent = sorted_by_nonce(&ledger);
    assert_eq!(
        sent.iter().map(SentTx::method).collect::<Vec<_>>(),
        vec!["addHeaders", "addHeadersWithRetarget", "markNewHeaviest"]
    );

    let pre = IRelay::addHeadersCall::abi_decode(&sent[0].input).unwrap();
    assert_eq!(pre.anchor.as_ref(), &headers[2013].raw[..]);
    assert_eq!(pre.headers.len(), 2 * 80);

    let post = IRelay::addHeadersWithRetargetCall::abi_decode(&sent[1].input).unwrap();
    assert_eq!(post.oldPeriodStartHeader.as_ref(), &headers[0].raw[..]);
    assert_eq!(post.oldPeriodEndHeader.as_ref(), &headers[2015].raw[..]);
    assert_eq!(post.headers.len(), 3 * 80);
    assert_eq!(&post.headers[..80], &headers[2016].raw[..]);

    let mark = IRelay::markNewHeaviestCall::abi_decode(&sent[2].input).unwrap();
    assert_eq!(mark.newBest.as_ref(), &headers[2018].raw[..]);
}

#[tokio::test(start_paused = true)]
async fn test_retarget_batch_uses_previous_epoch_bounds() {
    let headers = chain(0, 4037, 0);
    let source = FakeSource::new(&headers);
    let ledger = FakeLedger::new(&headers[4031], &headers);
    let (shutdown, _faults) = Shutdown::new();
    let ctx = context(source, ledger.clone(), shutdown).await;
    let (_tx, rx) = mpsc::channel(1);
    let mut batcher = HeaderBatcher::new(ctx, rx);

    batcher.process_batch(headers[4032..=4036].to_vec()).await.unwrap();
    settle().await;

    let sent = sorted_by_nonce(&ledger);
    assert_eq!(sent[0].method(), "addHeadersWithRetarget");
    let call = IRelay::addHeadersWithRetargetCall::abi_decode(&sent[0].input).unwrap();
    assert_eq!(call.oldPeriodStartHeader.as_ref(), &headers[2016].raw[..]);
    assert_eq!(call.oldPeriodEndHeader.as_ref(), &headers[4031].raw[..]);
    assert_eq!(call.headers.len(), 5 * 80);
}

#[tokio::test(start_paused = true)]
async fn test_missing_anchor_fails_the_batch() {
    let headers = chain(0, 11, 0);
    let source = FakeSource::new(&headers[6..]);
    let ledger = FakeLedger::new(&headers[5], &headers);
    let (shutdown, _faults) = Shutdown::new();
    let ctx = context(source, ledger.clone(), shutdown).await;
    let (_tx, rx) = mpsc::channel(1);
    let mut batcher = HeaderBatcher::new(ctx, rx);

    let err = batcher.process_batch(headers[6..=10].to_vec()).await.unwrap_err();
    assert!(matches!(err, RelayError::MissingHeader(d) if d == headers[5].hash));
    assert!(ledger.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_pipeline_forwards_and_marks_best() {
    let headers = chain(0, 11, 0);
    let source = FakeSource::new(&headers);
    let ledger = FakeLedger::new(&headers[0], &headers);
    let (shutdown, _faults) = Shutdown::new();
    let ctx = context(source, ledger.clone(), shutdown.clone()).await;

    spawn_pipeline(&ctx, &headers[0], &shutdown);

    for _ in 0..600 {
        if ledger.sent_methods().contains(&"markNewHeaviest") {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    settle().await;

    let methods: Vec<_> = sorted_by_nonce(&ledger).iter().map(SentTx::method).collect();
    assert_eq!(&methods[..2], &["addHeaders", "markNewHeaviest"]);
    assert_eq!(ledger.best(), headers[5].hash);

    shutdown.drain(Duration::from_secs(30)).await.unwrap();
    assert_eq!(shutdown.task_count(), 0);
}
