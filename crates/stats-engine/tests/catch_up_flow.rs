//! End-to-end catch-up scenarios: start the engine over a mock node and
//! in-memory stores, feed it tips, and check what lands in the stores.

use std::sync::Arc;
use std::time::Duration;

use stats_engine::test_utils::{FixedTimeSource, FlakyDayStore, MockNode, TestBlock};
use stats_engine::{
    Amount, CatchUpReport, DayKey, DayStore, InMemoryStatsStore, PassOutcome, StakeTotalStore,
    StatsApi, StatsConfig, StatsHandle, StatsService, StatsStores, TimeSpan, TipPhase,
    WatermarkStore,
};
use tokio::sync::broadcast;

// 2023-11-15T12:00:00Z
const NOW: u64 = 1_700_049_600;

fn chain(node: MockNode, heights: std::ops::RangeInclusive<u64>) -> MockNode {
    heights.fold(node, |node, h| node.with_block(block(h)))
}

fn block(height: u64) -> TestBlock {
    TestBlock::pow(height, NOW - 3_000 + height * 60)
        .coinbase("5000.00000010")
        .subsidy("5000")
        .transfer(&["2"])
        .difficulty(3.0)
}

async fn start(node: Arc<MockNode>, store: Arc<InMemoryStatsStore>) -> StatsHandle {
    StatsService::start(
        StatsConfig::default(),
        node,
        StatsStores::shared(store),
        Arc::new(FixedTimeSource::new(NOW)),
    )
    .await
    .expect("engine starts")
}

/// Wait for the report that brings the watermark to `watermark`.
async fn wait_for_watermark(
    reports: &mut broadcast::Receiver<CatchUpReport>,
    watermark: u64,
) -> Vec<CatchUpReport> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let report = reports.recv().await.expect("report channel open");
            let done = report.watermark >= watermark;
            seen.push(report);
            if done {
                break;
            }
        }
    })
    .await
    .expect("catch-up finished in time");
    seen
}

async fn wait_for_report(reports: &mut broadcast::Receiver<CatchUpReport>) -> CatchUpReport {
    tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("report in time")
        .expect("report channel open")
}

#[tokio::test]
async fn test_fresh_start_folds_every_height_once_in_order() {
    let node = Arc::new(chain(MockNode::new(), 1..=5));
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(node.clone(), store.clone()).await;
    let mut reports = handle.subscribe();
    let seen = wait_for_watermark(&mut reports, 5).await;

    assert_eq!(seen.last().unwrap().outcome, PassOutcome::Completed);
    assert_eq!(node.info_requests(), vec![1, 2, 3, 4, 5]);
    assert_eq!(store.get_watermark("STATISTIC").await.unwrap(), Some(5));

    let today = DayKey::from_timestamp(NOW);
    let bucket = store.get_day(today).await.unwrap().expect("bucket for today");
    assert_eq!(bucket.block_count, 5);
    assert_eq!(bucket.transaction_count, 10);
    assert_eq!(bucket.total_fees.sum, Amount::from_base_units(50));
    assert_eq!(bucket.output_volume, Amount::from_coins(10));
    assert_eq!(bucket.supply_snapshot, Some(Amount::from_coins(25_000)));

    // Same tip again schedules nothing.
    assert!(!handle.notify(5));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(node.info_requests().len(), 5);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_reader_serves_folded_days_and_live_window() {
    let node = Arc::new(chain(MockNode::new(), 1..=5));
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(node, store).await;
    let mut reports = handle.subscribe();
    wait_for_watermark(&mut reports, 5).await;

    let reader = handle.reader();
    let span = TimeSpan::days(1);

    let fees = reader.get_fees(span).await.unwrap();
    assert_eq!(fees.len(), 1);
    assert_eq!(fees[0].fee, "0.00000010");

    let difficulty = reader.get_difficulty(span).await.unwrap();
    assert_eq!(difficulty[0].difficulty, 3.0);

    let transactions = reader.get_transactions(span).await.unwrap();
    assert_eq!(transactions[0].block_count, 5);

    let rolling = reader.get_rolling_total();
    assert_eq!(rolling.n_blocks_mined, 5);
    assert_eq!(rolling.time_between_blocks, 60.0);
    assert_eq!(rolling.transaction_fees, Amount::from_base_units(50));
    assert_eq!(rolling.difficulty, Some(3.0));

    // 100,000,000 at height 5000, less 4 per block below it.
    assert_eq!(
        reader.get_total_supply().await.unwrap(),
        Amount::from_coins(99_980_020)
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_burst_of_notifications_is_coalesced() {
    let node = Arc::new(chain(MockNode::new(), 1..=2));
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(node.clone(), store.clone()).await;
    let mut reports = handle.subscribe();
    wait_for_watermark(&mut reports, 2).await;

    for h in 3..=20 {
        node.push_block(block(h));
    }
    for h in 3..=20 {
        handle.notify(h);
    }
    let seen = wait_for_watermark(&mut reports, 20).await;

    assert_eq!(seen.len(), 1, "expected one follow-up pass, got {seen:?}");
    assert_eq!(seen[0].from_height, 3);
    assert_eq!(seen[0].target_height, 20);
    assert_eq!(seen[0].outcome, PassOutcome::Completed);
    assert_eq!(node.info_requests(), (1..=20).collect::<Vec<_>>());
    assert_eq!(store.get_watermark("STATISTIC").await.unwrap(), Some(20));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_tips_during_a_pass_collapse_into_one_follow_up() {
    let node = Arc::new(chain(MockNode::new(), 1..=2));
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(node.clone(), store.clone()).await;
    let mut reports = handle.subscribe();
    wait_for_watermark(&mut reports, 2).await;

    let gate = node.gate_at(3);
    node.push_block(block(3));
    assert!(handle.notify(3));
    gate.entered().await;

    let state = handle.tip_state();
    assert_eq!(state.phase, TipPhase::CatchingUp);
    assert_eq!(state.last_known_tip, 3);

    for h in 4..=8 {
        node.push_block(block(h));
        assert!(handle.notify(h));
    }
    gate.release();

    let seen = wait_for_watermark(&mut reports, 8).await;
    assert_eq!(seen.len(), 2, "expected exactly two passes, got {seen:?}");
    assert_eq!((seen[0].from_height, seen[0].target_height), (3, 3));
    assert_eq!((seen[1].from_height, seen[1].target_height), (4, 8));
    assert_eq!(seen[1].folded, 5);

    let state = handle.tip_state();
    assert_eq!(state.phase, TipPhase::Idle);
    assert_eq!(state.last_known_tip, 8);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_missing_height_ends_pass_quietly() {
    let node = Arc::new(chain(MockNode::new(), 1..=3).with_tip(5));
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(node.clone(), store.clone()).await;
    let mut reports = handle.subscribe();
    let report = wait_for_report(&mut reports).await;

    assert_eq!(report.outcome, PassOutcome::Exhausted);
    assert_eq!(report.target_height, 5);
    assert_eq!(report.watermark, 3);
    assert_eq!(report.folded, 3);

    for h in 4..=6 {
        node.push_block(block(h));
    }
    handle.notify(6);
    wait_for_watermark(&mut reports, 6).await;

    let bucket = store
        .get_day(DayKey::from_timestamp(NOW))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.block_count, 6);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_store_failure_keeps_watermark_and_resumes() {
    let node = Arc::new(chain(MockNode::new(), 1..=4));
    let memory = Arc::new(InMemoryStatsStore::new());
    let days = Arc::new(FlakyDayStore::new(memory.clone()));
    days.fail_writes(true);

    let stores = StatsStores {
        days: days.clone(),
        watermarks: memory.clone(),
        totals: memory.clone(),
    };
    let mut handle = StatsService::start(
        StatsConfig::default(),
        node.clone(),
        stores,
        Arc::new(FixedTimeSource::new(NOW)),
    )
    .await
    .unwrap();
    let mut reports = handle.subscribe();

    let report = wait_for_report(&mut reports).await;
    assert!(matches!(report.outcome, PassOutcome::Aborted(ref m) if m.contains("injected")));
    assert_eq!(report.watermark, 0);
    assert_eq!(memory.get_watermark("STATISTIC").await.unwrap(), Some(0));

    days.fail_writes(false);
    node.push_block(block(5));
    handle.notify(5);
    wait_for_watermark(&mut reports, 5).await;

    let bucket = memory
        .get_day(DayKey::from_timestamp(NOW))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.block_count, 5);
    assert_eq!(bucket.last_folded_height, Some(5));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_same_tip_retries_after_aborted_pass() {
    let node = Arc::new(chain(MockNode::new(), 1..=4));
    let memory = Arc::new(InMemoryStatsStore::new());
    let days = Arc::new(FlakyDayStore::new(memory.clone()));
    days.fail_writes(true);

    let stores = StatsStores {
        days: days.clone(),
        watermarks: memory.clone(),
        totals: memory.clone(),
    };
    let mut handle = StatsService::start(
        StatsConfig::default(),
        node.clone(),
        stores,
        Arc::new(FixedTimeSource::new(NOW)),
    )
    .await
    .unwrap();
    let mut reports = handle.subscribe();

    let report = wait_for_report(&mut reports).await;
    assert!(matches!(report.outcome, PassOutcome::Aborted(_)));
    assert_eq!(report.watermark, 0);

    // The node has nothing new; the tip it reports is the same.
    days.fail_writes(false);
    assert!(handle.notify(4));
    let seen = wait_for_watermark(&mut reports, 4).await;

    assert_eq!(seen.last().unwrap().outcome, PassOutcome::Completed);
    assert_eq!(memory.get_watermark("STATISTIC").await.unwrap(), Some(4));
    let bucket = memory
        .get_day(DayKey::from_timestamp(NOW))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.block_count, 4);
    assert_eq!(handle.tip_state().phase, TipPhase::Idle);

    // Caught up: the same tip is now a no-op.
    assert!(!handle.notify(4));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_restart_does_not_double_count() {
    let node = Arc::new(chain(MockNode::new(), 1..=5));
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(node.clone(), store.clone()).await;
    let mut reports = handle.subscribe();
    wait_for_watermark(&mut reports, 5).await;
    handle.shutdown().await;

    // A crash between fold and watermark write leaves the watermark behind.
    store.set_watermark("STATISTIC", 3).await.unwrap();

    let mut handle = start(node, store.clone()).await;
    let mut reports = handle.subscribe();
    wait_for_watermark(&mut reports, 5).await;

    let bucket = store
        .get_day(DayKey::from_timestamp(NOW))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.block_count, 5);
    assert_eq!(bucket.difficulty_samples.len(), 5);
    assert_eq!(store.get_watermark("STATISTIC").await.unwrap(), Some(5));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_stake_blocks_feed_stake_share() {
    let node = MockNode::new()
        .with_transaction("prev-a", &["100"])
        .with_transaction("prev-b", &["100"])
        .with_block(block(1))
        .with_block(
            TestBlock::pos(2, NOW - 120)
                .stake_from("prev-a", 0, &["104"])
                .subsidy("4"),
        )
        .with_block(
            TestBlock::pos(3, NOW - 60)
                .stake_from("prev-b", 0, &["106"])
                .subsidy("4"),
        );
    let store = Arc::new(InMemoryStatsStore::new());

    let mut handle = start(Arc::new(node), store.clone()).await;
    let mut reports = handle.subscribe();
    wait_for_watermark(&mut reports, 3).await;

    let total = store.get_stake_total().await.unwrap();
    assert_eq!(total.amount, Amount::from_coins(8));
    assert_eq!(total.through_height, 3);

    let stakes = handle.reader().get_stakes(TimeSpan::days(1)).await.unwrap();
    assert_eq!(stakes[0].share.to_decimal_string(), "1.00000000");

    let fees = handle.reader().get_fees(TimeSpan::days(1)).await.unwrap();
    // (0.0000001 + 4 + 6) / 3
    assert_eq!(fees[0].fee, "3.33333337");

    handle.shutdown().await;
}
