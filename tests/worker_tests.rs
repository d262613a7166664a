// Refresh cycle tests: collect -> append -> aggregate -> publish, against in-memory stores

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeDelta};
use common::{FailingStore, MockSource, base_time, at, snapshot, test_config};
use soilmon::config::AppConfig;
use soilmon::history_repo::{
    BlobStore, DEFAULT_STORAGE_KEY, HistoryRepo, MemoryBlobStore, RetentionPolicy,
};
use soilmon::models::{DashboardUpdate, ReadingStatus};
use soilmon::scheduler::{SchedulerConfig, spawn_with_first_delay};
use soilmon::sensor_repo::SensorRepo;
use soilmon::worker::{LatestUpdate, RefreshWorker, WorkerDeps};
use tokio::sync::{RwLock, broadcast};

struct Harness {
    worker: RefreshWorker,
    history: Arc<HistoryRepo>,
    latest: LatestUpdate,
    rx: broadcast::Receiver<DashboardUpdate>,
}

fn default_source() -> MockSource {
    // soil10e is not registered and fails with a transport error
    MockSource::new()
        .reading("soil2n", "temperature", 20.0)
        .reading("soil5n", "temperature", 23.0)
}

fn harness_with(config: AppConfig, source: MockSource, history: HistoryRepo) -> Harness {
    let config = Arc::new(config);
    let history = Arc::new(history);
    let sensor_repo = Arc::new(SensorRepo::new(Arc::new(source), config.endpoints()));
    let (tx, rx) = broadcast::channel(config.display.broadcast_capacity);
    let latest: LatestUpdate = Arc::new(RwLock::new(None));
    let worker = RefreshWorker::new(
        WorkerDeps {
            sensor_repo,
            history_repo: history.clone(),
            tx,
            latest: latest.clone(),
        },
        config,
    );
    Harness {
        worker,
        history,
        latest,
        rx,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), default_source(), HistoryRepo::in_memory())
}

#[tokio::test]
async fn cycle_publishes_readings_and_group_rollups() {
    let mut h = harness();
    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;

    assert_eq!(update.timestamp, base_time());
    assert_eq!(update.retained_snapshots, 1);

    let soil2n = update.reading("soil2n").unwrap();
    assert_eq!(soil2n.label, "Field 2 north");
    assert_eq!(soil2n.unit, "°C");
    assert_eq!(
        soil2n.status,
        ReadingStatus::Ok {
            value: 20.0,
            display: "20.00 °C".into()
        }
    );
    assert_eq!(update.reading("soil5n").unwrap().label, "soil5n");

    let main = update.group("main").unwrap();
    assert_eq!(main.label, "Main field");
    let current = main.current.as_ref().unwrap();
    assert_eq!(current.value, 21.5);
    assert_eq!(current.display, "21.50 °C");
    let max = main.max.as_ref().unwrap();
    assert_eq!(max.point.sensor_id, "soil5n");
    assert_eq!(max.point.timestamp, base_time());
    assert_eq!(max.display, "23.00 °C");
    assert_eq!(main.min.as_ref().unwrap().point.sensor_id, "soil2n");

    let received = h.rx.recv().await.unwrap();
    assert_eq!(received, update);
    assert_eq!(h.latest.read().await.as_ref(), Some(&update));
}

#[tokio::test]
async fn failed_sensor_is_marked_and_absent_from_history() {
    let h = harness();
    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;

    match &update.reading("soil10e").unwrap().status {
        ReadingStatus::Failed { error } => assert!(error.contains("connection refused")),
        other => panic!("expected failure marker, got {:?}", other),
    }

    // the failed sensor's only group has no data at all, which is not zero
    let nursery = update.group("nursery").unwrap();
    assert_eq!(nursery.label, "nursery");
    assert!(nursery.current.is_none());
    assert!(nursery.max.is_none());
    assert!(nursery.min.is_none());

    let log = h.history.read_all().await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].value("soil10e"), None);
    assert_eq!(log[0].value("soil2n"), Some(20.0));
}

#[tokio::test]
async fn rollup_includes_earlier_history() {
    let h = harness();
    h.history
        .append_at(
            snapshot(at(-60), &[("soil2n", 10.0), ("soil5n", 12.0)]),
            at(-60),
        )
        .await
        .unwrap();

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert_eq!(update.retained_snapshots, 2);

    // soil2n (10 + 20) / 2 = 15, soil5n (12 + 23) / 2 = 17.5
    let main = update.group("main").unwrap();
    assert_eq!(main.current.as_ref().unwrap().display, "16.25 °C");
    let min = main.min.as_ref().unwrap();
    assert_eq!(min.point.value, 10.0);
    assert_eq!(min.point.timestamp, at(-60));
}

#[tokio::test]
async fn cycle_prunes_expired_history() {
    let h = harness();
    let old = base_time() - TimeDelta::hours(49);
    h.history
        .append_at(snapshot(old, &[("soil2n", 5.0)]), old)
        .await
        .unwrap();

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert_eq!(update.retained_snapshots, 1);
    let log = h.history.read_all().await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].timestamp, base_time());
}

#[tokio::test(start_paused = true)]
async fn retention_cutoff_is_taken_when_the_append_happens() {
    // collection takes 30s, so the append runs at base + 30s
    let source = default_source().delayed("soil2n", Duration::from_secs(30));
    let h = harness_with(test_config(), source, HistoryRepo::in_memory());
    let borderline = base_time() - TimeDelta::hours(48) + TimeDelta::seconds(10);
    h.history
        .append_at(snapshot(borderline, &[("soil2n", 5.0)]), borderline)
        .await
        .unwrap();

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert_eq!(update.retained_snapshots, 1);
    let log = h.history.read_all().await.unwrap();
    assert_eq!(log.len(), 1);
    // the snapshot itself keeps the cycle start time
    assert_eq!(log[0].timestamp, base_time());
}

#[tokio::test]
async fn quick_cycle_keeps_entry_inside_the_window() {
    let h = harness();
    let borderline = base_time() - TimeDelta::hours(48) + TimeDelta::seconds(10);
    h.history
        .append_at(snapshot(borderline, &[("soil2n", 5.0)]), borderline)
        .await
        .unwrap();

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert_eq!(update.retained_snapshots, 2);
}

#[tokio::test]
async fn storage_failure_still_publishes_latest_readings() {
    let history = HistoryRepo::new(Arc::new(FailingStore), "log", RetentionPolicy::default());
    let mut h = harness_with(test_config(), default_source(), history);

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert_eq!(update.retained_snapshots, 0);
    assert!(matches!(
        update.reading("soil2n").unwrap().status,
        ReadingStatus::Ok { .. }
    ));
    assert_eq!(update.groups.len(), 2);
    assert!(update.group("main").unwrap().current.is_none());
    assert_eq!(h.rx.recv().await.unwrap(), update);
}

#[tokio::test]
async fn corrupt_history_is_replaced_by_this_cycle() {
    let store = Arc::new(MemoryBlobStore::new());
    store.save(DEFAULT_STORAGE_KEY, b"[{broken").await.unwrap();
    let history = HistoryRepo::new(store.clone(), DEFAULT_STORAGE_KEY, RetentionPolicy::default());
    let h = harness_with(test_config(), default_source(), history);

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert_eq!(update.retained_snapshots, 1);
    assert_eq!(
        update.group("main").unwrap().current.as_ref().unwrap().display,
        "21.50 °C"
    );
    let bytes = store.load(DEFAULT_STORAGE_KEY).await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn display_decimals_follow_config() {
    let toml = format!("{}\n[display]\ndecimals = 1\n", common::TEST_CONFIG);
    let config = AppConfig::load_from_str(&toml).unwrap();
    let h = harness_with(config, default_source(), HistoryRepo::in_memory());

    let update = h.worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    let main = update.group("main").unwrap();
    assert_eq!(main.current.as_ref().unwrap().display, "21.5 °C");
}

#[tokio::test]
async fn cycle_without_subscribers_still_updates_latest() {
    let Harness {
        worker, latest, rx, ..
    } = harness();
    drop(rx);

    worker.run_cycle_at(base_time().with_timezone(&Local)).await;
    assert!(latest.read().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn scheduler_drives_refresh_worker() {
    let Harness {
        worker,
        history,
        latest,
        ..
    } = harness();
    let config = SchedulerConfig {
        period_minutes: 10,
        run_on_start: true,
    };
    let handle = spawn_with_first_delay(Arc::new(worker), config, Duration::from_secs(120));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(latest.read().await.is_some());
    assert_eq!(history.read_all().await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(history.read_all().await.unwrap().len(), 2);

    handle.stop().await;
}
