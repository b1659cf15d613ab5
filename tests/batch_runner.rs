mod common;

use common::{ScriptedDriver, fine_row, fines_table, test_config};
use simit_check::progress::{Evidence, FineStatus, JobState, Outcome, ProgressStore};
use simit_check::runner::BatchRunner;
use simit_check::util::parse_plates;
use std::sync::atomic::Ordering;

fn plates(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn failing_plate_is_recorded_and_batch_completes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let driver = ScriptedDriver::new()
        .page("AAA111", fines_table(&[fine_row(), fine_row()]))
        .failing("BBB222");
    let closed = driver.closed.clone();

    let progress = ProgressStore::new();
    progress.try_begin(3).unwrap();
    BatchRunner::new(&cfg, Box::new(driver), progress.clone())
        .run(plates(&["AAA111", "BBB222", "CCC333"]))
        .await;

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Completed, "message: {}", snap.message);
    assert_eq!(snap.processed, 3);
    assert_eq!(snap.percent, 100.0);
    assert_eq!(snap.results.len(), 3);

    let first = &snap.results[0];
    assert_eq!(first.fine_status, FineStatus::Yes);
    assert_eq!(first.outcome, Outcome::Success);
    assert!(first.details.contains("=== FINE 2 ==="));
    assert_eq!(first.screenshot_path, Evidence::None);

    let second = &snap.results[1];
    assert_eq!(second.plate, "BBB222");
    assert_eq!(second.fine_status, FineStatus::Error);
    assert_eq!(second.outcome, Outcome::Error);
    assert!(second.details.contains("#txtBusqueda"));

    let third = &snap.results[2];
    assert_eq!(third.fine_status, FineStatus::No);
    assert!(third.details.is_empty());

    let report = snap.report_path.expect("report path set");
    assert!(report.exists());
    assert!(report.starts_with(dir.path().join("reports")));
    assert!(closed.load(Ordering::SeqCst), "session must be torn down");
}

#[tokio::test]
async fn screenshots_are_embedded_when_captured() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut driver = ScriptedDriver::new().page("DDD444", fines_table(&[fine_row()]));
    driver.write_screenshots = true;

    let progress = ProgressStore::new();
    progress.try_begin(1).unwrap();
    BatchRunner::new(&cfg, Box::new(driver), progress.clone())
        .run(plates(&["DDD444"]))
        .await;

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Completed, "message: {}", snap.message);
    let shot = snap.results[0]
        .screenshot_path
        .path()
        .expect("screenshot captured");
    assert!(shot.starts_with(dir.path().join("captures")));
    assert!(
        shot.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("DDD444_") && n.ends_with(".png"))
    );
}

#[tokio::test]
async fn session_failure_aborts_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut driver = ScriptedDriver::new();
    driver.fail_open = true;
    let closed = driver.closed.clone();

    let progress = ProgressStore::new();
    progress.try_begin(2).unwrap();
    BatchRunner::new(&cfg, Box::new(driver), progress.clone())
        .run(plates(&["AAA111", "BBB222"]))
        .await;

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Error);
    assert_eq!(snap.percent, 0.0);
    assert!(snap.message.starts_with("Error: "));
    assert!(snap.message.contains("no browser in test"));
    assert!(snap.results.is_empty());
    assert!(snap.report_path.is_none());
    assert!(closed.load(Ordering::SeqCst), "teardown runs on failure too");
}

#[tokio::test]
async fn report_failure_turns_into_job_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    // Reports land under a regular file, so the directory can't be created.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    cfg.paths.reports_dir = blocker.join("reports");

    let progress = ProgressStore::new();
    progress.try_begin(1).unwrap();
    BatchRunner::new(&cfg, Box::new(ScriptedDriver::new()), progress.clone())
        .run(plates(&["EEE555"]))
        .await;

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Error);
    assert!(snap.message.contains("writing report"));
    assert_eq!(snap.results.len(), 1);
}

#[tokio::test]
async fn undersized_report_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.report.min_bytes = u64::MAX;

    let progress = ProgressStore::new();
    progress.try_begin(1).unwrap();
    BatchRunner::new(&cfg, Box::new(ScriptedDriver::new()), progress.clone())
        .run(plates(&["FFF666"]))
        .await;

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Error);
    assert!(snap.message.contains("no usable file"));
}

#[tokio::test]
async fn screenshot_names_cannot_leave_the_captures_dir() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut driver = ScriptedDriver::new();
    driver.write_screenshots = true;

    let plates = parse_plates("../escaped/abc\n..\\up");
    let progress = ProgressStore::new();
    progress.try_begin(plates.len()).unwrap();
    BatchRunner::new(&cfg, Box::new(driver), progress.clone())
        .run(plates)
        .await;

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Completed, "message: {}", snap.message);
    assert_eq!(snap.results[0].plate, "../ESCAPED/ABC");
    for result in &snap.results {
        let shot = result.screenshot_path.path().expect("screenshot captured");
        assert_eq!(shot.parent(), Some(cfg.paths.screenshots_dir.as_path()));
        assert!(shot.exists());
    }
    assert!(!dir.path().join("ESCAPED").exists());
}

#[tokio::test]
async fn crashed_worker_leaves_store_in_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut driver = ScriptedDriver::new();
    driver.panic_on = Some("BOOM01".into());

    let progress = ProgressStore::new();
    progress.try_begin(2).unwrap();
    BatchRunner::new(&cfg, Box::new(driver), progress.clone())
        .spawn(plates(&["AAA111", "BOOM01"]))
        .await
        .unwrap();

    let snap = progress.snapshot();
    assert_eq!(snap.state, JobState::Error);
    assert!(snap.message.contains("batch worker aborted"));
    assert!(progress.try_begin(1).is_ok(), "a new job can start afterwards");
}
