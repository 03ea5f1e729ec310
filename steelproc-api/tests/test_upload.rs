//! Upload controller integration tests
//!
//! Simulated progress is checked on a paused tokio clock, so the timing
//! assertions are exact and the tests run instantly.
//!
//! ```bash
//! cargo test -p steelproc --test test_upload
//! ```

mod common;

use std::{sync::Arc, time::Duration};

use common::*;
use steelproc::prelude::*;
use tokio::{sync::watch, time::sleep};

fn controller(gateway: &MockGateway) -> UploadController<MockGateway> {
    UploadController::new(Arc::new(gateway.clone()), credentials())
}

/// Collects every progress value published until `stop` is seen.
fn collect_until(mut rx: watch::Receiver<u8>, stop: u8) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value == stop {
                break;
            }
        }
        seen
    })
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_progress_capped_until_restore_resolves() -> TestResult {
    let gateway = MockGateway::new();
    gateway.set_restore_delay(Duration::from_secs(10));
    let uploader = controller(&gateway);
    uploader.select_file(BackupFile::new("/b/big.bacpac", "big.bacpac", 1 << 20))?;

    let collector = collect_until(uploader.subscribe_progress(), 100);
    let (outcome, ()) = tokio::join!(uploader.upload(), async {
        sleep(Duration::from_millis(9_900)).await;
        // well past the point where the ticker would have passed 90
        assert_eq!(uploader.progress(), 90);
        assert_eq!(uploader.status(), UploadStatus::InFlight);
    });
    outcome?;

    let seen = collector.await?;
    let (last, before) = seen.split_last().expect("progress published");
    assert_eq!(*last, 100);
    assert!(before.iter().all(|v| *v <= 90), "{seen:?}");
    assert!(before.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(before.contains(&90));
    assert_eq!(uploader.status(), UploadStatus::Succeeded);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_failure_resets_and_stops_ticker() -> TestResult {
    let gateway = MockGateway::new();
    gateway.set_restore_delay(Duration::from_millis(2_200));
    gateway.fail_next_restore("The backup file is corrupt");
    let uploader = controller(&gateway);
    uploader.select_file(BackupFile::new("/b/bad.bacpac", "bad.bacpac", 10))?;

    let mut rx = uploader.subscribe_progress();
    let err = uploader.upload().await.expect_err("restore fails");
    assert_eq!(err.to_string(), "The backup file is corrupt");
    assert_eq!(err.raw_detail(), Some(r#"{"detail":"The backup file is corrupt"}"#));
    assert_eq!(uploader.progress(), 0);
    assert_eq!(uploader.status(), UploadStatus::Failed);

    let _ = rx.borrow_and_update();
    sleep(Duration::from_secs(30)).await;
    assert!(!rx.has_changed()?, "no ticks after failure");
    assert_eq!(uploader.progress(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_skip_without_restore() -> TestResult {
    let gateway = MockGateway::new();
    let uploader = controller(&gateway);
    assert_eq!(uploader.skip()?, StageTransition::ToVersionManagement);
    assert_eq!(gateway.restore_calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_select_path_validates_name_and_size() -> TestResult {
    let dir = scratch_dir("select")?;
    let uploader = controller(&MockGateway::new());

    let good = write_backup(&dir, "prod.bacpac")?;
    let selection = uploader.select_path(&good).await?;
    assert_eq!(selection.file_name, "prod.bacpac");
    assert_eq!(selection.size, 19);

    let bad = write_backup(&dir, "prod.bak")?;
    let err = uploader.select_path(&bad).await.expect_err("wrong extension");
    assert!(matches!(err, SteelError::Validation { .. }));
    assert_eq!(uploader.file().map(|f| f.name), Some("prod.bacpac".to_string()));
    assert_eq!(uploader.status(), UploadStatus::Idle);

    let err = uploader.select_path(&dir).await.expect_err("directory");
    assert!(matches!(err, SteelError::Validation { .. }));

    std::fs::remove_dir_all(dir)?;
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_custom_progress_config() -> TestResult {
    let gateway = MockGateway::new();
    gateway.set_restore_delay(Duration::from_secs(2));
    let config = ProgressConfig {
        step: 25,
        interval: Duration::from_millis(200),
        cap: 80,
    };
    let uploader = UploadController::with_progress(Arc::new(gateway), credentials(), config);
    uploader.select_file(BackupFile::new("/b/a.bacpac", "a.bacpac", 10))?;

    let (outcome, ()) = tokio::join!(uploader.upload(), async {
        sleep(Duration::from_millis(500)).await;
        assert_eq!(uploader.progress(), 50);
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(uploader.progress(), 80);
    });
    outcome?;
    assert_eq!(uploader.progress(), 100);
    Ok(())
}
