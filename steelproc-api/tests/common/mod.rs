//! Shared helpers for steelproc integration tests
//!
//! All tests run against `MockGateway`; no server is needed.
#![cfg(test)]
#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use steelproc::prelude::*;

pub type TestResult<T = ()> = anyhow::Result<T>;

pub const SERVER: &str = "localhost,1433";
pub const USERNAME: &str = "sa";
pub const PASSWORD: &str = "Str0ng!Passw0rd";

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh scratch directory, unique per call.
pub fn scratch_dir(prefix: &str) -> TestResult<PathBuf> {
    let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("steelproc-{prefix}-{}-{n}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Writes a small fake backup file.
pub fn write_backup(dir: &Path, name: &str) -> TestResult<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, b"BACPAC test payload")?;
    Ok(path)
}

pub async fn logged_in(gateway: &MockGateway) -> TestResult<(Workflow<MockGateway>, AuthNext)> {
    let workflow = Workflow::new(gateway.clone(), WorkflowConfig::default());
    let next = workflow.authenticate(SERVER, USERNAME, PASSWORD).await?;
    Ok((workflow, next))
}

pub fn credentials() -> Credentials {
    Credentials::new(SERVER, USERNAME, PASSWORD).expect("valid test credentials")
}
