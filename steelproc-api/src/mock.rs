//! In-memory gateway for tests.
//!
//! Behaves like a small processing server: restore adds a database, delete
//! removes one, process produces a report name. Failures and delays can be
//! injected per operation, and every call is counted.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Url;

use crate::{
    Result,
    credentials::Credentials,
    download::resolve_download_url,
    error::SteelError,
    gateway::{DeleteResponse, Gateway, ProcessRequest, ProcessResponse, RestoreResponse},
    upload::BackupFile,
};

const MOCK_BASE_URL: &str = "http://mock.steelproc.local:8000";

#[derive(Debug, Default, Clone, Copy)]
struct Calls {
    health: usize,
    list: usize,
    restore: usize,
    process: usize,
    delete: usize,
    download: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Delays {
    list: Duration,
    restore: Duration,
    process: Duration,
    delete: Duration,
}

#[derive(Debug, Default)]
struct MockState {
    versions: Vec<String>,
    health_failure: Option<String>,
    list_failure: Option<String>,
    restore_failure: Option<String>,
    process_failure: Option<String>,
    delete_failure: Option<String>,
    restore_name: Option<String>,
    delays: Delays,
    calls: Calls,
}

/// Shared handle; clones see the same server state.
#[derive(Debug, Clone)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn remote(operation: &str, message: &str) -> SteelError {
    SteelError::Remote {
        operation: operation.to_string(),
        message: message.to_string(),
        status: Some(500),
        raw_detail: Some(format!(r#"{{"detail":{message:?}}}"#)),
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl MockGateway {
    /// Server with no databases.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn with_versions<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gateway = Self::new();
        gateway.set_versions(versions);
        gateway
    }

    pub fn set_versions<I, S>(&self, versions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().versions = versions.into_iter().map(Into::into).collect();
    }

    pub fn versions(&self) -> Vec<String> {
        self.state.lock().versions.clone()
    }

    /// Every health check fails with `message` until cleared.
    pub fn fail_health(&self, message: impl Into<String>) {
        self.state.lock().health_failure = Some(message.into());
    }

    pub fn clear_health_failure(&self) {
        self.state.lock().health_failure = None;
    }

    pub fn fail_next_list(&self, message: impl Into<String>) {
        self.state.lock().list_failure = Some(message.into());
    }

    pub fn fail_next_restore(&self, message: impl Into<String>) {
        self.state.lock().restore_failure = Some(message.into());
    }

    pub fn fail_next_process(&self, message: impl Into<String>) {
        self.state.lock().process_failure = Some(message.into());
    }

    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.state.lock().delete_failure = Some(message.into());
    }

    /// Name the next restore reports. Defaults to the backup file stem.
    pub fn set_restore_name(&self, name: impl Into<String>) {
        self.state.lock().restore_name = Some(name.into());
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().delays.list = delay;
    }

    pub fn set_restore_delay(&self, delay: Duration) {
        self.state.lock().delays.restore = delay;
    }

    pub fn set_process_delay(&self, delay: Duration) {
        self.state.lock().delays.process = delay;
    }

    pub fn set_delete_delay(&self, delay: Duration) {
        self.state.lock().delays.delete = delay;
    }

    pub fn health_calls(&self) -> usize {
        self.state.lock().calls.health
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().calls.list
    }

    pub fn restore_calls(&self) -> usize {
        self.state.lock().calls.restore
    }

    pub fn process_calls(&self) -> usize {
        self.state.lock().calls.process
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().calls.delete
    }

    pub fn download_calls(&self) -> usize {
        self.state.lock().calls.download
    }
}

impl Gateway for MockGateway {
    async fn health_check(&self, _creds: &Credentials) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.health += 1;
        match &state.health_failure {
            Some(msg) => Err(remote("health_check", msg)),
            None => Ok(()),
        }
    }

    async fn list_versions(&self, _creds: &Credentials) -> Result<Vec<String>> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.list += 1;
            state.delays.list
        };
        pause(delay).await;
        let mut state = self.state.lock();
        match state.list_failure.take() {
            Some(msg) => Err(remote("list_versions", &msg)),
            None => Ok(state.versions.clone()),
        }
    }

    async fn restore(&self, _creds: &Credentials, file: &BackupFile) -> Result<RestoreResponse> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.restore += 1;
            state.delays.restore
        };
        pause(delay).await;
        let mut state = self.state.lock();
        if let Some(msg) = state.restore_failure.take() {
            return Err(remote("restore", &msg));
        }
        let name = state.restore_name.take().unwrap_or_else(|| {
            file.name
                .strip_suffix(".bacpac")
                .unwrap_or(&file.name)
                .to_string()
        });
        if !state.versions.contains(&name) {
            state.versions.push(name.clone());
        }
        Ok(RestoreResponse {
            db_name: Some(name),
            message: Some("Database restored successfully".to_string()),
        })
    }

    async fn process(
        &self,
        _creds: &Credentials,
        request: &ProcessRequest,
    ) -> Result<ProcessResponse> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.process += 1;
            state.delays.process
        };
        pause(delay).await;
        let mut state = self.state.lock();
        if let Some(msg) = state.process_failure.take() {
            return Err(remote("process", &msg));
        }
        if !state.versions.contains(&request.db_name) {
            return Err(remote(
                "process",
                &format!("Database '{}' not found", request.db_name),
            ));
        }
        let file_name = format!(
            "{}_Location{}_report.xlsx",
            request.db_name,
            request.location.code()
        );
        Ok(ProcessResponse {
            download_url: format!("/download/{file_name}"),
            file_name,
        })
    }

    async fn delete_version(&self, _creds: &Credentials, name: &str) -> Result<DeleteResponse> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.delete += 1;
            state.delays.delete
        };
        pause(delay).await;
        let mut state = self.state.lock();
        if let Some(msg) = state.delete_failure.take() {
            return Err(remote("delete", &msg));
        }
        let before = state.versions.len();
        state.versions.retain(|v| v != name);
        if state.versions.len() == before {
            return Err(remote("delete", &format!("Database '{name}' not found")));
        }
        Ok(DeleteResponse {
            message: Some(format!("Database {name} deleted")),
        })
    }

    fn resolve_download_url(&self, file: &str) -> Result<String> {
        let base = Url::parse(MOCK_BASE_URL).map_err(|e| SteelError::Config {
            message: format!("mock base url: {e}"),
        })?;
        resolve_download_url(&base, file)
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        self.state.lock().calls.download += 1;
        Ok(Bytes::from(format!("report contents from {url}")))
    }
}
