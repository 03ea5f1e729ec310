//! Version management stage
//!
//! Holds the list of databases known to the server and the operator's
//! selection, runs processing jobs and guards deletions behind an explicit
//! confirmation step.
//!
//! # Methods
//!
//! - [refresh](VersionManager::refresh) - reload versions from the server
//! - [select](VersionManager::select) - choose a version
//! - [generate_report](VersionManager::generate_report) - process the selected version for a location
//! - [request_deletion](VersionManager::request_deletion), [confirm_deletion](VersionManager::confirm_deletion), [cancel_deletion](VersionManager::cancel_deletion)
//! - [download_url](VersionManager::download_url), [download](VersionManager::download) - fetch the last report
//! - [snapshot](VersionManager::snapshot), [take_notices](VersionManager::take_notices) - state for display
//!
//! Only one processing job or deletion runs at a time. A second request while
//! one is in flight fails with `Precondition` and makes no network call.
//!
//! After every change `selected` is either unset or one of `versions`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use snafu::prelude::*;
use tracing::{debug, error, info, warn};

use crate::{
    REFERENCE_DATABASE, Result,
    credentials::Credentials,
    download::local_file_name,
    error::{IoSnafu, precondition, validation},
    gateway::{Gateway, ProcessRequest},
    validation::Location,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    InFlight,
    Completed,
    Failed,
}

/// Generated report location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportResult {
    pub download_url: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingJob {
    pub id: u64,
    pub source_version: String,
    pub reference_version: String,
    pub location: Location,
    pub status: JobStatus,
    pub result: Option<ReportResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeletionStatus {
    /// Staged, waiting for confirmation
    Pending,
    /// Confirmed, delete call in flight
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionRequest {
    pub target_version: String,
    pub status: DeletionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Read-only copy of the manager state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSnapshot {
    pub versions: Vec<String>,
    pub selected: Option<String>,
    pub job: Option<ProcessingJob>,
    pub deletion: Option<DeletionRequest>,
}

#[derive(Debug, Default)]
struct VersionState {
    versions: Vec<String>,
    selected: Option<String>,
    job: Option<ProcessingJob>,
    deletion: Option<DeletionRequest>,
    notices: Vec<Notice>,
    refresh_seq: u64,
    next_job_id: u64,
    discarded: bool,
}

impl VersionState {
    fn job_in_flight(&self) -> bool {
        matches!(&self.job, Some(job) if job.status == JobStatus::InFlight)
    }

    fn deletion_in_flight(&self) -> bool {
        matches!(&self.deletion, Some(d) if d.status == DeletionStatus::InFlight)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.discarded {
            return Err(precondition("Version management is no longer active"));
        }
        Ok(())
    }

    /// Keeps `selected` inside `versions`.
    fn check_selection(&mut self) {
        if let Some(sel) = &self.selected
            && !self.versions.contains(sel)
        {
            warn!(selected = %sel, "selection no longer listed, clearing");
            self.selected = None;
        }
    }

    fn completed_result(&self) -> Result<ReportResult> {
        match &self.job {
            Some(ProcessingJob {
                status: JobStatus::Completed,
                result: Some(result),
                ..
            }) => Ok(result.clone()),
            _ => Err(precondition("No report available. Generate a report first.")),
        }
    }
}

/// Operation started by the manager that is waiting on the server.
enum Pending {
    Job(u64),
    Deletion(String),
}

/// Settles a job or deletion whose future is dropped before the server answers.
struct AbandonGuard<'a> {
    state: &'a Mutex<VersionState>,
    pending: Pending,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        match &self.pending {
            Pending::Job(id) => {
                if let Some(job) = state
                    .job
                    .as_mut()
                    .filter(|job| job.id == *id && job.status == JobStatus::InFlight)
                {
                    warn!(job = id, "processing abandoned while in flight");
                    job.status = JobStatus::Failed;
                    job.error = Some("cancelled".to_string());
                }
            }
            Pending::Deletion(target) => {
                let abandoned = matches!(
                    &state.deletion,
                    Some(d) if d.target_version == *target && d.status == DeletionStatus::InFlight
                );
                if abandoned {
                    warn!(db = %target, "deletion abandoned while in flight");
                    state.deletion = None;
                }
            }
        }
    }
}

/// Version list, selection, processing jobs and deletions for one session.
#[derive(Debug)]
pub struct VersionManager<G: Gateway> {
    gateway: Arc<G>,
    credentials: Credentials,
    reference_db: String,
    state: Mutex<VersionState>,
}

impl<G: Gateway> VersionManager<G> {
    pub fn new(gateway: Arc<G>, credentials: Credentials) -> Self {
        Self::with_reference(gateway, credentials, REFERENCE_DATABASE)
    }

    /// Creates a manager that processes against a different reference dataset.
    pub fn with_reference(
        gateway: Arc<G>,
        credentials: Credentials,
        reference_db: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            reference_db: reference_db.into(),
            state: Mutex::new(VersionState::default()),
        }
    }

    /// Reloads the version list.
    ///
    /// Replaces the list in server order. If the current selection is unset or
    /// gone, the first version is selected. A pending deletion whose target is
    /// gone is dropped. An in-flight job is left alone. When refreshes overlap
    /// only the most recently started one is applied; the others return the
    /// current list.
    pub async fn refresh(&self) -> Result<Vec<String>> {
        let seq = {
            let mut state = self.state.lock();
            state.ensure_active()?;
            state.refresh_seq += 1;
            state.refresh_seq
        };
        let result = self.gateway.list_versions(&self.credentials).await;

        let mut state = self.state.lock();
        state.ensure_active()?;
        if state.refresh_seq != seq {
            debug!(seq, latest = state.refresh_seq, "superseded refresh ignored");
            return result.map(|_| state.versions.clone());
        }
        let versions = result.inspect_err(|e| error!(error = %e, "refresh failed"))?;
        state.versions = versions;
        let keep = matches!(&state.selected, Some(sel) if state.versions.contains(sel));
        if !keep {
            state.selected = state.versions.first().cloned();
        }
        state.check_selection();
        let stale = matches!(
            &state.deletion,
            Some(d) if d.status == DeletionStatus::Pending && !state.versions.contains(&d.target_version)
        );
        if stale {
            warn!("pending deletion target no longer listed, dropping request");
            state.deletion = None;
        }
        debug!(count = state.versions.len(), selected = ?state.selected, "versions refreshed");
        Ok(state.versions.clone())
    }

    /// Selects a listed version.
    pub fn select(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_active()?;
        if !state.versions.iter().any(|v| v == name) {
            return Err(validation(format!("Unknown database version '{name}'")));
        }
        state.selected = Some(name.to_string());
        Ok(())
    }

    /// Processes the selected version for `location`.
    ///
    /// The previous result is cleared when the job starts. On failure the job
    /// is marked failed and carries the reason, with no result.
    pub async fn generate_report(&self, location: Location) -> Result<ReportResult> {
        let (request, job_id) = {
            let mut state = self.state.lock();
            state.ensure_active()?;
            let Some(source) = state.selected.clone() else {
                return Err(validation("Please select a database version"));
            };
            if state.job_in_flight() {
                return Err(precondition("A report is already being generated"));
            }
            if state.deletion_in_flight() {
                return Err(precondition("A database deletion is in progress"));
            }
            state.next_job_id += 1;
            let id = state.next_job_id;
            state.job = Some(ProcessingJob {
                id,
                source_version: source.clone(),
                reference_version: self.reference_db.clone(),
                location,
                status: JobStatus::InFlight,
                result: None,
                error: None,
            });
            let request = ProcessRequest {
                db_name: source,
                reference_db: self.reference_db.clone(),
                location,
            };
            (request, id)
        };
        info!(db = %request.db_name, %location, job = job_id, "processing started");
        let mut abandon = AbandonGuard {
            state: &self.state,
            pending: Pending::Job(job_id),
            armed: true,
        };

        let result = self.gateway.process(&self.credentials, &request).await;
        abandon.armed = false;

        let mut guard = self.state.lock();
        guard.ensure_active()?;
        let state = &mut *guard;
        let Some(job) = state.job.as_mut().filter(|job| job.id == job_id) else {
            warn!(job = job_id, "ignoring result for discarded job");
            return Err(precondition("Processing job was discarded"));
        };
        match result {
            Ok(resp) => {
                let report = ReportResult {
                    download_url: resp.download_url,
                    file_name: resp.file_name,
                };
                job.status = JobStatus::Completed;
                job.result = Some(report.clone());
                info!(job = job_id, file = %report.file_name, "processing completed");
                state.notices.push(Notice::success(format!(
                    "Successfully processed database for Location {location}"
                )));
                Ok(report)
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
                error!(job = job_id, error = %e, "processing failed");
                state.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Stages a deletion. Nothing is sent until [`confirm_deletion`](Self::confirm_deletion).
    pub fn request_deletion(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_active()?;
        if !state.versions.iter().any(|v| v == name) {
            return Err(validation(format!("Unknown database version '{name}'")));
        }
        if state.job_in_flight() {
            return Err(precondition("Cannot delete while a report is being generated"));
        }
        if state.deletion_in_flight() {
            return Err(precondition("A database deletion is in progress"));
        }
        state.deletion = Some(DeletionRequest {
            target_version: name.to_string(),
            status: DeletionStatus::Pending,
        });
        debug!(db = name, "deletion requested");
        Ok(())
    }

    /// Deletes the staged version on the server.
    ///
    /// On success the name is removed, the selection is cleared if it was the
    /// deleted version, and a job result for that version is dropped. On
    /// failure the list is left unchanged.
    pub async fn confirm_deletion(&self) -> Result<String> {
        let target = {
            let mut state = self.state.lock();
            state.ensure_active()?;
            if state.job_in_flight() {
                return Err(precondition("Cannot delete while a report is being generated"));
            }
            let Some(deletion) = state.deletion.as_mut() else {
                return Err(precondition("No deletion pending confirmation"));
            };
            if deletion.status == DeletionStatus::InFlight {
                return Err(precondition("A database deletion is in progress"));
            }
            deletion.status = DeletionStatus::InFlight;
            deletion.target_version.clone()
        };
        info!(db = %target, "deleting database");
        let mut abandon = AbandonGuard {
            state: &self.state,
            pending: Pending::Deletion(target.clone()),
            armed: true,
        };

        let result = self.gateway.delete_version(&self.credentials, &target).await;
        abandon.armed = false;

        let mut state = self.state.lock();
        state.ensure_active()?;
        state.deletion = None;
        match result {
            Ok(ack) => {
                state.versions.retain(|v| v != &target);
                let was_selected = state.selected.as_deref() == Some(target.as_str());
                if was_selected {
                    state.selected = None;
                }
                let tied = matches!(&state.job, Some(job) if job.source_version == target);
                if was_selected || tied {
                    state.job = None;
                }
                state.check_selection();
                if let Some(msg) = ack.message {
                    debug!(db = %target, server_message = %msg, "delete acknowledged");
                }
                state.notices.push(Notice::success(format!(
                    "Database \"{target}\" deleted successfully"
                )));
                Ok(target)
            }
            Err(e) => {
                error!(db = %target, error = %e, "delete failed");
                state.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Discards a pending deletion.
    pub fn cancel_deletion(&self) -> Result<()> {
        let mut state = self.state.lock();
        match &state.deletion {
            None => Err(precondition("No deletion pending confirmation")),
            Some(d) if d.status == DeletionStatus::InFlight => {
                Err(precondition("Deletion already in progress"))
            }
            Some(_) => {
                state.deletion = None;
                Ok(())
            }
        }
    }

    /// Absolute url of the last completed report.
    pub fn download_url(&self) -> Result<String> {
        let result = self.state.lock().completed_result()?;
        self.gateway.resolve_download_url(&result.file_name)
    }

    /// Fetches the last completed report into `dest_dir`, named after the
    /// report file. Returns the written path.
    pub async fn download(&self, dest_dir: &Path) -> Result<PathBuf> {
        let result = self.state.lock().completed_result()?;
        let url = self.gateway.resolve_download_url(&result.file_name)?;
        let name = local_file_name(&result.file_name)
            .ok_or_else(|| validation(format!("invalid report name '{}'", result.file_name)))?;
        let path = dest_dir.join(name);

        debug!(%url, "downloading report");
        let data = self.gateway.download(&url).await?;
        tokio::fs::write(&path, &data)
            .await
            .context(IoSnafu { path: &path })?;
        info!(path = %path.display(), size = data.len(), "report saved");
        Ok(path)
    }

    pub fn versions(&self) -> Vec<String> {
        self.state.lock().versions.clone()
    }

    pub fn selected(&self) -> Option<String> {
        self.state.lock().selected.clone()
    }

    pub fn job(&self) -> Option<ProcessingJob> {
        self.state.lock().job.clone()
    }

    pub fn deletion(&self) -> Option<DeletionRequest> {
        self.state.lock().deletion.clone()
    }

    pub fn snapshot(&self) -> VersionSnapshot {
        let state = self.state.lock();
        VersionSnapshot {
            versions: state.versions.clone(),
            selected: state.selected.clone(),
            job: state.job.clone(),
            deletion: state.deletion.clone(),
        }
    }

    /// Returns and clears accumulated notices, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state.lock().notices)
    }

    pub(crate) fn push_error_notice(&self, message: impl Into<String>) {
        self.state.lock().notices.push(Notice::error(message));
    }

    /// Abandons the manager. Results that arrive later are ignored.
    pub(crate) fn discard(&self) {
        let mut state = self.state.lock();
        state.discarded = true;
        state.deletion = None;
        debug!("version manager discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SteelError, mock::MockGateway};
    use std::time::Duration;
    use tokio::time::sleep;

    fn manager(gateway: &MockGateway) -> VersionManager<MockGateway> {
        let creds = Credentials::new("localhost,1433", "sa", "pw").unwrap();
        VersionManager::new(Arc::new(gateway.clone()), creds)
    }

    #[test_log::test(tokio::test)]
    async fn test_select_requires_listed_version() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        vm.select("B").unwrap();
        assert_eq!(vm.selected().as_deref(), Some("B"));
        assert!(matches!(vm.select("Z"), Err(SteelError::Validation { .. })));
        assert_eq!(vm.selected().as_deref(), Some("B"));
    }

    #[test_log::test(tokio::test)]
    async fn test_generate_report_without_selection() {
        let gateway = MockGateway::new();
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        let err = vm.generate_report(Location::L250).await.unwrap_err();
        assert!(matches!(err, SteelError::Validation { .. }));
        assert_eq!(gateway.process_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_report_success_and_notice() {
        let gateway = MockGateway::with_versions(["A"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        let report = vm.generate_report(Location::L255).await.unwrap();
        assert!(report.file_name.ends_with(".xlsx"));
        let job = vm.job().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.reference_version, "MasterDataDB");
        assert_eq!(job.location, Location::L255);
        assert_eq!(
            vm.take_notices(),
            vec![Notice::success("Successfully processed database for Location 255")]
        );
        assert!(vm.take_notices().is_empty());
        assert!(vm.download_url().unwrap().contains("/download/"));
    }

    #[test_log::test(tokio::test)]
    async fn test_report_failure_leaves_no_result() {
        let gateway = MockGateway::with_versions(["A"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        vm.generate_report(Location::L250).await.unwrap();

        gateway.fail_next_process("Reference database MasterDataDB not found");
        let err = vm.generate_report(Location::L250).await.unwrap_err();
        assert_eq!(err.to_string(), "Reference database MasterDataDB not found");
        let job = vm.job().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result, None);
        assert!(matches!(vm.download_url(), Err(SteelError::Precondition { .. })));
    }

    #[test_log::test(tokio::test)]
    async fn test_download_requires_result() {
        let gateway = MockGateway::with_versions(["A"]);
        let vm = manager(&gateway);
        let err = vm.download(Path::new(".")).await.unwrap_err();
        assert!(matches!(err, SteelError::Precondition { .. }));
        assert_eq!(gateway.download_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_download_writes_report() {
        let gateway = MockGateway::with_versions(["A"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        let report = vm.generate_report(Location::L250).await.unwrap();

        let dir = std::env::temp_dir().join(format!("steelproc-dl-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = vm.download(&dir).await.unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), report.file_name);
        let bytes = tokio::fs::read(&path).await.unwrap();
        assert!(!bytes.is_empty());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_deletion_gate() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();

        assert!(matches!(vm.confirm_deletion().await, Err(SteelError::Precondition { .. })));
        assert!(matches!(vm.request_deletion("Z"), Err(SteelError::Validation { .. })));

        vm.request_deletion("B").unwrap();
        assert_eq!(gateway.delete_calls(), 0);
        vm.cancel_deletion().unwrap();
        assert_eq!(vm.deletion(), None);
        assert_eq!(gateway.delete_calls(), 0);
        assert!(matches!(vm.cancel_deletion(), Err(SteelError::Precondition { .. })));
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_failure_keeps_list() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        gateway.fail_next_delete("Cannot drop database \"B\" because it is currently in use.");
        vm.request_deletion("B").unwrap();
        let err = vm.confirm_deletion().await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(vm.versions(), vec!["A", "B"]);
        assert_eq!(vm.deletion(), None);
        let notices = vm.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_overlapping_refresh_latest_wins() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        gateway.set_list_delay(Duration::from_millis(500));
        let vm = manager(&gateway);

        let (first, second) = tokio::join!(vm.refresh(), async {
            sleep(Duration::from_millis(100)).await;
            gateway.set_versions(["C"]);
            gateway.set_list_delay(Duration::ZERO);
            vm.refresh().await
        });
        assert_eq!(second.unwrap(), vec!["C"]);
        // the first call resolved later but was superseded
        assert_eq!(first.unwrap(), vec!["C"]);
        assert_eq!(vm.versions(), vec!["C"]);
        assert_eq!(vm.selected().as_deref(), Some("C"));
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_discard_ignores_late_result() {
        let gateway = MockGateway::with_versions(["A"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        gateway.set_process_delay(Duration::from_secs(2));

        let (res, ()) = tokio::join!(vm.generate_report(Location::L250), async {
            sleep(Duration::from_millis(500)).await;
            vm.discard();
        });
        assert!(matches!(res, Err(SteelError::Precondition { .. })));
        assert!(vm.take_notices().is_empty());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_dropped_report_releases_manager() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        gateway.set_process_delay(Duration::from_secs(60));

        let res =
            tokio::time::timeout(Duration::from_secs(1), vm.generate_report(Location::L250)).await;
        assert!(res.is_err());
        let job = vm.job().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("cancelled"));

        gateway.set_process_delay(Duration::ZERO);
        vm.request_deletion("B").unwrap();
        vm.cancel_deletion().unwrap();
        vm.generate_report(Location::L255).await.unwrap();
        assert_eq!(vm.job().map(|j| j.status), Some(JobStatus::Completed));
        assert_eq!(gateway.process_calls(), 2);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_dropped_deletion_releases_manager() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        gateway.set_delete_delay(Duration::from_secs(60));
        vm.request_deletion("B").unwrap();

        let res = tokio::time::timeout(Duration::from_secs(1), vm.confirm_deletion()).await;
        assert!(res.is_err());
        assert_eq!(vm.deletion(), None);
        assert!(matches!(vm.cancel_deletion(), Err(SteelError::Precondition { .. })));

        vm.generate_report(Location::L250).await.unwrap();
        vm.request_deletion("B").unwrap();
        assert_eq!(vm.deletion().map(|d| d.status), Some(DeletionStatus::Pending));
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_drops_pending_deletion_of_missing_version() {
        let gateway = MockGateway::with_versions(["A", "B"]);
        let vm = manager(&gateway);
        vm.refresh().await.unwrap();
        vm.request_deletion("B").unwrap();

        gateway.set_versions(["A"]);
        vm.refresh().await.unwrap();
        assert_eq!(vm.deletion(), None);
        assert!(matches!(vm.confirm_deletion().await, Err(SteelError::Precondition { .. })));
        assert_eq!(gateway.delete_calls(), 0);

        // a target that is still listed stays staged
        vm.request_deletion("A").unwrap();
        vm.refresh().await.unwrap();
        assert_eq!(vm.deletion().map(|d| d.target_version), Some("A".to_string()));
    }
}
