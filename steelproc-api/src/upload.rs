//! Upload stage: select a backup file and restore it on the server
//!
//! # Usage
//!
//! ```rust,no_run
//! use steelproc::prelude::*;
//! # async fn example(workflow: &Workflow<GatewayClient>) -> Result<(), SteelError> {
//! let uploader = workflow.upload_controller()?;
//! let selection = uploader.select_path("/backups/steel_2025_01.bacpac").await?;
//! if let Some(advisory) = &selection.advisory {
//!     eprintln!("{advisory}");
//! }
//! let mut progress = uploader.subscribe_progress();
//! tokio::spawn(async move {
//!     while progress.changed().await.is_ok() {
//!         eprintln!("{}%", *progress.borrow());
//!     }
//! });
//! workflow.upload().await?;
//! # Ok(())
//! # }
//! ```
//!
//! While the restore is in flight a simulated progress value climbs from 0 to
//! at most 90. It jumps to 100 when the server answers, or back to 0 on failure.
//! Dropping the `upload()` future stops the progress task and returns the
//! controller to `Idle`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use snafu::prelude::*;
use tokio::{sync::watch, task::AbortHandle};
use tracing::{debug, error, info, warn};

pub use crate::progress::ProgressConfig;
use crate::{
    Result,
    credentials::Credentials,
    error::{IoSnafu, precondition, validation},
    gateway::Gateway,
    progress::ProgressTicker,
    validation::{large_file_advisory, validate_backup_name},
    workflow::StageTransition,
};

/// A local backup file chosen for restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFile {
    pub path: PathBuf,
    /// File name as sent to the server
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

impl BackupFile {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
        }
    }

    /// Stats a local path. Fails if it does not exist or is not a regular file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .context(IoSnafu { path })?;
        if !meta.is_file() {
            return Err(validation(format!("{} is not a file", path.display())));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(path, name, meta.len()))
    }
}

/// Accepted file selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSelection {
    pub file_name: String,
    pub size: u64,
    /// File exceeds the large-file threshold. Selection is still accepted.
    pub oversized: bool,
    pub advisory: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Validating,
    InFlight,
    Succeeded,
    Failed,
}

/// Successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Database the server created, when it reported one
    pub db_name: Option<String>,
    pub transition: StageTransition,
}

#[derive(Debug)]
struct UploadState {
    file: Option<BackupFile>,
    selection: Option<FileSelection>,
    status: UploadStatus,
    error: Option<String>,
    /// bumped on every upload start, clear and discard
    seq: u64,
    ticker: Option<AbortHandle>,
    discarded: bool,
}

/// Drives one backup restore at a time.
#[derive(Debug)]
pub struct UploadController<G: Gateway> {
    gateway: Arc<G>,
    credentials: Credentials,
    progress_config: ProgressConfig,
    progress: Arc<watch::Sender<u8>>,
    state: Mutex<UploadState>,
}

/// Returns the controller to Idle if the upload future is dropped mid-flight.
struct InFlightGuard<'a> {
    state: &'a Mutex<UploadState>,
    progress: &'a watch::Sender<u8>,
    seq: u64,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        if state.seq == self.seq && state.status == UploadStatus::InFlight {
            warn!("upload dropped while in flight");
            state.status = UploadStatus::Idle;
            state.ticker = None;
            self.progress.send_replace(0);
        }
    }
}

impl<G: Gateway> UploadController<G> {
    pub fn new(gateway: Arc<G>, credentials: Credentials) -> Self {
        Self::with_progress(gateway, credentials, ProgressConfig::default())
    }

    pub fn with_progress(
        gateway: Arc<G>,
        credentials: Credentials,
        progress_config: ProgressConfig,
    ) -> Self {
        let (tx, _rx) = watch::channel(0u8);
        Self {
            gateway,
            credentials,
            progress_config,
            progress: Arc::new(tx),
            state: Mutex::new(UploadState {
                file: None,
                selection: None,
                status: UploadStatus::Idle,
                error: None,
                seq: 0,
                ticker: None,
                discarded: false,
            }),
        }
    }

    /// Validates and holds a candidate file.
    ///
    /// Only names ending in `.bacpac` are accepted. On rejection the
    /// previously held file is kept.
    pub fn select_file(&self, candidate: BackupFile) -> Result<FileSelection> {
        let mut state = self.state.lock();
        ensure_active(&state)?;
        if state.status == UploadStatus::InFlight {
            return Err(precondition("Cannot change the file while an upload is in progress"));
        }
        validate_backup_name(&candidate.name)?;
        let advisory = large_file_advisory(candidate.size);
        if let Some(msg) = &advisory {
            warn!(file = %candidate.name, size = candidate.size, "{msg}");
        }
        let selection = FileSelection {
            file_name: candidate.name.clone(),
            size: candidate.size,
            oversized: advisory.is_some(),
            advisory,
        };
        debug!(file = %candidate.name, size = candidate.size, "file selected");
        state.file = Some(candidate);
        state.selection = Some(selection.clone());
        state.status = UploadStatus::Idle;
        state.error = None;
        self.progress.send_replace(0);
        Ok(selection)
    }

    /// Stats a local path, then applies [`select_file`](Self::select_file).
    pub async fn select_path(&self, path: impl AsRef<Path>) -> Result<FileSelection> {
        let previous = {
            let mut state = self.state.lock();
            ensure_active(&state)?;
            if matches!(
                state.status,
                UploadStatus::InFlight | UploadStatus::Validating
            ) {
                return Err(precondition("Cannot change the file while an upload is in progress"));
            }
            std::mem::replace(&mut state.status, UploadStatus::Validating)
        };
        let result = match BackupFile::from_path(path).await {
            Ok(file) => self.select_file(file),
            Err(e) => Err(e),
        };
        if result.is_err() {
            let mut state = self.state.lock();
            if state.status == UploadStatus::Validating {
                state.status = previous;
            }
        }
        result
    }

    /// Restores the held file on the server.
    ///
    /// Returns [`StageTransition::ToVersionManagement`] on success.
    pub async fn upload(&self) -> Result<UploadOutcome> {
        let (file, seq) = {
            let mut state = self.state.lock();
            ensure_active(&state)?;
            match state.status {
                UploadStatus::InFlight => {
                    return Err(precondition("An upload is already in progress"));
                }
                UploadStatus::Validating => {
                    return Err(precondition("File validation in progress"));
                }
                _ => {}
            }
            let Some(file) = state.file.clone() else {
                return Err(validation("Please select a .bacpac file to upload"));
            };
            state.seq += 1;
            state.status = UploadStatus::InFlight;
            state.error = None;
            (file, state.seq)
        };

        let ticker = ProgressTicker::start(self.progress.clone(), self.progress_config);
        {
            let mut state = self.state.lock();
            if state.seq == seq {
                state.ticker = ticker.abort_handle();
            }
        }
        let mut guard = InFlightGuard {
            state: &self.state,
            progress: &self.progress,
            seq,
            armed: true,
        };
        info!(file = %file.name, size = file.size, "restore started");

        let result = self.gateway.restore(&self.credentials, &file).await;
        ticker.stop().await;
        guard.armed = false;

        let mut state = self.state.lock();
        if state.seq != seq || state.discarded {
            warn!(file = %file.name, "ignoring restore result for abandoned upload");
            return Err(precondition("Upload was cancelled"));
        }
        state.ticker = None;
        match result {
            Ok(resp) => {
                state.status = UploadStatus::Succeeded;
                self.progress.send_replace(100);
                info!(file = %file.name, db = ?resp.db_name, "restore succeeded");
                Ok(UploadOutcome {
                    db_name: resp.db_name,
                    transition: StageTransition::ToVersionManagement,
                })
            }
            Err(e) => {
                state.status = UploadStatus::Failed;
                state.error = Some(e.to_string());
                self.progress.send_replace(0);
                error!(file = %file.name, error = %e, "restore failed");
                Err(e)
            }
        }
    }

    /// Leaves the upload stage without restoring anything.
    pub fn skip(&self) -> Result<StageTransition> {
        let state = self.state.lock();
        ensure_active(&state)?;
        if state.status == UploadStatus::InFlight {
            return Err(precondition("Cannot skip while an upload is in progress"));
        }
        Ok(StageTransition::ToVersionManagement)
    }

    /// Confirms a successful upload and resets the task.
    pub fn acknowledge(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status != UploadStatus::Succeeded {
            return Err(precondition("No completed upload to acknowledge"));
        }
        self.reset_locked(&mut state);
        Ok(())
    }

    /// Drops the held file and any error, ready for a new selection.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status == UploadStatus::InFlight {
            return Err(precondition("Cannot clear while an upload is in progress"));
        }
        self.reset_locked(&mut state);
        Ok(())
    }

    fn reset_locked(&self, state: &mut UploadState) {
        state.file = None;
        state.selection = None;
        state.status = UploadStatus::Idle;
        state.error = None;
        state.seq += 1;
        self.progress.send_replace(0);
    }

    /// Abandons the controller. Stops the progress task; a pending restore
    /// result is ignored when it arrives.
    pub(crate) fn discard(&self) {
        let mut state = self.state.lock();
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        state.discarded = true;
        state.seq += 1;
        if state.status == UploadStatus::InFlight {
            state.status = UploadStatus::Idle;
            self.progress.send_replace(0);
        }
        debug!("upload controller discarded");
    }

    /// Current simulated progress, 0..=100.
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    /// Receiver notified on every progress change.
    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        self.state.lock().status
    }

    /// Message of the last failed restore, cleared on retry or new selection.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn selection(&self) -> Option<FileSelection> {
        self.state.lock().selection.clone()
    }

    pub fn file(&self) -> Option<BackupFile> {
        self.state.lock().file.clone()
    }
}

fn ensure_active(state: &UploadState) -> Result<()> {
    if state.discarded {
        return Err(precondition("Upload stage is no longer active"));
    }
    Ok(())
}
