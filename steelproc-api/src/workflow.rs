//! Workflow orchestrator
//!
//! Owns the session credentials and the single active stage:
//!
//! ```text
//! Unauthenticated --authenticate--> AwaitingUploadDecision --proceed_to_upload--> Uploading
//!        |                                   |                                      |
//!        +------(no existing data)-----------|-------------> Uploading              |
//!                                            +--skip_upload--> VersionManagement <--+ upload / skip_upload
//! ```
//!
//! `logout` (or `reset`) returns to `Unauthenticated` from any stage, drops the
//! credentials and discards the active stage component. Results of operations
//! started before a reset are ignored and reported as `Precondition`.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::{
    REFERENCE_DATABASE, Result,
    auth::{AuthController, AuthNext},
    credentials::Credentials,
    error::precondition,
    gateway::Gateway,
    upload::{ProgressConfig, UploadController, UploadOutcome, UploadStatus},
    versions::{VersionManager, VersionSnapshot},
};

/// Settings applied to the stage components a workflow creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Reference dataset processing jobs are combined with
    pub reference_db: String,
    pub progress: ProgressConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            reference_db: REFERENCE_DATABASE.to_string(),
            progress: ProgressConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn reference_db(self, reference_db: impl Into<String>) -> Self {
        WorkflowConfig {
            reference_db: reference_db.into(),
            ..self
        }
    }

    pub fn progress(self, progress: ProgressConfig) -> Self {
        WorkflowConfig { progress, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageKind {
    Unauthenticated,
    AwaitingUploadDecision,
    Uploading,
    VersionManagement,
}

/// Stage change requested by a stage component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageTransition {
    ToUploadDecision { versions: Vec<String> },
    ToUploading,
    ToVersionManagement,
}

impl From<AuthNext> for StageTransition {
    fn from(next: AuthNext) -> Self {
        match next {
            AuthNext::ExistingData { versions } => StageTransition::ToUploadDecision { versions },
            AuthNext::NoData => StageTransition::ToUploading,
        }
    }
}

enum Stage<G: Gateway> {
    Unauthenticated,
    AwaitingUploadDecision { versions: Vec<String> },
    Uploading { upload: Arc<UploadController<G>> },
    VersionManagement { versions: Arc<VersionManager<G>> },
}

impl<G: Gateway> Stage<G> {
    fn kind(&self) -> StageKind {
        match self {
            Stage::Unauthenticated => StageKind::Unauthenticated,
            Stage::AwaitingUploadDecision { .. } => StageKind::AwaitingUploadDecision,
            Stage::Uploading { .. } => StageKind::Uploading,
            Stage::VersionManagement { .. } => StageKind::VersionManagement,
        }
    }

    fn discard(&self) {
        match self {
            Stage::Uploading { upload } => upload.discard(),
            Stage::VersionManagement { versions } => versions.discard(),
            Stage::Unauthenticated | Stage::AwaitingUploadDecision { .. } => {}
        }
    }
}

struct Session<G: Gateway> {
    stage: Stage<G>,
    credentials: Option<Credentials>,
    /// bumped by every reset; operations started in an older epoch are stale
    epoch: u64,
}

impl<G: Gateway> Session<G> {
    fn credentials(&self) -> Result<Credentials> {
        self.credentials
            .clone()
            .ok_or_else(|| precondition("Not authenticated"))
    }
}

/// Point-in-time view of the workflow for display.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    pub stage: StageKind,
    pub authenticated: bool,
    pub server: Option<String>,
    pub username: Option<String>,
    /// Versions found at login, while the upload decision is pending
    pub existing_versions: Option<Vec<String>>,
    pub upload_status: Option<UploadStatus>,
    pub upload_progress: Option<u8>,
    pub versions: Option<VersionSnapshot>,
}

/// Top-level state machine for one operator session.
pub struct Workflow<G: Gateway> {
    gateway: Arc<G>,
    config: WorkflowConfig,
    auth: AuthController<G>,
    session: Mutex<Session<G>>,
}

impl<G: Gateway> fmt::Debug for Workflow<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session.lock();
        f.debug_struct("Workflow")
            .field("stage", &session.stage.kind())
            .field("credentials", &session.credentials)
            .field("epoch", &session.epoch)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<G: Gateway> Workflow<G> {
    pub fn new(gateway: G, config: WorkflowConfig) -> Self {
        Self::with_gateway(Arc::new(gateway), config)
    }

    /// Creates a workflow sharing an existing gateway.
    pub fn with_gateway(gateway: Arc<G>, config: WorkflowConfig) -> Self {
        Self {
            auth: AuthController::new(gateway.clone()),
            gateway,
            config,
            session: Mutex::new(Session {
                stage: Stage::Unauthenticated,
                credentials: None,
                epoch: 0,
            }),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Logs in. On success stores the credentials and moves to
    /// `AwaitingUploadDecision` (existing data) or `Uploading` (none).
    /// On failure the workflow stays `Unauthenticated`.
    pub async fn authenticate(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthNext> {
        let epoch = {
            let session = self.session.lock();
            if !matches!(session.stage, Stage::Unauthenticated) {
                return Err(precondition("Already authenticated. Log out first."));
            }
            session.epoch
        };

        let outcome = self.auth.authenticate(server, username, password).await?;

        let mut session = self.session.lock();
        if session.epoch != epoch || !matches!(session.stage, Stage::Unauthenticated) {
            return Err(precondition("Authentication was superseded"));
        }
        session.credentials = Some(outcome.credentials);
        let pending = self.apply(&mut session, StageTransition::from(outcome.next.clone()))?;
        drop(session);
        // login never leads straight to version management
        debug_assert!(pending.is_none());
        Ok(outcome.next)
    }

    /// Validates the fields and runs a health check. Never changes the stage.
    pub async fn test_connection(&self, server: &str, username: &str, password: &str) -> Result<()> {
        self.auth.test_connection(server, username, password).await
    }

    /// Chooses to upload another backup although data already exists.
    pub fn proceed_to_upload(&self) -> Result<()> {
        let mut session = self.session.lock();
        if !matches!(session.stage, Stage::AwaitingUploadDecision { .. }) {
            return Err(precondition("No upload decision pending"));
        }
        self.apply(&mut session, StageTransition::ToUploading)?;
        Ok(())
    }

    /// Goes to version management without uploading.
    ///
    /// The version list is refreshed on entry. A refresh failure is recorded
    /// as an error notice on the version manager; the stage still changes.
    pub async fn skip_upload(&self) -> Result<()> {
        let manager = {
            let mut session = self.session.lock();
            let transition = match &session.stage {
                Stage::AwaitingUploadDecision { .. } => StageTransition::ToVersionManagement,
                Stage::Uploading { upload } => upload.skip()?,
                _ => return Err(precondition("Upload cannot be skipped in this stage")),
            };
            self.apply(&mut session, transition)?
        };
        if let Some(manager) = manager {
            self.initial_refresh(&manager).await;
        }
        Ok(())
    }

    /// Restores the file held by the upload controller and, on success, moves
    /// to version management.
    pub async fn upload(&self) -> Result<UploadOutcome> {
        let (controller, epoch) = {
            let session = self.session.lock();
            let Stage::Uploading { upload } = &session.stage else {
                return Err(precondition("Not in the upload stage"));
            };
            (upload.clone(), session.epoch)
        };

        let outcome = controller.upload().await?;

        let manager = {
            let mut session = self.session.lock();
            let current = matches!(
                &session.stage,
                Stage::Uploading { upload } if Arc::ptr_eq(upload, &controller)
            );
            if session.epoch != epoch || !current {
                return Err(precondition("Upload result arrived after the session was reset"));
            }
            self.apply(&mut session, outcome.transition.clone())?
        };
        if let Some(manager) = manager {
            self.initial_refresh(&manager).await;
        }
        Ok(outcome)
    }

    /// Returns to `Unauthenticated`, dropping credentials and stage state.
    pub fn logout(&self) {
        let mut session = self.session.lock();
        session.stage.discard();
        session.stage = Stage::Unauthenticated;
        session.credentials = None;
        session.epoch += 1;
        info!(epoch = session.epoch, "logged out");
    }

    /// Same as [`logout`](Self::logout).
    pub fn reset(&self) {
        self.logout();
    }

    /// Applies a transition. Returns the new version manager when entering
    /// version management, so the caller can refresh it outside the lock.
    fn apply(
        &self,
        session: &mut Session<G>,
        transition: StageTransition,
    ) -> Result<Option<Arc<VersionManager<G>>>> {
        let credentials = session.credentials()?;
        let from = session.stage.kind();
        let (stage, manager) = match transition {
            StageTransition::ToUploadDecision { versions } => {
                (Stage::AwaitingUploadDecision { versions }, None)
            }
            StageTransition::ToUploading => {
                let upload = Arc::new(UploadController::with_progress(
                    self.gateway.clone(),
                    credentials,
                    self.config.progress,
                ));
                (Stage::Uploading { upload }, None)
            }
            StageTransition::ToVersionManagement => {
                let versions = Arc::new(VersionManager::with_reference(
                    self.gateway.clone(),
                    credentials,
                    self.config.reference_db.clone(),
                ));
                (
                    Stage::VersionManagement {
                        versions: versions.clone(),
                    },
                    Some(versions),
                )
            }
        };
        session.stage.discard();
        session.stage = stage;
        info!(%from, to = %session.stage.kind(), "stage changed");
        Ok(manager)
    }

    async fn initial_refresh(&self, manager: &VersionManager<G>) {
        match manager.refresh().await {
            Ok(versions) => debug!(count = versions.len(), "initial version list loaded"),
            Err(e) => {
                error!(error = %e, "initial version refresh failed");
                manager.push_error_notice(e.to_string());
            }
        }
    }

    pub fn stage(&self) -> StageKind {
        self.session.lock().stage.kind()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.lock().credentials.is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.session.lock().credentials.clone()
    }

    /// Versions reported at login, while the upload decision is pending.
    pub fn existing_versions(&self) -> Option<Vec<String>> {
        match &self.session.lock().stage {
            Stage::AwaitingUploadDecision { versions } => Some(versions.clone()),
            _ => None,
        }
    }

    /// Upload controller of the active `Uploading` stage.
    pub fn upload_controller(&self) -> Result<Arc<UploadController<G>>> {
        match &self.session.lock().stage {
            Stage::Uploading { upload } => Ok(upload.clone()),
            _ => Err(precondition("Not in the upload stage")),
        }
    }

    /// Version manager of the active `VersionManagement` stage.
    pub fn version_manager(&self) -> Result<Arc<VersionManager<G>>> {
        match &self.session.lock().stage {
            Stage::VersionManagement { versions } => Ok(versions.clone()),
            _ => Err(precondition("Not in the version management stage")),
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        let session = self.session.lock();
        let mut status = WorkflowStatus {
            stage: session.stage.kind(),
            authenticated: session.credentials.is_some(),
            server: session.credentials.as_ref().map(|c| c.server().to_string()),
            username: session
                .credentials
                .as_ref()
                .map(|c| c.username().to_string()),
            existing_versions: None,
            upload_status: None,
            upload_progress: None,
            versions: None,
        };
        match &session.stage {
            Stage::Unauthenticated => {}
            Stage::AwaitingUploadDecision { versions } => {
                status.existing_versions = Some(versions.clone());
            }
            Stage::Uploading { upload } => {
                status.upload_status = Some(upload.status());
                status.upload_progress = Some(upload.progress());
            }
            Stage::VersionManagement { versions } => {
                status.versions = Some(versions.snapshot());
            }
        }
        status
    }
}
