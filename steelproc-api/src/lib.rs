/*
 * Steel processing workflow client
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Steel Processing Workflow Client
//!
//! Client-side workflow controller for the steel processing service.
//!
//! ## Features
//!
//! - typed gateway for the processing server (health, versions, restore, process, delete, download)
//! - in-memory credential holder (password zeroized on drop)
//! - authentication controller that decides whether an upload is needed
//! - upload controller with cancelable simulated progress
//! - version manager: selection, report generation, confirmed deletion, downloads
//! - workflow orchestrator tying the stages together
//! - in-memory mock gateway for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use steelproc::prelude::*;
//! # async fn example() -> Result<(), SteelError> {
//!
//! let gateway = GatewayClient::with_config(ClientConfig::default())?;
//! let workflow = Workflow::new(gateway, WorkflowConfig::default());
//!
//! match workflow.authenticate("localhost,1433", "sa", "secret").await? {
//!     AuthNext::ExistingData { versions } => {
//!         println!("{} existing databases", versions.len());
//!         workflow.skip_upload().await?;
//!     }
//!     AuthNext::NoData => {
//!         let uploader = workflow.upload_controller()?;
//!         uploader.select_path("backup.bacpac").await?;
//!         workflow.upload().await?;
//!     }
//! }
//!
//! let manager = workflow.version_manager()?;
//! manager.generate_report(Location::L250).await?;
//! let path = manager.download(std::path::Path::new(".")).await?;
//! println!("report saved to {}", path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Structure
//!
//! Stage components never mutate workflow state directly. Each returns a
//! [`StageTransition`](workflow::StageTransition) and the [`Workflow`](workflow::Workflow)
//! applies it. Every component is generic over the [`Gateway`](gateway::Gateway)
//! trait; [`GatewayClient`](client::GatewayClient) is the HTTP implementation and
//! [`MockGateway`](mock::MockGateway) is the in-memory one.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::future_not_send)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unused_async)]

pub mod auth;
pub mod client;
pub mod credentials;
pub mod download;
pub mod error;
pub mod gateway;
mod http_client;
#[doc(hidden)]
pub mod mock;
mod progress;
pub mod upload;
pub mod validation;
pub mod versions;
pub mod workflow;

pub use reqwest::Url;

/// Result type alias using `SteelError` as the default error.
pub type Result<T, E = crate::error::SteelError> = std::result::Result<T, E>;

/// Prelude module - import the common types with `use steelproc::prelude::*;`
pub mod prelude {
    pub use super::{DEFAULT_SERVER_URL, REFERENCE_DATABASE, Url};
    pub use crate::error::*;
    pub use crate::{
        auth::{AuthController, AuthNext, AuthOutcome},
        client::{ClientConfig, GatewayClient},
        credentials::Credentials,
        download::{local_file_name, resolve_download_url},
        gateway::{DeleteResponse, Gateway, ProcessRequest, ProcessResponse, RestoreResponse},
        http_client::HttpMetricsSnapshot,
        mock::MockGateway,
        upload::{
            BackupFile, FileSelection, ProgressConfig, UploadController, UploadOutcome, UploadStatus,
        },
        validation::Location,
        versions::{
            DeletionRequest, DeletionStatus, JobStatus, Notice, NoticeLevel, ProcessingJob,
            ReportResult, VersionManager, VersionSnapshot,
        },
        workflow::{StageKind, StageTransition, Workflow, WorkflowConfig, WorkflowStatus},
    };
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default processing server endpoint
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Reference dataset every processing job is combined with
pub const REFERENCE_DATABASE: &str = "MasterDataDB";

pub(crate) mod config {
    /// Environment variable for default endpoint URL
    pub const STEELPROC_URL_ENV: &str = "STEELPROC_URL";

    /// Only backup files with this suffix are accepted for restore
    pub const BACKUP_FILE_EXTENSION: &str = ".bacpac";

    /// Files above this size get an advisory warning (500 MiB)
    pub const LARGE_FILE_WARN_BYTES: u64 = 500 * 1024 * 1024;

    /// Simulated progress increment, in percent
    pub const PROGRESS_STEP: u8 = 10;

    /// Simulated progress tick interval (milliseconds)
    pub const PROGRESS_INTERVAL_MS: u64 = 500;

    /// Simulated progress never passes this value before restore resolves
    pub const PROGRESS_CAP: u8 = 90;

    /// Path segment the server serves reports from
    pub const DOWNLOAD_SEGMENT: &str = "download";

    /// Multipart field name for the uploaded backup
    pub const RESTORE_FILE_FIELD: &str = "bacpac";
}
