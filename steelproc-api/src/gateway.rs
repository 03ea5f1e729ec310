//! Gateway contract
//!
//! One operation per remote capability of the processing server. The stage
//! controllers only talk to the server through this trait, so they can run
//! against [`GatewayClient`](crate::client::GatewayClient) (HTTP) or
//! [`MockGateway`](crate::mock::MockGateway) (in memory).
//!
//! Every operation is attempted exactly once per call. Failures are reported
//! as [`SteelError::Remote`](crate::error::SteelError::Remote).

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Result, credentials::Credentials, upload::BackupFile, validation::Location};

/// Result of a restore: the name of the database the server created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    #[serde(default, alias = "dbName", alias = "database")]
    pub db_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parameters of a processing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Version (database) to process
    pub db_name: String,
    /// Reference dataset, normally [`REFERENCE_DATABASE`](crate::REFERENCE_DATABASE)
    pub reference_db: String,
    pub location: Location,
}

/// Where the generated report can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub download_url: String,
    pub file_name: String,
}

/// Acknowledgement of a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Remote operations used by the workflow.
pub trait Gateway: Send + Sync {
    /// Checks that the server is reachable and accepts the credentials.
    fn health_check(&self, creds: &Credentials) -> impl Future<Output = Result<()>> + Send;

    /// Lists database versions, in server order.
    fn list_versions(
        &self,
        creds: &Credentials,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Uploads a backup file and restores it into a new database.
    fn restore(
        &self,
        creds: &Credentials,
        file: &BackupFile,
    ) -> impl Future<Output = Result<RestoreResponse>> + Send;

    /// Runs processing for a version and location.
    fn process(
        &self,
        creds: &Credentials,
        request: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessResponse>> + Send;

    /// Deletes a database version.
    fn delete_version(
        &self,
        creds: &Credentials,
        name: &str,
    ) -> impl Future<Output = Result<DeleteResponse>> + Send;

    /// Resolves a report file name or path to one absolute download url.
    /// Pure: no network access.
    fn resolve_download_url(&self, file: &str) -> Result<String>;

    /// Fetches a resolved download url.
    fn download(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_response_aliases() {
        let r: RestoreResponse = serde_json::from_str(r#"{"db_name": "A"}"#).unwrap();
        assert_eq!(r.db_name.as_deref(), Some("A"));
        let r: RestoreResponse = serde_json::from_str(r#"{"dbName": "B"}"#).unwrap();
        assert_eq!(r.db_name.as_deref(), Some("B"));
        let r: RestoreResponse =
            serde_json::from_str(r#"{"message": "Database restored"}"#).unwrap();
        assert_eq!(r.db_name, None);
    }

    #[test]
    fn test_process_response() {
        let r: ProcessResponse = serde_json::from_str(
            r#"{"download_url": "/download/report.xlsx", "file_name": "report.xlsx", "rows": 10}"#,
        )
        .unwrap();
        assert_eq!(r.file_name, "report.xlsx");
        assert_eq!(r.download_url, "/download/report.xlsx");
    }
}
