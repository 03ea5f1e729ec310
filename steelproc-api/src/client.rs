//! HTTP gateway client for the processing server
//!
//! # Creating new gateway client
//!
//! - [with_config](GatewayClient::with_config) - create client with configuration
//! - [with_client](GatewayClient::with_client) - create client with configuration and custom reqwest client
//!
//! # Endpoints
//!
//! | operation | endpoint |
//! |---|---|
//! | health check | `POST /health` |
//! | list versions | `POST /versions` |
//! | restore | `POST /restore-db` (multipart) |
//! | process | `POST /process-db` |
//! | delete | `POST /delete-db` |
//! | download | `GET /download/<file>` |
//!

use std::time::Duration;

use bytes::Bytes;
use reqwest::{
    Body, Url,
    multipart::{Form, Part},
};
use serde::Serialize;
use snafu::prelude::*;
use tracing::debug;

use crate::{
    DEFAULT_SERVER_URL, Result,
    config::{RESTORE_FILE_FIELD, STEELPROC_URL_ENV},
    credentials::Credentials,
    download::resolve_download_url,
    error::{IoSnafu, SteelError},
    gateway::{DeleteResponse, Gateway, ProcessRequest, ProcessResponse, RestoreResponse},
    http_client::{HttpClient, HttpMetricsSnapshot},
    upload::BackupFile,
};

const MSG_HEALTH: &str = "Failed to connect to server. Please check your credentials.";
const MSG_VERSIONS: &str = "Failed to load database versions";
const MSG_RESTORE: &str = "Failed to restore database";
const MSG_PROCESS: &str = "Failed to process database";
const MSG_DELETE: &str = "Failed to delete database";
const MSG_DOWNLOAD: &str = "Failed to download report";

/// Configuration for the gateway client.
///
/// ```rust,no_run
/// use steelproc::prelude::*;
/// # fn create_client() -> Result<GatewayClient, SteelError> {
/// let config = ClientConfig::default().base_url("http://processing.local:8000");
/// let client = GatewayClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url for all requests.
    /// If not provided in config, url is determined by:
    /// * The environment variable `STEELPROC_URL`, if defined, or
    /// * "http://127.0.0.1:8000" `steelproc::DEFAULT_SERVER_URL`
    pub base_url: String,

    /// Optional overall timeout applied to every request.
    ///
    /// Default is None: a hung request leaves its task in flight indefinitely.
    /// Restores of large backups can take many minutes, so any value set here
    /// needs to cover the slowest expected restore.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: std::env::var(STEELPROC_URL_ENV).unwrap_or(DEFAULT_SERVER_URL.to_string()),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Sets the base url.
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Sets the request timeout.
    pub fn timeout(self, timeout: Option<Duration>) -> Self {
        ClientConfig { timeout, ..self }
    }

    /// Parses and checks the base url: http or https, usable as a base.
    pub fn parse_base_url(&self) -> Result<Url> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| SteelError::Config {
            message: format!("invalid base url '{}': {e}", self.base_url),
        })?;
        ensure!(
            matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base(),
            crate::error::ConfigSnafu {
                message: format!("base url must be http(s): '{}'", self.base_url),
            }
        );
        Ok(url)
    }
}

/// HTTP implementation of [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayClient {
    pub(crate) client: HttpClient,
    pub(crate) config: ClientConfig,
}

#[derive(Serialize)]
struct ProcessBody<'a> {
    db_name: &'a str,
    reference_db: &'a str,
    server: &'a str,
    username: &'a str,
    password: &'a str,
    location: String,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    db_name: &'a str,
    server: &'a str,
    username: &'a str,
    password: &'a str,
}

impl GatewayClient {
    /// Creates a client with the provided configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::builder(), config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with proxies, dns servers, user_agent, etc.
    pub fn with_client(builder: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        let base_url = config.parse_base_url()?;
        debug!(url = %base_url, timeout = ?config.timeout, "new gateway client");
        let builder = match config.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        };
        let client = HttpClient::new(builder, base_url)?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the parsed server base url.
    pub fn base_url(&self) -> &Url {
        &self.client.base_url
    }

    /// Returns a snapshot of current HTTP metrics.
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }
}

impl Gateway for GatewayClient {
    async fn health_check(&self, creds: &Credentials) -> Result<()> {
        debug!(server = creds.server(), "health check");
        self.client
            .post_json_raw("health_check", MSG_HEALTH, "/health", &creds.body())
            .await?;
        Ok(())
    }

    async fn list_versions(&self, creds: &Credentials) -> Result<Vec<String>> {
        let versions: Vec<String> = self
            .client
            .post_json("list_versions", MSG_VERSIONS, "/versions", &creds.body())
            .await?;
        debug!(count = versions.len(), "versions listed");
        Ok(versions)
    }

    async fn restore(&self, creds: &Credentials, file: &BackupFile) -> Result<RestoreResponse> {
        let handle = tokio::fs::File::open(&file.path)
            .await
            .context(IoSnafu { path: &file.path })?;
        let len = handle
            .metadata()
            .await
            .context(IoSnafu { path: &file.path })?
            .len();
        let part = Part::stream_with_length(Body::from(handle), len)
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| SteelError::Config {
                message: format!("multipart mime: {e}"),
            })?;
        let form = Form::new()
            .text("server", creds.server().to_string())
            .text("username", creds.username().to_string())
            .text("password", creds.password().to_string())
            .part(RESTORE_FILE_FIELD, part);
        debug!(file = %file.name, size = len, "restore upload");
        // the server may answer with just a status message; db_name is optional
        self.client
            .post_multipart("restore", MSG_RESTORE, "/restore-db", form, len)
            .await
    }

    async fn process(
        &self,
        creds: &Credentials,
        request: &ProcessRequest,
    ) -> Result<ProcessResponse> {
        let body = ProcessBody {
            db_name: &request.db_name,
            reference_db: &request.reference_db,
            server: creds.server(),
            username: creds.username(),
            password: creds.password(),
            location: request.location.to_string(),
        };
        debug!(db = %request.db_name, location = %request.location, "process");
        self.client
            .post_json("process", MSG_PROCESS, "/process-db", &body)
            .await
    }

    async fn delete_version(&self, creds: &Credentials, name: &str) -> Result<DeleteResponse> {
        let body = DeleteBody {
            db_name: name,
            server: creds.server(),
            username: creds.username(),
            password: creds.password(),
        };
        debug!(db = name, "delete");
        let data = self
            .client
            .post_json_raw("delete", MSG_DELETE, "/delete-db", &body)
            .await?;
        Ok(serde_json::from_slice(&data).unwrap_or_default())
    }

    fn resolve_download_url(&self, file: &str) -> Result<String> {
        resolve_download_url(&self.client.base_url, file)
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        let url = Url::parse(url)
            .map_err(|e| crate::error::validation(format!("invalid download url '{url}': {e}")))?;
        self.client.get_bytes("download", MSG_DOWNLOAD, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_bad_urls() {
        for bad in ["", "not a url", "ftp://host/", "mailto:ops@example.com"] {
            let config = ClientConfig::default().base_url(bad);
            assert!(
                matches!(config.parse_base_url(), Err(SteelError::Config { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_config_accepts_http_and_https() {
        for good in ["http://127.0.0.1:8000", "https://steel.example.com/api/"] {
            let config = ClientConfig::default().base_url(good);
            assert!(config.parse_base_url().is_ok(), "{good}");
        }
    }

    #[test]
    fn test_client_resolves_against_base() {
        let client = GatewayClient::with_config(
            ClientConfig::default().base_url("https://steel.example.com/"),
        )
        .expect("client");
        assert_eq!(
            client.resolve_download_url("/download/r.xlsx").unwrap(),
            "https://steel.example.com/download/r.xlsx"
        );
        assert_eq!(client.http_metrics().total_requests, 0);
    }

    #[test]
    fn test_process_body_sends_location_code_as_string() {
        let body = ProcessBody {
            db_name: "SteelProcessing_20250101_120000",
            reference_db: crate::REFERENCE_DATABASE,
            server: "srv",
            username: "sa",
            password: "pw",
            location: crate::validation::Location::L255.to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["location"], "255");
        assert_eq!(json["reference_db"], "MasterDataDB");
    }
}
