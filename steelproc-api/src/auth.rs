//! Authentication stage
//!
//! Checks the credentials against the server and decides where the workflow
//! goes next.
//!
//! # Methods
//!
//! - [authenticate](AuthController::authenticate) - validate, health check, list existing versions
//! - [test_connection](AuthController::test_connection) - validate and health check only
//!

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::{Result, credentials::Credentials, gateway::Gateway};

/// Where the workflow goes after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "next", rename_all = "snake_case")]
pub enum AuthNext {
    /// The server already holds databases; the operator decides whether to
    /// upload another backup or go straight to version management.
    ExistingData { versions: Vec<String> },
    /// Nothing to work with yet; a backup must be uploaded.
    NoData,
}

/// Successful authentication.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub credentials: Credentials,
    pub next: AuthNext,
}

#[derive(Debug)]
pub struct AuthController<G: Gateway> {
    gateway: Arc<G>,
}

impl<G: Gateway> AuthController<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Logs in and inspects the existing databases.
    ///
    /// Empty fields fail locally with `Validation`; server failures are
    /// returned as `Remote` with the server's message.
    pub async fn authenticate(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome> {
        let credentials = Credentials::new(server, username, password)?;
        self.check(&credentials).await?;

        let versions = self
            .gateway
            .list_versions(&credentials)
            .await
            .inspect_err(|e| error!(server = credentials.server(), error = %e, "listing versions failed"))?;
        let next = if versions.is_empty() {
            AuthNext::NoData
        } else {
            AuthNext::ExistingData { versions }
        };
        info!(server = credentials.server(), user = credentials.username(), ?next, "authenticated");
        Ok(AuthOutcome { credentials, next })
    }

    /// Validates the fields and runs a health check. Has no other effect.
    pub async fn test_connection(&self, server: &str, username: &str, password: &str) -> Result<()> {
        let credentials = Credentials::new(server, username, password)?;
        self.check(&credentials).await
    }

    async fn check(&self, credentials: &Credentials) -> Result<()> {
        debug!(server = credentials.server(), "checking connection");
        self.gateway
            .health_check(credentials)
            .await
            .inspect_err(|e| error!(server = credentials.server(), error = %e, "health check failed"))
    }
}
