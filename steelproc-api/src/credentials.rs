//! Session credentials
//!
//! In-memory only. The password is zeroized when the last copy is dropped and
//! is never printed by `Debug`.

use std::fmt;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::{Result, error::validation};

/// Server address and login for the remote database server.
///
/// Forwarded unchanged to every gateway call. Immutable: logging out replaces
/// the whole value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    server: String,
    username: String,
    password: Zeroizing<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"MASKED")
            .finish()
    }
}

impl Credentials {
    /// Creates credentials after checking that no field is blank.
    /// Values are kept exactly as given.
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let creds = Self {
            server: server.into(),
            username: username.into(),
            password: Zeroizing::new(password.into()),
        };
        creds.validate()?;
        Ok(creds)
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            self.server.as_str(),
            self.username.as_str(),
            self.password.as_str(),
        ];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(validation("All fields are required"));
        }
        Ok(())
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// JSON body shared by every credential-bearing request.
    pub(crate) fn body(&self) -> CredentialsBody<'_> {
        CredentialsBody {
            server: &self.server,
            username: &self.username,
            password: &self.password,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct CredentialsBody<'a> {
    pub server: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}
