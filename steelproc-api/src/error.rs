//! Errors returned by the workflow components and the gateway
//!
use std::path::PathBuf;

use snafu::prelude::*;

/// Errors returned by steelproc crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SteelError {
    /// A local precondition on the input failed: wrong file type, empty
    /// credential field, missing selection, unsupported location.
    /// Never reaches the network.
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// Server or transport failure.
    ///
    /// `message` is the server-supplied detail when the server sent one, or a
    /// generic message for the operation. `raw_detail` keeps the raw response
    /// body or transport error text for diagnostics.
    #[snafu(display("{message}"))]
    Remote {
        operation: String,
        message: String,
        status: Option<u16>,
        raw_detail: Option<String>,
    },

    /// Operation invoked in a stage or state where it is not allowed,
    /// for example downloading before a report exists.
    #[snafu(display("{message}"))]
    Precondition { message: String },

    /// Client could not be constructed (invalid base url, http client init)
    #[snafu(display("Configuration error: {message}"))]
    Config { message: String },

    /// Local file access failed
    #[snafu(display("file {path:?}: {source}"))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SteelError {
    /// Returns true for errors that originate on the server or in transport.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns true for errors resolved entirely locally (no network involved).
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Precondition { .. })
    }

    /// Raw server detail, if this is a remote error that carried one.
    pub fn raw_detail(&self) -> Option<&str> {
        match self {
            Self::Remote { raw_detail, .. } => raw_detail.as_deref(),
            _ => None,
        }
    }
}

pub(crate) fn validation(message: impl Into<String>) -> SteelError {
    SteelError::Validation {
        message: message.into(),
    }
}

pub(crate) fn precondition(message: impl Into<String>) -> SteelError {
    SteelError::Precondition {
        message: message.into(),
    }
}
