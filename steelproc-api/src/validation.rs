//! Validation functions
//!

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    config::{BACKUP_FILE_EXTENSION, LARGE_FILE_WARN_BYTES},
    error::validation,
};

/// Physical site a report is generated for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Location {
    /// Location 250: frame coil processing
    #[default]
    L250,
    /// Location 255: frame sheet processing
    L255,
}

impl Location {
    pub const ALL: [Location; 2] = [Location::L250, Location::L255];

    /// Site code as sent to the server
    pub fn code(self) -> u16 {
        match self {
            Self::L250 => 250,
            Self::L255 => 255,
        }
    }

    /// Human readable processing variant
    pub fn description(self) -> &'static str {
        match self {
            Self::L250 => "Frame Coil Processing",
            Self::L255 => "Frame Sheet Processing",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<Location> for u16 {
    fn from(location: Location) -> Self {
        location.code()
    }
}

impl TryFrom<u16> for Location {
    type Error = crate::error::SteelError;

    fn try_from(code: u16) -> Result<Self> {
        match code {
            250 => Ok(Self::L250),
            255 => Ok(Self::L255),
            other => Err(validation(format!(
                "unsupported location {other}: expected 250 or 255"
            ))),
        }
    }
}

impl FromStr for Location {
    type Err = crate::error::SteelError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().parse::<u16>().map_err(|_| {
            validation(format!("unsupported location '{s}': expected 250 or 255"))
        })?;
        Self::try_from(code)
    }
}

/// Checks the backup file name suffix. Case-sensitive.
pub fn validate_backup_name(name: &str) -> Result<()> {
    if name.ends_with(BACKUP_FILE_EXTENSION) {
        Ok(())
    } else {
        Err(validation(format!(
            "Please select a {BACKUP_FILE_EXTENSION} file"
        )))
    }
}

/// Returns an advisory message when the file is large enough that the upload
/// will take noticeably longer. Never blocks selection.
pub fn large_file_advisory(size: u64) -> Option<String> {
    (size > LARGE_FILE_WARN_BYTES).then(|| {
        format!(
            "File size exceeds {}MB. Large files may take longer to upload.",
            LARGE_FILE_WARN_BYTES / (1024 * 1024)
        )
    })
}

/// Formats a byte count for display, e.g. "1.5 MB"
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SteelError;

    #[test]
    fn test_backup_name() {
        assert!(validate_backup_name("prod.bacpac").is_ok());
        assert!(validate_backup_name("SteelProcessing_20250101.bacpac").is_ok());
        for bad in ["prod.bak", "prod.BACPAC", "bacpac", "prod.bacpac.zip", ""] {
            let err = validate_backup_name(bad).unwrap_err();
            assert!(matches!(err, SteelError::Validation { .. }), "{bad}");
        }
    }

    #[test]
    fn test_large_file_advisory() {
        assert!(large_file_advisory(LARGE_FILE_WARN_BYTES).is_none());
        let msg = large_file_advisory(LARGE_FILE_WARN_BYTES + 1).expect("advisory");
        assert!(msg.contains("500MB"));
    }

    #[test]
    fn test_location_parse() {
        assert_eq!("250".parse::<Location>().unwrap(), Location::L250);
        assert_eq!(" 255 ".parse::<Location>().unwrap(), Location::L255);
        assert!(matches!(
            "251".parse::<Location>(),
            Err(SteelError::Validation { .. })
        ));
        assert!(matches!(
            "north".parse::<Location>(),
            Err(SteelError::Validation { .. })
        ));
        assert!(Location::try_from(0u16).is_err());
    }

    #[test]
    fn test_location_serde_as_code() {
        let json = serde_json::to_string(&Location::L255).unwrap();
        assert_eq!(json, "255");
        let parsed: Location = serde_json::from_str("250").unwrap();
        assert_eq!(parsed, Location::L250);
        assert!(serde_json::from_str::<Location>("99").is_err());
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }
}
