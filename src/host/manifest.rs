//! Native messaging host manifest.
//!
//! The manifest is the JSON file a browser reads to find and launch a
//! native host:
//!
//! ```json
//! {
//!   "name": "com.dynamics.helper.native",
//!   "description": "Dynamics Helper Native Host",
//!   "path": "dh_native_host.exe",
//!   "type": "stdio",
//!   "allowed_origins": ["chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/"]
//! }
//! ```
//!
//! A relative `path` is resolved against the directory holding the manifest.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// UTF-8 byte order mark some editors prepend to JSON files.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// HostType
// ============================================================================

/// How the browser talks to the host. Only stdio exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    /// Length-prefixed JSON over stdin/stdout.
    Stdio,
}

// ============================================================================
// HostManifest
// ============================================================================

/// Parsed host manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostManifest {
    /// Logical host name, e.g. `com.dynamics.helper.native`.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Host executable, absolute or relative to the manifest.
    pub path: PathBuf,

    /// Transport type.
    #[serde(rename = "type")]
    pub host_type: HostType,

    /// Extension origins allowed to start the host.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl HostManifest {
    /// Parses a manifest from raw bytes.
    ///
    /// A leading UTF-8 BOM is stripped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] if the bytes are not a manifest.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes = match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => {
                warn!("Host manifest starts with a UTF-8 BOM; browsers may reject it");
                rest
            }
            None => bytes,
        };

        serde_json::from_slice(bytes).map_err(|e| Error::manifest(format!("invalid manifest JSON: {e}")))
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| Error::manifest(format!("cannot read {}: {e}", path.display())))?;

        Self::from_slice(&bytes).map_err(|e| match e {
            Error::Manifest { message } => Error::manifest(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Checks the manifest's fields.
    ///
    /// When `expected_name` is given, the manifest must declare that name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] describing the first problem found.
    pub fn validate(&self, expected_name: Option<&str>) -> Result<()> {
        validate_host_name(&self.name)?;

        if let Some(expected) = expected_name
            && self.name != expected
        {
            return Err(Error::manifest(format!(
                "manifest declares host {:?}, expected {expected:?}",
                self.name
            )));
        }

        if self.path.as_os_str().is_empty() {
            return Err(Error::manifest("manifest path is empty"));
        }

        for origin in &self.allowed_origins {
            if !origin.contains("://") {
                return Err(Error::manifest(format!("allowed origin {origin:?} is not a URL origin")));
            }
        }

        Ok(())
    }

    /// Returns the executable path, resolving a relative `path` against `manifest_dir`.
    #[must_use]
    pub fn executable(&self, manifest_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            manifest_dir.join(&self.path)
        }
    }

    /// Returns `true` if `origin` may start this host.
    ///
    /// Trailing slashes are ignored when comparing.
    #[must_use]
    pub fn allows_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }
}

// ============================================================================
// Name Validation
// ============================================================================

/// Checks a host name against the native messaging naming rules.
///
/// Names may only contain lowercase alphanumerics, underscores and dots.
/// They cannot start or end with a dot, and cannot contain two dots in a row.
///
/// # Errors
///
/// Returns [`Error::Manifest`] naming the violated rule.
pub fn validate_host_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::manifest("host name is empty"));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '.'))
    {
        return Err(Error::manifest(format!("host name {name:?} contains invalid character {c:?}")));
    }

    if name.starts_with('.') || name.ends_with('.') {
        return Err(Error::manifest(format!("host name {name:?} cannot start or end with a dot")));
    }

    if name.contains("..") {
        return Err(Error::manifest(format!("host name {name:?} contains consecutive dots")));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "com.dynamics.helper.native",
        "description": "Dynamics Helper Native Host",
        "path": "dh_native_host.exe",
        "type": "stdio",
        "allowed_origins": ["chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/"]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = HostManifest::from_slice(MANIFEST.as_bytes()).expect("parse");
        assert_eq!(manifest.name, "com.dynamics.helper.native");
        assert_eq!(manifest.host_type, HostType::Stdio);
        assert_eq!(manifest.allowed_origins.len(), 1);
        manifest.validate(Some("com.dynamics.helper.native")).expect("valid");
    }

    #[test]
    fn test_bom_is_tolerated() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(MANIFEST.as_bytes());
        let manifest = HostManifest::from_slice(&bytes).expect("parse with BOM");
        assert_eq!(manifest.name, "com.dynamics.helper.native");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let text = MANIFEST.replace(r#""stdio""#, r#""socket""#);
        let err = HostManifest::from_slice(text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let manifest = HostManifest::from_slice(MANIFEST.as_bytes()).expect("parse");
        let err = manifest.validate(Some("com.other.host")).unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn test_relative_path_resolves_against_manifest_dir() {
        let manifest = HostManifest::from_slice(MANIFEST.as_bytes()).expect("parse");
        let dir = Path::new("/opt/dynamics");
        assert_eq!(manifest.executable(dir), dir.join("dh_native_host.exe"));
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_path_kept() {
        let text = MANIFEST.replace("dh_native_host.exe", "/usr/bin/dh-host");
        let manifest = HostManifest::from_slice(text.as_bytes()).expect("parse");
        assert_eq!(manifest.executable(Path::new("/elsewhere")), PathBuf::from("/usr/bin/dh-host"));
    }

    #[test]
    fn test_allows_origin_ignores_trailing_slash() {
        let manifest = HostManifest::from_slice(MANIFEST.as_bytes()).expect("parse");
        assert!(manifest.allows_origin("chrome-extension://aiimcjfjmibedicmckpphgbddankgdln"));
        assert!(manifest.allows_origin("chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/"));
        assert!(!manifest.allows_origin("chrome-extension://someoneelse/"));
    }

    #[test]
    fn test_host_name_rules() {
        assert!(validate_host_name("com.dynamics.helper.native").is_ok());
        assert!(validate_host_name("my_host2").is_ok());

        for bad in ["", "Com.Example", "com..example", ".com.example", "com.example.", "com-example"] {
            assert!(validate_host_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");

        let err = HostManifest::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
