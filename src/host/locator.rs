//! Host manifest discovery.
//!
//! Browsers look a native host up by name in a handful of well-known
//! directories. [`HostLocator`] does the same, after any directories the
//! caller configured.
//!
//! | Platform | Per-user | System |
//! |----------|----------|--------|
//! | Linux | `~/.config/<browser>/NativeMessagingHosts` | `/etc/opt/chrome/native-messaging-hosts`, ... |
//! | macOS | `~/Library/Application Support/<browser>/NativeMessagingHosts` | `/Library/Google/Chrome/NativeMessagingHosts`, ... |
//! | Windows | configured directories only | configured directories only |
//!
//! Windows registers hosts in the registry, which is not read here. Point
//! the locator at the manifest with [`HostLocator::from_manifest`] instead.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::manifest::{HostManifest, validate_host_name};

// ============================================================================
// ResolvedHost
// ============================================================================

/// A manifest that was found, parsed and validated.
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    /// Parsed manifest.
    pub manifest: HostManifest,
    /// Where the manifest was found.
    pub manifest_path: PathBuf,
    /// Executable to spawn.
    pub executable: PathBuf,
}

// ============================================================================
// HostLocator
// ============================================================================

/// Finds the manifest for a host name.
#[derive(Debug, Clone)]
pub struct HostLocator {
    /// Host name being looked up.
    name: String,
    /// Directories searched before the platform defaults.
    search_dirs: Vec<PathBuf>,
    /// Manifest file to use instead of searching.
    explicit: Option<PathBuf>,
}

impl HostLocator {
    /// Creates a locator that searches for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_dirs: Vec::new(),
            explicit: None,
        }
    }

    /// Creates a locator that always uses the given manifest file.
    ///
    /// The manifest's declared name is not checked against the file name,
    /// since installers commonly ship it as `manifest.json`.
    #[must_use]
    pub fn from_manifest(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            search_dirs: Vec::new(),
            explicit: Some(path),
        }
    }

    /// Adds directories searched before the platform defaults.
    #[must_use]
    pub fn with_search_dirs(mut self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.search_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Returns the host name being looked up.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every manifest path that will be tried, in order.
    #[must_use]
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.explicit {
            return vec![path.clone()];
        }

        let file_name = format!("{}.json", self.name);
        self.search_dirs
            .iter()
            .cloned()
            .chain(default_search_dirs())
            .map(|dir| dir.join(&file_name))
            .collect()
    }

    /// Finds, parses and validates the manifest.
    ///
    /// # Errors
    ///
    /// - [`Error::HostNotFound`] if no candidate manifest exists
    /// - [`Error::Manifest`] if the name is invalid or the manifest is broken
    pub fn locate(&self) -> Result<ResolvedHost> {
        if let Some(path) = &self.explicit {
            if !path.is_file() {
                return Err(Error::host_not_found(path.display().to_string()));
            }
            return resolve(path, None);
        }

        validate_host_name(&self.name)?;

        for candidate in self.candidates() {
            trace!(path = %candidate.display(), "Checking for host manifest");
            if candidate.is_file() {
                debug!(name = %self.name, path = %candidate.display(), "Host manifest found");
                return resolve(&candidate, Some(&self.name));
            }
        }

        Err(Error::host_not_found(&self.name))
    }
}

/// Parses and validates the manifest at `path`.
fn resolve(path: &Path, expected_name: Option<&str>) -> Result<ResolvedHost> {
    let manifest = HostManifest::from_file(path)?;
    manifest.validate(expected_name)?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let executable = manifest.executable(dir);

    Ok(ResolvedHost {
        manifest,
        manifest_path: path.to_path_buf(),
        executable,
    })
}

// ============================================================================
// Platform Defaults
// ============================================================================

/// Returns the native messaging directories of Chrome, Chromium and Edge.
#[must_use]
pub fn default_search_dirs() -> Vec<PathBuf> {
    #[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(unused_mut))]
    let mut found = Vec::new();

    #[cfg(target_os = "linux")]
    {
        if let Some(config) = dirs::config_dir() {
            for browser in ["google-chrome", "chromium", "microsoft-edge"] {
                found.push(config.join(browser).join("NativeMessagingHosts"));
            }
        }
        found.extend(
            [
                "/etc/opt/chrome/native-messaging-hosts",
                "/etc/chromium/native-messaging-hosts",
                "/etc/opt/edge/native-messaging-hosts",
            ]
            .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(config) = dirs::config_dir() {
            for browser in ["Google/Chrome", "Chromium", "Microsoft Edge"] {
                found.push(config.join(browser).join("NativeMessagingHosts"));
            }
        }
        found.extend(
            [
                "/Library/Google/Chrome/NativeMessagingHosts",
                "/Library/Application Support/Chromium/NativeMessagingHosts",
                "/Library/Microsoft/Edge/NativeMessagingHosts",
            ]
            .map(PathBuf::from),
        );
    }

    found
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn write_manifest(dir: &Path, file: &str, name: &str) -> PathBuf {
        let path = dir.join(file);
        let manifest = serde_json::json!({
            "name": name,
            "description": "test host",
            "path": "host-bin",
            "type": "stdio",
            "allowed_origins": [],
        });
        fs::write(&path, manifest.to_string()).expect("write manifest");
        path
    }

    #[test]
    fn test_configured_dirs_come_first() {
        let locator = HostLocator::new("com.example.host").with_search_dirs(["/first", "/second"]);
        let candidates = locator.candidates();

        assert_eq!(candidates[0], PathBuf::from("/first/com.example.host.json"));
        assert_eq!(candidates[1], PathBuf::from("/second/com.example.host.json"));
        assert_eq!(candidates.len(), 2 + default_search_dirs().len());
    }

    #[test]
    fn test_locate_in_search_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(dir.path(), "com.example.host.json", "com.example.host");

        let host = HostLocator::new("com.example.host")
            .with_search_dirs([dir.path()])
            .locate()
            .expect("locate");

        assert_eq!(host.manifest.name, "com.example.host");
        assert_eq!(host.executable, dir.path().join("host-bin"));
    }

    #[test]
    fn test_missing_manifest_is_host_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = HostLocator::new("com.example.nowhere")
            .with_search_dirs([dir.path()])
            .locate()
            .unwrap_err();

        assert!(matches!(err, Error::HostNotFound { ref name } if name == "com.example.nowhere"));
    }

    #[test]
    fn test_invalid_name_rejected_before_search() {
        let err = HostLocator::new("Bad Name").locate().unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[test]
    fn test_found_manifest_must_declare_the_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(dir.path(), "com.example.host.json", "com.example.impostor");

        let err = HostLocator::new("com.example.host")
            .with_search_dirs([dir.path()])
            .locate()
            .unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[test]
    fn test_explicit_manifest_skips_name_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(dir.path(), "manifest.json", "com.dynamics.helper.native");

        let locator = HostLocator::from_manifest(&path);
        assert_eq!(locator.name(), "manifest");
        assert_eq!(locator.candidates(), vec![path.clone()]);

        let host = locator.locate().expect("locate");
        assert_eq!(host.manifest_path, path);
    }

    #[test]
    fn test_explicit_manifest_missing() {
        let err = HostLocator::from_manifest("/nonexistent/manifest.json")
            .locate()
            .unwrap_err();
        assert!(matches!(err, Error::HostNotFound { .. }));
    }
}
