//! Native host discovery.
//!
//! Locates the host's manifest by its logical name and validates it the
//! way a browser would before spawning the host.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HostManifest`] | Parsed `{name, description, path, type, allowed_origins}` |
//! | [`HostLocator`] | Searches configured and platform directories |
//! | [`ResolvedHost`] | Manifest plus the executable to spawn |

// ============================================================================
// Submodules
// ============================================================================

/// Manifest discovery.
pub mod locator;

/// Manifest parsing and validation.
pub mod manifest;

// ============================================================================
// Re-exports
// ============================================================================

pub use locator::{HostLocator, ResolvedHost, default_search_dirs};
pub use manifest::{HostManifest, HostType, validate_host_name};

// ============================================================================
// Constants
// ============================================================================

/// Logical name the analysis host registers under.
pub const DEFAULT_HOST_NAME: &str = "com.dynamics.helper.native";
