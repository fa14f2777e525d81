// src/artifact.rs

//! Artifact descriptions returned by the finder
//!
//! An artifact is one versioned, retrievable unit on a source index: either
//! a prebuilt wheel or a source distribution. Descriptors are ephemeral;
//! the converter consumes them immediately.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of source artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Prebuilt artifact, installable without a build step
    Wheel,
    /// Source distribution, may require a build step to convert
    Sdist,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wheel => write!(f, "wheel"),
            Self::Sdist => write!(f, "sdist"),
        }
    }
}

/// A single candidate artifact on an index
///
/// `locator` is whatever the index's fetcher understands: a URL for HTTP
/// indexes, a path for directory indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Normalized package name
    pub name: String,
    /// Concrete version
    pub version: Version,
    /// Name of the index this artifact came from
    pub index: String,
    /// Retrieval locator understood by the fetcher
    pub locator: String,
    /// Prebuilt or source form
    pub kind: ArtifactKind,
    /// Platform compatibility tag ("any", "linux-x86_64", ...)
    pub platform: String,
    /// Expected SHA-256 of the artifact content, when the index declares one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArtifactDescriptor {
    /// Check whether this artifact can run on the given target platform
    ///
    /// "any" artifacts are compatible with every platform, mirroring how
    /// noarch packages behave in binary ecosystems.
    pub fn is_platform_compatible(&self, target: &str) -> bool {
        self.platform == "any" || self.platform == target
    }
}

/// Detect the platform tag of the running host, used as the default target
pub fn host_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}
