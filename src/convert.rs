// src/convert.rs

//! Artifact to target-format conversion
//!
//! Takes one [`ArtifactDescriptor`], retrieves its content, inspects the
//! declared metadata, and repackages the payload into the target layout:
//! a staged directory holding `pkg/` (payload files) and
//! `info/manifest.json`. The repository writer later archives the staged
//! tree into the durable repository.
//!
//! The converter is a pure transformation apart from its private staging
//! area: it never consults or touches the repository index.

use crate::artifact::{ArtifactDescriptor, ArtifactKind};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::hash::{sha256_hex, verify_sha256};
use crate::metadata::{ArtifactContents, read_artifact};
use crate::requirement::Requirement;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Manifest schema version written into `info/manifest.json`
pub const MANIFEST_SCHEMA: u32 = 1;

/// The (name, version, build) tuple uniquely identifying a converted
/// package within a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: Version,
    pub build: String,
}

impl PackageIdentity {
    /// Canonical `name-version-build` key used for index entries and
    /// archive filenames
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One payload file recorded in a package manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    pub mode: u32,
}

/// Machine-readable package manifest (`info/manifest.json`)
///
/// Stable and independently parseable: an installer consumes this without
/// invoking the conversion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManifest {
    pub schema: u32,
    pub name: String,
    pub version: Version,
    pub build: String,
    pub depends: Vec<String>,
    pub files: Vec<ManifestFile>,
}

/// A converted package staged for writing
///
/// Owned exclusively by the conversion tree until handed to the repository
/// writer; the staging directory is removed when this value drops.
#[derive(Debug)]
pub struct ConvertedPackage {
    pub identity: PackageIdentity,
    /// Dependency requirements declared by the artifact, with requested
    /// extras already resolved in
    pub depends: Vec<Requirement>,
    pub manifest: PackageManifest,
    staging: TempDir,
}

impl ConvertedPackage {
    /// Root of the staged tree (`pkg/` + `info/manifest.json`)
    pub fn staged_root(&self) -> &Path {
        self.staging.path()
    }
}

/// Converts source artifacts into the target package format
pub struct Converter {
    fetcher: Arc<dyn Fetcher>,
}

impl Converter {
    /// Create a converter retrieving content through the given fetcher
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Convert one artifact, resolving the originating requirement's extras
    /// into additional dependency requirements
    pub fn convert(
        &self,
        descriptor: &ArtifactDescriptor,
        requested_extras: &[String],
    ) -> Result<ConvertedPackage> {
        let bytes = self.fetcher.fetch(&descriptor.locator)?;

        if let Some(expected) = &descriptor.sha256 {
            verify_sha256(&bytes, expected).map_err(|e| {
                Error::Retrieval(format!("checksum failure for {}: {e}", descriptor.locator))
            })?;
        }

        let contents = read_artifact(&bytes)?;

        // Exhaustive over artifact kind: wheels repackage directly, sdists
        // only when their metadata declares no build step.
        match descriptor.kind {
            ArtifactKind::Wheel => {}
            ArtifactKind::Sdist => {
                if !contents.metadata.installs_by_copy() {
                    return Err(Error::UnsupportedArtifact(format!(
                        "{}-{} is a source distribution requiring build backend '{}'",
                        contents.metadata.name,
                        contents.metadata.version,
                        contents.metadata.build_backend.as_deref().unwrap_or("?")
                    )));
                }
            }
        }

        // Declared metadata is authoritative over the index's spelling
        let name = contents.metadata.normalized_name();
        let version = contents.metadata.parsed_version()?;
        if name != descriptor.name || version != descriptor.version {
            warn!(
                "Index listed {}-{} but artifact declares {}-{}, trusting the artifact",
                descriptor.name, descriptor.version, name, version
            );
        }

        // Build string is deterministic for identical input content, so
        // reconverting the same artifact yields the same identity.
        let fingerprint = sha256_hex(&bytes);
        let build = format!("h{}_0", &fingerprint[..7]);
        let identity = PackageIdentity {
            name,
            version,
            build,
        };

        let depends = contents.metadata.requirements_for(requested_extras)?;

        let package = self.stage(&identity, &depends, &contents)?;
        debug!(
            "Converted {} ({} files, {} dependencies)",
            identity,
            contents.files.len(),
            depends.len()
        );

        Ok(package)
    }

    /// Write the repackaged payload and manifest into a fresh staging area
    fn stage(
        &self,
        identity: &PackageIdentity,
        depends: &[Requirement],
        contents: &ArtifactContents,
    ) -> Result<ConvertedPackage> {
        let staging = TempDir::new()
            .map_err(|e| Error::Io(format!("cannot create staging area: {e}")))?;
        let pkg_dir = staging.path().join("pkg");
        let info_dir = staging.path().join("info");
        std::fs::create_dir_all(&pkg_dir)?;
        std::fs::create_dir_all(&info_dir)?;

        let mut manifest_files = Vec::with_capacity(contents.files.len());
        for file in &contents.files {
            // Payload paths are archive-relative; refuse anything escaping
            // the package root.
            let rel = Path::new(&file.path);
            if rel.is_absolute() || rel.components().any(|c| c.as_os_str() == "..") {
                return Err(Error::UnsupportedArtifact(format!(
                    "artifact path escapes package root: {}",
                    file.path
                )));
            }

            let dest = pkg_dir.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, &file.content)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(file.mode))?;
            }

            manifest_files.push(ManifestFile {
                path: file.path.clone(),
                size: file.content.len() as u64,
                sha256: sha256_hex(&file.content),
                mode: file.mode,
            });
        }

        let manifest = PackageManifest {
            schema: MANIFEST_SCHEMA,
            name: identity.name.clone(),
            version: identity.version.clone(),
            build: identity.build.clone(),
            depends: depends.iter().map(ToString::to_string).collect(),
            files: manifest_files,
        };

        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        std::fs::write(info_dir.join("manifest.json"), manifest_json)?;

        Ok(ConvertedPackage {
            identity: identity.clone(),
            depends: depends.to_vec(),
            manifest,
            staging,
        })
    }
}
