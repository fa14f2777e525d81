// src/metadata.rs

//! Artifact metadata inspection
//!
//! Source artifacts are gzip tarballs carrying a `metadata.json` document at
//! the archive root next to their payload files. This module unpacks an
//! artifact and extracts the authoritative name, version, and declared
//! dependency requirements, including named extras. Any structural or parse
//! failure is an [`Error::UnsupportedArtifact`]: content we cannot interpret
//! cannot be converted.

use crate::error::{Error, Result};
use crate::requirement::{Requirement, normalize_name};
use crate::version::Version;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use tar::Archive;
use tracing::warn;

/// Filename of the metadata document inside an artifact
pub const METADATA_FILE: &str = "metadata.json";

/// Declared metadata of one artifact, as parsed from `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Declared package name (normalized on access, authoritative over the
    /// index's spelling)
    pub name: String,
    /// Declared concrete version
    pub version: String,
    /// Dependency requirement strings always needed at runtime
    #[serde(default)]
    pub requires: Vec<String>,
    /// Optional-dependency groups: extra name to requirement strings
    #[serde(default)]
    pub extras: BTreeMap<String, Vec<String>>,
    /// Build backend for source distributions; absent or "none" means the
    /// payload installs by plain copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_backend: Option<String>,
}

impl ArtifactMetadata {
    /// Normalized package name
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Parsed version
    pub fn parsed_version(&self) -> Result<Version> {
        Version::parse(&self.version)
    }

    /// Whether the payload can be repackaged without running a build step
    pub fn installs_by_copy(&self) -> bool {
        match self.build_backend.as_deref() {
            None | Some("none") => true,
            Some(_) => false,
        }
    }

    /// Resolve the full dependency requirement list for the requested extras
    ///
    /// Base requirements always apply; each requested extra contributes its
    /// group. Unknown extras are logged and ignored, matching the source
    /// ecosystem's installer behavior.
    pub fn requirements_for(&self, requested_extras: &[String]) -> Result<Vec<Requirement>> {
        let mut out = Vec::with_capacity(self.requires.len());
        for spec in &self.requires {
            out.push(Requirement::parse(spec).map_err(|e| {
                Error::UnsupportedArtifact(format!(
                    "{}-{} declares malformed requirement '{}': {}",
                    self.name, self.version, spec, e
                ))
            })?);
        }

        for extra in requested_extras {
            let key = normalize_name(extra);
            match self.extras.get(&key) {
                Some(specs) => {
                    for spec in specs {
                        out.push(Requirement::parse(spec).map_err(|e| {
                            Error::UnsupportedArtifact(format!(
                                "{}-{} extra '{}' declares malformed requirement '{}': {}",
                                self.name, self.version, key, spec, e
                            ))
                        })?);
                    }
                }
                None => {
                    warn!(
                        "Package {}-{} has no extra '{}', ignoring",
                        self.name, self.version, key
                    );
                }
            }
        }

        Ok(out)
    }
}

/// A payload file extracted from an artifact
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub path: String,
    pub content: Vec<u8>,
    pub mode: u32,
}

/// Fully unpacked artifact: declared metadata plus payload files
#[derive(Debug)]
pub struct ArtifactContents {
    pub metadata: ArtifactMetadata,
    pub files: Vec<ExtractedFile>,
}

/// Unpack an artifact archive and parse its metadata document
///
/// The metadata file itself is not part of the payload; every other regular
/// file in the archive is.
pub fn read_artifact(bytes: &[u8]) -> Result<ArtifactContents> {
    let mut archive = Archive::new(GzDecoder::new(bytes));

    let mut metadata: Option<ArtifactMetadata> = None;
    let mut files = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::UnsupportedArtifact(format!("not a gzip tarball: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::UnsupportedArtifact(format!("corrupt archive entry: {e}")))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| Error::UnsupportedArtifact(format!("bad entry path: {e}")))?
            .to_string_lossy()
            .trim_start_matches("./")
            .to_string();

        // The declared entry size comes from untrusted bytes; cap the
        // pre-allocation and let the read grow the buffer as needed.
        let mut content = Vec::with_capacity((entry.size() as usize).min(64 * 1024));
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::UnsupportedArtifact(format!("truncated entry '{path}': {e}")))?;

        if path == METADATA_FILE {
            metadata = Some(serde_json::from_slice(&content).map_err(|e| {
                Error::UnsupportedArtifact(format!("malformed {METADATA_FILE}: {e}"))
            })?);
        } else {
            let mode = entry.header().mode().unwrap_or(0o644);
            files.push(ExtractedFile {
                path,
                content,
                mode,
            });
        }
    }

    let metadata = metadata.ok_or_else(|| {
        Error::UnsupportedArtifact(format!("archive contains no {METADATA_FILE}"))
    })?;

    if metadata.name.is_empty() {
        return Err(Error::UnsupportedArtifact(
            "metadata declares an empty package name".to_string(),
        ));
    }
    metadata
        .parsed_version()
        .map_err(|e| Error::UnsupportedArtifact(format!("metadata version unusable: {e}")))?;

    Ok(ArtifactContents { metadata, files })
}
