// src/finder.rs

//! Package finding across ordered indexes
//!
//! The finder resolves a requirement to the single best-matching artifact.
//! Indexes are consulted in order; later entries are fallback sources used
//! only when earlier ones yield no compatible candidate. Selection within
//! an index is deterministic for a fixed index state:
//! highest version first, wheels over sdists at equal versions, locator
//! string as the stable tie-breaker.

use crate::artifact::{ArtifactDescriptor, ArtifactKind};
use crate::error::{Error, Result};
use crate::requirement::{Requirement, normalize_name};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// A queryable source of artifact candidates
///
/// Read-only: `candidates` must not mutate observable index state, and any
/// internal caching must be invisible for a fixed index state.
pub trait PackageIndex: Send + Sync {
    /// Human-readable index name for diagnostics and descriptors
    fn name(&self) -> &str;

    /// All artifacts published under a normalized package name
    fn candidates(&self, name: &str) -> Result<Vec<ArtifactDescriptor>>;
}

/// On-disk / on-wire index document (`index.json`)
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexDocument {
    pub name: String,
    pub artifacts: Vec<IndexArtifact>,
}

/// One artifact entry in an index document
///
/// `locator` may be relative; each index implementation resolves it against
/// its own base (directory or URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub name: String,
    pub version: Version,
    pub kind: ArtifactKind,
    #[serde(default = "default_platform")]
    pub platform: String,
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

fn default_platform() -> String {
    "any".to_string()
}

/// Index backed by a local directory containing `index.json`
///
/// Relative locators resolve against the directory, so artifact files can
/// live alongside the document.
#[derive(Debug)]
pub struct JsonIndex {
    name: String,
    dir: PathBuf,
    artifacts: Vec<IndexArtifact>,
}

impl JsonIndex {
    /// Open a directory index, reading and validating its `index.json`
    pub fn open(dir: &Path) -> Result<Self> {
        let doc_path = dir.join("index.json");
        let raw = std::fs::read(&doc_path)
            .map_err(|e| Error::Io(format!("cannot read {}: {e}", doc_path.display())))?;
        let doc: IndexDocument = serde_json::from_slice(&raw)
            .map_err(|e| Error::Parse(format!("malformed {}: {e}", doc_path.display())))?;

        Ok(Self {
            name: doc.name,
            dir: dir.to_path_buf(),
            artifacts: doc.artifacts,
        })
    }

    fn resolve_locator(&self, locator: &str) -> String {
        if locator.contains("://") || Path::new(locator).is_absolute() {
            locator.to_string()
        } else {
            self.dir.join(locator).to_string_lossy().into_owned()
        }
    }
}

impl PackageIndex for JsonIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, name: &str) -> Result<Vec<ArtifactDescriptor>> {
        Ok(self
            .artifacts
            .iter()
            .filter(|a| normalize_name(&a.name) == name)
            .map(|a| ArtifactDescriptor {
                name: normalize_name(&a.name),
                version: a.version.clone(),
                index: self.name.clone(),
                locator: self.resolve_locator(&a.locator),
                kind: a.kind,
                platform: a.platform.clone(),
                sha256: a.sha256.clone(),
            })
            .collect())
    }
}

/// Index backed by an `index.json` document fetched over HTTP
///
/// The document is fetched once per instance and cached; the cache is a pure
/// performance optimization and cannot change results for a fixed remote
/// state.
pub struct HttpIndex {
    name: String,
    base: Url,
    client: reqwest::blocking::Client,
    cached: Mutex<Option<Vec<IndexArtifact>>>,
}

impl HttpIndex {
    /// Create an HTTP index rooted at `base_url` with a caller-supplied
    /// timeout for document fetches
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::Parse(format!("invalid index URL '{base_url}': {e}")))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Io(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            base,
            client,
            cached: Mutex::new(None),
        })
    }

    fn load(&self) -> Result<Vec<IndexArtifact>> {
        let mut cached = self.cached.lock().expect("index cache lock poisoned");
        if let Some(artifacts) = cached.as_ref() {
            return Ok(artifacts.clone());
        }

        let doc_url = self
            .base
            .join("index.json")
            .map_err(|e| Error::Parse(format!("cannot build index URL: {e}")))?;
        debug!("Fetching index document from {}", doc_url);

        let response = self
            .client
            .get(doc_url.clone())
            .send()
            .map_err(|e| Error::Io(format!("index fetch from {doc_url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Io(format!(
                "HTTP {} fetching index {doc_url}",
                response.status()
            )));
        }
        let doc: IndexDocument = response
            .json()
            .map_err(|e| Error::Parse(format!("malformed index document at {doc_url}: {e}")))?;

        *cached = Some(doc.artifacts.clone());
        Ok(doc.artifacts)
    }

    fn resolve_locator(&self, locator: &str) -> String {
        if locator.contains("://") {
            locator.to_string()
        } else {
            self.base
                .join(locator)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| locator.to_string())
        }
    }
}

impl PackageIndex for HttpIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, name: &str) -> Result<Vec<ArtifactDescriptor>> {
        Ok(self
            .load()?
            .iter()
            .filter(|a| normalize_name(&a.name) == name)
            .map(|a| ArtifactDescriptor {
                name: normalize_name(&a.name),
                version: a.version.clone(),
                index: self.name.clone(),
                locator: self.resolve_locator(&a.locator),
                kind: a.kind,
                platform: a.platform.clone(),
                sha256: a.sha256.clone(),
            })
            .collect())
    }
}

/// Resolves requirements to best-matching artifacts
///
/// Pure lookup: no mutation, reproducible results against the same index
/// state.
pub struct Finder {
    /// Target platform tag candidates must be compatible with
    platform: String,
}

impl Finder {
    /// Create a finder selecting artifacts for the given target platform
    pub fn new(platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
        }
    }

    /// Find the single best artifact satisfying a requirement
    ///
    /// Searches indexes in order and selects within the first index that
    /// yields any compatible candidate. Fails with [`Error::NoMatch`] when
    /// no index satisfies the requirement — an expected outcome for
    /// unresolvable requirements. An index that fails to answer (e.g. a
    /// timed-out document fetch) is skipped with a warning; it contributes
    /// no candidates.
    pub fn find_best_match(
        &self,
        requirement: &Requirement,
        indexes: &[Box<dyn PackageIndex>],
    ) -> Result<ArtifactDescriptor> {
        for index in indexes {
            let candidates = match index.candidates(requirement.name()) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Index '{}' failed to answer: {}", index.name(), e);
                    continue;
                }
            };

            let mut matching: Vec<ArtifactDescriptor> = candidates
                .into_iter()
                .filter(|a| requirement.constraint().satisfies(&a.version))
                .filter(|a| a.is_platform_compatible(&self.platform))
                .collect();

            if matching.is_empty() {
                debug!(
                    "No match for '{}' in index '{}', trying next",
                    requirement,
                    index.name()
                );
                continue;
            }

            matching.sort_by(|a, b| Self::preference(a, b));
            let best = matching.swap_remove(0);
            debug!(
                "Selected {}-{} ({}) from index '{}' for '{}'",
                best.name, best.version, best.kind, best.index, requirement
            );
            return Ok(best);
        }

        Err(Error::NoMatch(requirement.to_string()))
    }

    /// Candidate ordering: best first
    ///
    /// Highest version, then prebuilt over source (a wheel avoids a build
    /// step downstream), then locator string for a stable, reproducible
    /// order.
    fn preference(a: &ArtifactDescriptor, b: &ArtifactDescriptor) -> Ordering {
        b.version
            .cmp(&a.version)
            .then_with(|| match (a.kind, b.kind) {
                (ArtifactKind::Wheel, ArtifactKind::Sdist) => Ordering::Less,
                (ArtifactKind::Sdist, ArtifactKind::Wheel) => Ordering::Greater,
                _ => Ordering::Equal,
            })
            .then_with(|| a.locator.cmp(&b.locator))
    }
}
