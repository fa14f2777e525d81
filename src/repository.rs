// src/repository.rs

//! Target repository layout, index model, and the repository writer
//!
//! A repository is a directory of `<name>-<version>-<build>.pkg.tar.gz`
//! archives plus an `index.json` describing every committed package. The
//! index format is stable and independently parseable: an installer reads it
//! without invoking this engine.
//!
//! Atomicity contract: archive files are fully written, fsynced, and renamed
//! into place before the index entry is committed (also via temp file +
//! rename). A reader consulting the index therefore never observes an entry
//! whose files are incomplete.

use crate::convert::{ConvertedPackage, ManifestFile, PackageIdentity};
use crate::error::{Error, Result};
use crate::hash::sha256_file;
use crate::version::Version;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Index schema version
pub const INDEX_SCHEMA: u32 = 1;

/// Index document filename inside a repository
pub const INDEX_FILE: &str = "index.json";

/// Lock file used for cross-process writer serialization
const LOCK_FILE: &str = ".wheelwright.lock";

/// One committed package in the repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub version: Version,
    pub build: String,
    /// Dependency requirement strings declared by the package
    pub depends: Vec<String>,
    /// Archive filename within the repository directory
    pub filename: String,
    /// SHA-256 of the archive
    pub sha256: String,
    /// Archive size in bytes
    pub size: u64,
    /// Per-file manifest of the package payload
    pub files: Vec<ManifestFile>,
    /// Commit timestamp
    pub converted_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
            build: self.build.clone(),
        }
    }
}

/// Durable repository index: identity key to committed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub schema: u32,
    pub packages: BTreeMap<String, IndexEntry>,
}

impl RepositoryIndex {
    fn empty() -> Self {
        Self {
            schema: INDEX_SCHEMA,
            packages: BTreeMap::new(),
        }
    }

    /// Load an index document, returning an empty index when none exists yet
    pub fn load(repo: &Path) -> Result<Self> {
        let path = repo.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Self::empty());
        }
        let raw = std::fs::read(&path)
            .map_err(|e| Error::Io(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::Parse(format!("malformed {}: {e}", path.display())))
    }

    pub fn has(&self, identity: &PackageIdentity) -> bool {
        self.packages.contains_key(&identity.key())
    }

    pub fn has_version(&self, name: &str, version: &Version) -> bool {
        self.packages
            .values()
            .any(|e| e.name == name && &e.version == version)
    }
}

/// Appends converted packages to a repository and maintains its index
///
/// Index commits serialize under an internal mutex plus an advisory file
/// lock, so concurrent writers — threads or processes — never interleave
/// index updates. Archive writes for distinct identities proceed without
/// any shared lock.
pub struct RepoWriter {
    root: PathBuf,
    lock_file: File,
    index: Mutex<RepositoryIndex>,
}

impl RepoWriter {
    /// Open (creating if needed) a repository directory for writing
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| Error::Write(format!("cannot create repository {}: {e}", root.display())))?;

        let lock_file = File::create(root.join(LOCK_FILE))
            .map_err(|e| Error::Write(format!("cannot create repository lock: {e}")))?;

        let index = RepositoryIndex::load(root)?;
        debug!(
            "Opened repository {} with {} committed packages",
            root.display(),
            index.packages.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            lock_file,
            index: Mutex::new(index),
        })
    }

    /// Repository root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an exact identity is committed
    ///
    /// Reflects only fully-committed entries: the index is updated strictly
    /// after the archive is durable.
    pub fn has(&self, identity: &PackageIdentity) -> bool {
        self.index.lock().expect("index lock poisoned").has(identity)
    }

    /// Whether any build of (name, version) is committed
    ///
    /// The conversion tree's dedup check: a different build string of the
    /// same name and version still satisfies a requirement.
    pub fn has_version(&self, name: &str, version: &Version) -> bool {
        self.index
            .lock()
            .expect("index lock poisoned")
            .has_version(name, version)
    }

    /// Dependency requirement strings recorded for a committed (name,
    /// version), from any build
    ///
    /// Lets the conversion tree keep walking the closure below packages it
    /// does not need to reconvert.
    pub fn depends_of(&self, name: &str, version: &Version) -> Option<Vec<String>> {
        self.index
            .lock()
            .expect("index lock poisoned")
            .packages
            .values()
            .find(|e| e.name == name && &e.version == version)
            .map(|e| e.depends.clone())
    }

    /// Snapshot of all committed entries, sorted by identity key
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.index
            .lock()
            .expect("index lock poisoned")
            .packages
            .values()
            .cloned()
            .collect()
    }

    /// Write one converted package: archive first, index entry second
    ///
    /// A duplicate identity is skipped, never overwritten — the first writer
    /// wins and the index never regresses. Any failure on this path is
    /// [`Error::Write`] and fatal to the session.
    pub fn write(&self, package: &ConvertedPackage) -> Result<()> {
        let identity = &package.identity;

        if self.has(identity) {
            warn!("Identity {} already committed, skipping write", identity);
            return Ok(());
        }

        let filename = format!("{}.pkg.tar.gz", identity.key());

        // Build the archive in a temp file inside the repository so the
        // final rename stays on one filesystem.
        let tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| Error::Write(format!("cannot create archive temp file: {e}")))?;
        self.build_archive(package.staged_root(), tmp.as_file())?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::Write(format!("cannot sync archive: {e}")))?;

        let size = tmp
            .as_file()
            .metadata()
            .map_err(|e| Error::Write(format!("cannot stat archive: {e}")))?
            .len();

        let final_path = self.root.join(&filename);
        let sha256 = sha256_file(tmp.path())
            .map_err(|e| Error::Write(format!("cannot hash archive: {e}")))?;
        tmp.persist(&final_path)
            .map_err(|e| Error::Write(format!("cannot place archive {filename}: {e}")))?;

        let entry = IndexEntry {
            name: identity.name.clone(),
            version: identity.version.clone(),
            build: identity.build.clone(),
            depends: package.manifest.depends.clone(),
            filename,
            sha256,
            size,
            files: package.manifest.files.clone(),
            converted_at: Utc::now(),
        };

        self.commit_entry(entry)?;
        info!("Wrote {} to repository", identity);
        Ok(())
    }

    /// Tar-gzip the staged tree into the given file
    fn build_archive(&self, staged: &Path, file: &File) -> Result<()> {
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all(".", staged)
            .map_err(|e| Error::Write(format!("cannot archive staged files: {e}")))?;
        let encoder = builder
            .into_inner()
            .map_err(|e| Error::Write(format!("cannot finish archive: {e}")))?;
        let mut file = encoder
            .finish()
            .map_err(|e| Error::Write(format!("cannot finish compression: {e}")))?;
        file.flush()
            .map_err(|e| Error::Write(format!("cannot flush archive: {e}")))?;
        Ok(())
    }

    /// Commit one index entry under the writer locks
    ///
    /// Reloads the on-disk index while holding the file lock so entries
    /// committed by other processes are preserved, then writes the merged
    /// document via temp file + rename.
    fn commit_entry(&self, entry: IndexEntry) -> Result<()> {
        let mut index = self.index.lock().expect("index lock poisoned");

        self.lock_file
            .lock_exclusive()
            .map_err(|e| Error::Write(format!("cannot lock repository: {e}")))?;

        let result = (|| {
            let mut on_disk = RepositoryIndex::load(&self.root)?;
            for (key, other) in on_disk.packages.iter() {
                if !index.packages.contains_key(key) {
                    index.packages.insert(key.clone(), other.clone());
                }
            }
            index.packages.insert(entry.identity().key(), entry);
            on_disk.packages = index.packages.clone();

            let json = serde_json::to_vec_pretty(&on_disk)
                .map_err(|e| Error::Write(format!("cannot serialize index: {e}")))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
                .map_err(|e| Error::Write(format!("cannot create index temp file: {e}")))?;
            tmp.write_all(&json)
                .map_err(|e| Error::Write(format!("cannot write index: {e}")))?;
            tmp.as_file()
                .sync_all()
                .map_err(|e| Error::Write(format!("cannot sync index: {e}")))?;
            tmp.persist(self.root.join(INDEX_FILE))
                .map_err(|e| Error::Write(format!("cannot place index: {e}")))?;
            Ok(())
        })();

        let _ = fs2::FileExt::unlock(&self.lock_file);
        result
    }

    /// Re-verify every committed archive against its recorded checksum
    ///
    /// Returns the identities whose archive is missing or corrupt.
    pub fn verify(&self) -> Result<Vec<PackageIdentity>> {
        let entries = self.entries();
        let mut bad = Vec::new();
        for entry in entries {
            let path = self.root.join(&entry.filename);
            match sha256_file(&path) {
                Ok(actual) if actual == entry.sha256 => {}
                Ok(_) | Err(_) => {
                    warn!("Archive for {} fails verification", entry.identity());
                    bad.push(entry.identity());
                }
            }
        }
        Ok(bad)
    }
}
