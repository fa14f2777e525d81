// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use wheelwright::hash::sha256_hex;
use wheelwright::{Fetcher, FileFetcher, Result};

/// Builder for synthetic source artifacts: a gzip tarball with a
/// `metadata.json` document plus payload files.
pub struct TestArtifact {
    pub name: String,
    pub version: String,
    requires: Vec<String>,
    extras: BTreeMap<String, Vec<String>>,
    build_backend: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl TestArtifact {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            requires: Vec::new(),
            extras: BTreeMap::new(),
            build_backend: None,
            files: vec![(format!("{name}/__init__.py"), format!("# {name}").into_bytes())],
        }
    }

    pub fn requires(mut self, spec: &str) -> Self {
        self.requires.push(spec.to_string());
        self
    }

    pub fn extra(mut self, name: &str, specs: &[&str]) -> Self {
        self.extras
            .insert(name.to_string(), specs.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build_backend(mut self, backend: &str) -> Self {
        self.build_backend = Some(backend.to_string());
        self
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    /// Serialize to tar.gz bytes
    pub fn build(&self) -> Vec<u8> {
        let mut meta = serde_json::json!({
            "name": self.name,
            "version": self.version,
            "requires": self.requires,
            "extras": self.extras,
        });
        if let Some(backend) = &self.build_backend {
            meta["build_backend"] = serde_json::json!(backend);
        }
        let meta = serde_json::to_vec(&meta).unwrap();

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut add = |path: &str, content: &[u8]| {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content).unwrap();
        };
        add("metadata.json", &meta);
        for (path, content) in &self.files {
            add(path, content);
        }

        builder.into_inner().unwrap().finish().unwrap()
    }
}

/// Builds a directory-backed package index: artifact tarballs plus an
/// `index.json` document listing them.
pub struct TestIndex {
    pub dir: PathBuf,
    name: String,
    entries: Vec<serde_json::Value>,
}

impl TestIndex {
    pub fn create(root: &Path, name: &str) -> Self {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        Self {
            dir,
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Add a wheel artifact for the "any" platform with a checksum
    pub fn add_wheel(&mut self, artifact: &TestArtifact) {
        self.add(artifact, "wheel", "any", true);
    }

    /// Add a source distribution for the "any" platform with a checksum
    pub fn add_sdist(&mut self, artifact: &TestArtifact) {
        self.add(artifact, "sdist", "any", true);
    }

    pub fn add(&mut self, artifact: &TestArtifact, kind: &str, platform: &str, checksum: bool) {
        let bytes = artifact.build();
        let filename = format!("{}-{}-{}.tar.gz", artifact.name, artifact.version, kind);
        std::fs::write(self.dir.join(&filename), &bytes).unwrap();

        let mut entry = serde_json::json!({
            "name": artifact.name,
            "version": artifact.version,
            "kind": kind,
            "platform": platform,
            "locator": filename,
        });
        if checksum {
            entry["sha256"] = serde_json::json!(sha256_hex(&bytes));
        }
        self.entries.push(entry);
    }

    /// Write `index.json`; call after the last add
    pub fn finish(&self) {
        let doc = serde_json::json!({
            "name": self.name,
            "artifacts": self.entries,
        });
        std::fs::write(
            self.dir.join("index.json"),
            serde_json::to_vec_pretty(&doc).unwrap(),
        )
        .unwrap();
    }
}

/// Local-file fetcher that counts how many artifacts were retrieved
pub struct CountingFetcher {
    count: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        self.count.fetch_add(1, Ordering::SeqCst);
        FileFetcher.fetch(locator)
    }
}
