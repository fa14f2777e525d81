// src/fetch.rs

//! Artifact retrieval collaborators
//!
//! The conversion engine never talks to the network directly; it asks a
//! [`Fetcher`] for the bytes behind a locator. Failures surface as
//! [`Error::Retrieval`] and are not retried here — retry policy belongs to
//! the caller.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves raw artifact content for a locator
///
/// Implementations must be shareable across conversion workers.
pub trait Fetcher: Send + Sync {
    /// Fetch the full content behind a locator
    fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}

/// Fetcher for HTTP(S) locators using a blocking client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Create a fetcher with a caller-supplied timeout
    ///
    /// A timed-out request fails that one retrieval; it never hangs the
    /// conversion session.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Retrieval(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", locator);

        let response = self
            .client
            .get(locator)
            .send()
            .map_err(|e| Error::Retrieval(format!("request to {locator} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Retrieval(format!(
                "HTTP {} fetching {}",
                response.status(),
                locator
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Retrieval(format!("failed to read body of {locator}: {e}")))?;

        Ok(bytes.to_vec())
    }
}

/// Fetcher for local filesystem locators
///
/// Accepts plain paths and `file://` URLs; used by directory-backed indexes
/// and in tests.
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        debug!("Reading {}", path);

        std::fs::read(Path::new(path))
            .map_err(|e| Error::Retrieval(format!("cannot read {path}: {e}")))
    }
}

/// Fetcher dispatching on locator scheme
///
/// Indexes can mix HTTP locators with local paths; this routes each fetch to
/// the right backend. The CLI's default fetcher.
pub struct AutoFetcher {
    http: HttpFetcher,
}

impl AutoFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::with_timeout(timeout)?,
        })
    }
}

impl Fetcher for AutoFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            self.http.fetch(locator)
        } else {
            FileFetcher.fetch(locator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_fetcher_reads_plain_path() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"artifact bytes").unwrap();

        let bytes = FileFetcher.fetch(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(bytes, b"artifact bytes");
    }

    #[test]
    fn test_file_fetcher_strips_file_scheme() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"x").unwrap();

        let locator = format!("file://{}", tmp.path().display());
        assert_eq!(FileFetcher.fetch(&locator).unwrap(), b"x");
    }

    #[test]
    fn test_file_fetcher_missing_path_is_retrieval_error() {
        let err = FileFetcher.fetch("/does/not/exist.tar.gz").unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
    }
}
