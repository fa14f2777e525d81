// src/hash.rs

//! SHA-256 helpers for content fingerprints and archive checksums
//!
//! Build strings are derived from artifact content hashes, and the
//! repository index records an archive checksum per entry, so hashing is
//! centralized here.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

/// Compute the SHA-256 of a byte slice as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 of a reader's content, streaming in 8 KiB blocks
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA-256 of a file on disk
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    sha256_reader(&mut file)
}

/// Checksum mismatch detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sha256 mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for ChecksumMismatch {}

/// Verify bytes against an expected SHA-256 hex string (case-insensitive)
pub fn verify_sha256(data: &[u8], expected: &str) -> Result<(), ChecksumMismatch> {
    let actual = sha256_hex(data);
    if actual == expected.to_lowercase() {
        Ok(())
    } else {
        Err(ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_reader_matches_bytes() {
        let data = b"Hello, World!";
        let mut cursor = std::io::Cursor::new(data);
        assert_eq!(sha256_reader(&mut cursor).unwrap(), sha256_hex(data));
    }

    #[test]
    fn test_verify_case_insensitive() {
        let data = b"test";
        let lower = sha256_hex(data);
        assert!(verify_sha256(data, &lower).is_ok());
        assert!(verify_sha256(data, &lower.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_mismatch_reports_both_sides() {
        let wrong = "0".repeat(64);
        let err = verify_sha256(b"hello", &wrong).unwrap_err();
        assert_eq!(err.expected, wrong);
        assert_eq!(err.actual, sha256_hex(b"hello"));
    }
}
