// src/version.rs

//! Version handling and constraint satisfaction for pip-style versions
//!
//! Parses dotted version strings as they appear on package indexes and
//! evaluates the constraint operators used in requirement strings
//! (`==`, `!=`, `>`, `>=`, `<`, `<=`, comma-joined conjunctions).

use crate::error::{Error, Result};
use semver::Version as SemVersion;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A parsed package version
///
/// Source-ecosystem versions are not guaranteed to be semver-compliant
/// ("1.0", "2.0.1.post1"), so comparison uses semver where the string parses
/// and falls back to numeric segment-wise comparison otherwise.
///
/// Equality follows the same padded comparison as ordering: "1.0" and
/// "1.0.0" are the same version. `Hash` matches via a canonical segment
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Version(String);

impl Version {
    /// Parse a version string
    ///
    /// Accepts any non-empty dotted string whose first segment is numeric:
    /// - "1.0" and "1.2.3" parse
    /// - "1.9.post2" parses (suffix segments compared lexicographically)
    /// - "" and "not-a-version" are rejected
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersion("empty version string".to_string()));
        }
        let first = s.split('.').next().unwrap_or("");
        if first.parse::<u64>().is_err() {
            return Err(Error::InvalidVersion(format!(
                "version '{}' does not start with a numeric segment",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// The original version string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to a semver::Version for comparison
    ///
    /// Pads missing components with zeros ("1.9" compares as 1.9.0).
    fn to_semver(&self) -> Option<SemVersion> {
        if let Ok(v) = SemVersion::parse(&self.0) {
            return Some(v);
        }
        let parts: Vec<&str> = self.0.split('.').collect();
        let major = parts.first()?.parse::<u64>().ok()?;
        let minor = parts.get(1).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        let patch = parts.get(2).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        // Only trust the padded form for up to three all-numeric segments;
        // suffixed ("1.0.post1") and longer ("1.2.3.4") versions go through
        // segment comparison.
        if parts.len() <= 3 && parts.iter().all(|p| p.parse::<u64>().is_ok()) {
            Some(SemVersion::new(major, minor, patch))
        } else {
            None
        }
    }

    /// Compare segment-wise: numeric segments numerically, the rest
    /// lexicographically, missing segments count as zero
    fn compare_segments(&self, other: &Version) -> Ordering {
        let a: Vec<&str> = self.0.split('.').collect();
        let b: Vec<&str> = other.0.split('.').collect();
        let len = a.len().max(b.len());

        for i in 0..len {
            let sa = a.get(i).copied().unwrap_or("0");
            let sb = b.get(i).copied().unwrap_or("0");
            let ord = match (sa.parse::<u64>(), sb.parse::<u64>()) {
                (Ok(na), Ok(nb)) => na.cmp(&nb),
                _ => sa.cmp(sb),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.to_semver(), other.to_semver()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.compare_segments(other),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality must agree with Ord, which zero-pads: "1.0" == "1.0.0".
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Canonical segment form: numeric segments lose leading zeros,
        // trailing zero segments drop, so equal versions hash identically.
        let mut segments: Vec<String> = self
            .0
            .split('.')
            .map(|s| match s.parse::<u64>() {
                Ok(n) => n.to_string(),
                Err(_) => s.to_string(),
            })
            .collect();
        while segments.last().map(String::as_str) == Some("0") {
            segments.pop();
        }
        segments.hash(state);
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Version::parse(&s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match
    Exact(Version),
    /// Not equal
    NotEqual(Version),
    /// Greater than
    GreaterThan(Version),
    /// Greater than or equal
    GreaterOrEqual(Version),
    /// Less than
    LessThan(Version),
    /// Less than or equal
    LessOrEqual(Version),
    /// Both constraints must be satisfied (for ranges like ">=1.0,<2.0")
    And(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a constraint string
    ///
    /// Examples:
    /// - "" or "*" → Any
    /// - "==1.5.0" → Exact(1.5.0)
    /// - ">=1.0,<2.0" → And(GreaterOrEqual(1.0), LessThan(2.0))
    /// - ">=1.0,<2.0,!=1.5" folds left into nested And
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        // Comma-joined conjunctions fold left
        if s.contains(',') {
            let mut parts = s.split(',').map(str::trim);
            let mut acc = Self::parse_single(parts.next().unwrap_or(""))?;
            for part in parts {
                let next = Self::parse_single(part)?;
                acc = VersionConstraint::And(Box::new(acc), Box::new(next));
            }
            return Ok(acc);
        }

        Self::parse_single(s)
    }

    fn parse_single(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionConstraint::GreaterOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionConstraint::LessOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("==") {
            Ok(VersionConstraint::Exact(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionConstraint::NotEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionConstraint::GreaterThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionConstraint::LessThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Ok(VersionConstraint::Exact(Version::parse(rest)?))
        } else {
            // Bare version means exact match
            Ok(VersionConstraint::Exact(Version::parse(s)?))
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::NotEqual(v) => version != v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::And(a, b) => a.satisfies(version) && b.satisfies(version),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "=={}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!={}", v),
            VersionConstraint::GreaterThan(v) => write!(f, ">{}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionConstraint::LessThan(v) => write!(f, "<{}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<={}", v),
            VersionConstraint::And(a, b) => write!(f, "{},{}", a, b),
        }
    }
}
