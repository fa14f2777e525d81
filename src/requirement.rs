// src/requirement.rs

//! Requirement parsing and normalization
//!
//! A requirement is what a caller (or a converted package's dependency list)
//! asks for: a package name, an optional version constraint, and optional
//! extras. Requirement strings follow the pip grammar:
//! `name`, `name==1.0`, `name>=1.0,<2.0`, `name[extra1,extra2]>=1.0`.

use crate::error::{Error, Result};
use crate::version::VersionConstraint;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A requested package: name, optional constraint, optional extras
///
/// Immutable once created. Names are normalized on construction
/// (lowercased, `_` and `.` collapsed to `-`) so that `Foo_Bar` and
/// `foo-bar` refer to the same package, matching source-ecosystem rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    name: String,
    constraint: VersionConstraint,
    extras: Vec<String>,
}

/// Normalize a package name: lowercase, runs of `-`, `_`, `.` become `-`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c == '-' || c == '_' || c == '.' {
            if !last_dash {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.push(c);
            last_dash = false;
        }
    }
    out
}

fn requirement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // name [extras] constraint-rest
        Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)(?:\[([^\]]*)\])?\s*(.*)$")
            .expect("requirement grammar regex is valid")
    })
}

impl Requirement {
    /// Create a requirement from already-parsed parts
    pub fn new(name: &str, constraint: VersionConstraint, extras: Vec<String>) -> Self {
        Self {
            name: normalize_name(name),
            constraint,
            extras: extras.into_iter().map(|e| normalize_name(&e)).collect(),
        }
    }

    /// Create an unconstrained requirement for a name
    pub fn any(name: &str) -> Self {
        Self::new(name, VersionConstraint::Any, Vec::new())
    }

    /// Parse a pip-style requirement string
    ///
    /// Examples: `requests`, `requests==2.31`, `urllib3>=1.26,<3`,
    /// `twine[gpg]>=5.0`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Parse("empty requirement string".to_string()));
        }

        let caps = requirement_re()
            .captures(s)
            .ok_or_else(|| Error::Parse(format!("malformed requirement '{}'", s)))?;

        let name = caps.get(1).map_or("", |m| m.as_str());
        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let constraint = VersionConstraint::parse(caps.get(3).map_or("", |m| m.as_str()))?;

        Ok(Self::new(name, constraint, extras))
    }

    /// Normalized package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version constraint (Any when unconstrained)
    pub fn constraint(&self) -> &VersionConstraint {
        &self.constraint
    }

    /// Requested extras (normalized)
    pub fn extras(&self) -> &[String] {
        &self.extras
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if self.constraint != VersionConstraint::Any {
            write!(f, "{}", self.constraint)?;
        }
        Ok(())
    }
}
