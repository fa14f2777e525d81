// src/lib.rs

//! Wheelwright
//!
//! Converts pip-style package trees into a native, installable package
//! repository. Given root requirements, wheelwright resolves the full
//! transitive dependency closure across ordered package indexes, converts
//! each artifact into the target archive format, and maintains a durable
//! JSON-indexed repository an installer can consume directly.
//!
//! # Architecture
//!
//! - Finder: requirement -> best-matching artifact across ordered indexes
//! - Converter: artifact -> staged package, side effects confined to a
//!   temp staging area
//! - Repository writer: staged package -> durable archive + atomic index
//!   update, files always committed before the index
//! - Conversion tree: wave-parallel orchestrator with per-session dedup
//!   and cycle protection

pub mod artifact;
pub mod convert;
mod error;
pub mod fetch;
pub mod finder;
pub mod hash;
pub mod metadata;
pub mod repository;
pub mod requirement;
pub mod tree;
pub mod version;

pub use artifact::{host_platform, ArtifactDescriptor, ArtifactKind};
pub use convert::{ConvertedPackage, Converter, PackageIdentity, PackageManifest};
pub use error::{Error, Result};
pub use fetch::{Fetcher, FileFetcher, HttpFetcher};
pub use finder::{Finder, HttpIndex, JsonIndex, PackageIndex};
pub use metadata::{read_artifact, ArtifactMetadata};
pub use repository::{IndexEntry, RepoWriter, RepositoryIndex};
pub use requirement::{normalize_name, Requirement};
pub use tree::{ConversionReport, ConvertOptions, ConvertTree};
pub use version::{Version, VersionConstraint};
