// src/tree.rs

//! Transitive conversion tree
//!
//! Drives Finder -> Converter -> RepoWriter over the full dependency closure
//! of a set of root requirements. The walk is breadth-first in waves: each
//! wave's find + fetch + convert runs in parallel on a bounded rayon pool,
//! while visited-set admission and work-queue updates happen serially under
//! the session lock. That lock is what guarantees an identity converts at
//! most once even when several parents discover the same dependency in the
//! same wave.

use crate::artifact::host_platform;
use crate::convert::{ConvertedPackage, Converter, PackageIdentity};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::finder::{Finder, PackageIndex};
use crate::repository::RepoWriter;
use crate::requirement::Requirement;
use crate::version::Version;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Tunables for one conversion tree
///
/// Explicit options only; nothing here is read from the environment.
/// Network timeouts are supplied where the network collaborators are
/// constructed (`HttpIndex`, `HttpFetcher`), not here.
#[derive(Clone)]
pub struct ConvertOptions {
    /// Skip the already-in-repository dedup check so every reachable package
    /// converts fresh. Benchmarking and testing only.
    pub defeat_cache: bool,
    /// Abort the session on the first unsatisfied requirement instead of
    /// recording it and continuing
    pub fail_fast: bool,
    /// Worker pool size; `None` uses rayon's default
    pub workers: Option<usize>,
    /// Target platform tag candidates must be compatible with
    pub platform: String,
    /// Cooperative cancellation flag: checked between waves and before each
    /// unit of work. In-flight conversions finish; the repository stays
    /// consistent and a later session resumes from it.
    pub cancel: Arc<AtomicBool>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            defeat_cache: false,
            fail_fast: false,
            workers: None,
            platform: host_platform(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A requirement the session could not satisfy, with the error that stopped it
#[derive(Debug)]
pub struct ConversionFailure {
    pub requirement: Requirement,
    pub error: Error,
}

/// Outcome of one conversion tree session
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Identities converted and written during this session
    pub converted: Vec<PackageIdentity>,
    /// (name, version) pairs already present in the repository and skipped
    pub already_present: Vec<(String, Version)>,
    /// Requirements that could not be satisfied anywhere
    pub unsatisfied: Vec<ConversionFailure>,
    /// Whether the session stopped early on the cancellation flag
    pub cancelled: bool,
}

impl ConversionReport {
    /// Whether every reachable requirement was satisfied
    pub fn is_complete(&self) -> bool {
        self.unsatisfied.is_empty() && !self.cancelled
    }
}

/// Per-session walk state, shared across workers behind a mutex
///
/// `visited` is keyed by resolved (normalized name, version, requested
/// extras): the admission check reserves the key before converting, so
/// cycles terminate and diamond dependencies convert exactly once, while a
/// request for different extras of an already-seen package still resolves
/// that extra group's requirements. Discarded when the session returns.
struct ConversionSession {
    visited: HashSet<(String, Version, String)>,
    seen_requirements: HashSet<String>,
}

impl ConversionSession {
    fn new() -> Self {
        Self {
            visited: HashSet::new(),
            seen_requirements: HashSet::new(),
        }
    }
}

/// What one unit of wave work produced
enum Outcome {
    /// Converted and durably written; dependencies still need enqueueing
    Converted(ConvertedPackage),
    /// Some build of this (name, version) already satisfies the requirement;
    /// its recorded dependencies still extend the closure
    AlreadyPresent(String, Version, Vec<Requirement>),
    /// Another worker holds this identity, or the session was cancelled
    Skipped,
    /// The requirement cannot be satisfied
    Failed(Requirement, Error),
}

/// Canonical form of a requested extras list for visited-set keys
fn extras_key(extras: &[String]) -> String {
    let mut extras: Vec<&str> = extras.iter().map(String::as_str).collect();
    extras.sort_unstable();
    extras.dedup();
    extras.join(",")
}

/// Parse the requirement strings recorded on a committed index entry
fn parse_depends(depends: &[String]) -> Result<Vec<Requirement>> {
    depends.iter().map(|d| Requirement::parse(d)).collect()
}

/// Orchestrator for the transitive dependency conversion
pub struct ConvertTree {
    repo: RepoWriter,
    indexes: Vec<Box<dyn PackageIndex>>,
    finder: Finder,
    converter: Converter,
    options: ConvertOptions,
}

impl ConvertTree {
    pub fn new(
        repo: RepoWriter,
        indexes: Vec<Box<dyn PackageIndex>>,
        fetcher: Arc<dyn Fetcher>,
        options: ConvertOptions,
    ) -> Self {
        Self {
            repo,
            indexes,
            finder: Finder::new(&options.platform),
            converter: Converter::new(fetcher),
            options,
        }
    }

    /// The repository this tree writes into
    pub fn repository(&self) -> &RepoWriter {
        &self.repo
    }

    /// Convert the transitive closure of the given root requirements
    ///
    /// Per-requirement failures (no match, retrieval, unsupported content)
    /// are recorded in the report and do not stop the walk unless
    /// `fail_fast` is set. A repository write failure aborts immediately:
    /// that is the `Err` path. Writes are incremental, so an aborted or
    /// cancelled session leaves every finished package durable.
    pub fn convert_tree(&self, roots: &[Requirement]) -> Result<ConversionReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.unwrap_or(0))
            .build()
            .map_err(|e| Error::Io(format!("cannot build worker pool: {e}")))?;

        let session = Mutex::new(ConversionSession::new());
        let mut report = ConversionReport::default();
        let mut pending: Vec<Requirement> = Vec::new();

        {
            let mut session = session.lock().expect("session lock poisoned");
            for root in roots {
                if session.seen_requirements.insert(root.to_string()) {
                    pending.push(root.clone());
                }
            }
        }
        info!(
            "Starting conversion of {} root requirement(s) into {}",
            pending.len(),
            self.repo.root().display()
        );

        while !pending.is_empty() {
            if self.options.cancel.load(Ordering::SeqCst) {
                warn!("Conversion cancelled with {} requirement(s) pending", pending.len());
                report.cancelled = true;
                break;
            }

            let wave = std::mem::take(&mut pending);
            debug!("Dispatching wave of {} requirement(s)", wave.len());

            let outcomes: Vec<(Requirement, Outcome)> = pool.install(|| {
                wave.par_iter()
                    .map(|req| (req.clone(), self.process(req, &session)))
                    .collect()
            });

            // Serial phase: apply results and grow the queue.
            for (requirement, outcome) in outcomes {
                match outcome {
                    Outcome::Converted(package) => {
                        let mut session = session.lock().expect("session lock poisoned");
                        for dep in &package.depends {
                            if session.seen_requirements.insert(dep.to_string()) {
                                debug!("Queueing dependency {} of {}", dep, package.identity);
                                pending.push(dep.clone());
                            }
                        }
                        // An identity reconverted for a different extras set
                        // was deduplicated by the writer; report it once
                        if !report.converted.contains(&package.identity) {
                            report.converted.push(package.identity.clone());
                        }
                    }
                    Outcome::AlreadyPresent(name, version, depends) => {
                        debug!("Requirement {} already satisfied by {}-{}", requirement, name, version);
                        let mut session = session.lock().expect("session lock poisoned");
                        for dep in depends {
                            if session.seen_requirements.insert(dep.to_string()) {
                                debug!("Queueing dependency {} of committed {}-{}", dep, name, version);
                                pending.push(dep);
                            }
                        }
                        report.already_present.push((name, version));
                    }
                    Outcome::Skipped => {}
                    Outcome::Failed(requirement, error) => {
                        if error.is_fatal() {
                            return Err(error);
                        }
                        warn!("Requirement {} unsatisfied: {}", requirement, error);
                        if self.options.fail_fast {
                            return Err(error);
                        }
                        report.unsatisfied.push(ConversionFailure { requirement, error });
                    }
                }
            }
        }

        if self.options.cancel.load(Ordering::SeqCst) {
            report.cancelled = true;
        }

        info!(
            "Conversion finished: {} converted, {} already present, {} unsatisfied",
            report.converted.len(),
            report.already_present.len(),
            report.unsatisfied.len()
        );
        Ok(report)
    }

    /// One unit of wave work: find, admit, convert, write
    fn process(&self, requirement: &Requirement, session: &Mutex<ConversionSession>) -> Outcome {
        if self.options.cancel.load(Ordering::SeqCst) {
            return Outcome::Skipped;
        }

        let descriptor = match self.finder.find_best_match(requirement, &self.indexes) {
            Ok(descriptor) => descriptor,
            Err(e) => return Outcome::Failed(requirement.clone(), e),
        };

        // Admission under the session lock: reserve the resolved identity
        // before doing any conversion work. Requirements with extras never
        // take the already-present shortcut: the extra groups live in the
        // artifact metadata, so they must go through the converter.
        {
            let mut session = session.lock().expect("session lock poisoned");
            let key = (
                descriptor.name.clone(),
                descriptor.version.clone(),
                extras_key(requirement.extras()),
            );
            if session.visited.contains(&key) {
                return Outcome::Skipped;
            }
            if !self.options.defeat_cache
                && requirement.extras().is_empty()
                && self.repo.has_version(&descriptor.name, &descriptor.version)
            {
                session.visited.insert(key);
                // The committed entry records its dependency requirements;
                // they still need walking so a partial repository completes.
                let depends = self
                    .repo
                    .depends_of(&descriptor.name, &descriptor.version)
                    .unwrap_or_default();
                return match parse_depends(&depends) {
                    Ok(depends) => Outcome::AlreadyPresent(
                        descriptor.name.clone(),
                        descriptor.version.clone(),
                        depends,
                    ),
                    Err(e) => Outcome::Failed(requirement.clone(), e),
                };
            }
            session.visited.insert(key);
        }

        let package = match self.converter.convert(&descriptor, requirement.extras()) {
            Ok(package) => package,
            Err(e) => return Outcome::Failed(requirement.clone(), e),
        };

        // Write immediately so a crash or cancellation loses at most the
        // packages still in flight.
        if let Err(e) = self.repo.write(&package) {
            return Outcome::Failed(requirement.clone(), e);
        }

        Outcome::Converted(package)
    }
}
