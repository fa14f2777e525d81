// src/commands.rs
//! Command handlers for the wheelwright CLI

use anyhow::Result;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wheelwright::fetch::AutoFetcher;
use wheelwright::{
    ConvertOptions, ConvertTree, HttpIndex, JsonIndex, PackageIndex, RepoWriter, RepositoryIndex,
    Requirement,
};

/// Build the ordered index list from CLI specs
///
/// An http(s) URL becomes an [`HttpIndex`]; anything else is treated as a
/// local directory holding an `index.json`.
fn open_indexes(specs: &[String], timeout: Duration) -> Result<Vec<Box<dyn PackageIndex>>> {
    let mut indexes: Vec<Box<dyn PackageIndex>> = Vec::with_capacity(specs.len());
    for spec in specs {
        if spec.starts_with("http://") || spec.starts_with("https://") {
            indexes.push(Box::new(HttpIndex::new(spec, spec, timeout)?));
        } else {
            indexes.push(Box::new(JsonIndex::open(Path::new(spec))?));
        }
    }
    Ok(indexes)
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_convert(
    requirements: &[String],
    repo: &str,
    index_specs: &[String],
    defeat_cache: bool,
    fail_fast: bool,
    workers: Option<usize>,
    platform: Option<String>,
    timeout_secs: u64,
) -> Result<()> {
    let timeout = Duration::from_secs(timeout_secs);

    let mut roots = Vec::with_capacity(requirements.len());
    for spec in requirements {
        roots.push(Requirement::parse(spec)?);
    }

    let writer = RepoWriter::open(Path::new(repo))?;
    let indexes = open_indexes(index_specs, timeout)?;
    let fetcher = Arc::new(AutoFetcher::new(timeout)?);

    let mut options = ConvertOptions {
        defeat_cache,
        fail_fast,
        workers,
        ..ConvertOptions::default()
    };
    if let Some(platform) = platform {
        options.platform = platform;
    }

    let tree = ConvertTree::new(writer, indexes, fetcher, options);

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Converting {} root requirement(s)...", roots.len()));

    let report = tree.convert_tree(&roots)?;
    spinner.finish_and_clear();

    for identity in &report.converted {
        println!("converted   {identity}");
    }
    for (name, version) in &report.already_present {
        println!("up-to-date  {name}-{version}");
    }
    for failure in &report.unsatisfied {
        println!("unsatisfied {}: {}", failure.requirement, failure.error);
    }
    println!(
        "{} converted, {} already present, {} unsatisfied",
        report.converted.len(),
        report.already_present.len(),
        report.unsatisfied.len()
    );

    if !report.unsatisfied.is_empty() {
        anyhow::bail!("{} requirement(s) could not be satisfied", report.unsatisfied.len());
    }
    Ok(())
}

pub fn cmd_list(repo: &str) -> Result<()> {
    let index = RepositoryIndex::load(Path::new(repo))?;

    if index.packages.is_empty() {
        println!("Repository {repo} is empty");
        return Ok(());
    }

    println!("{:<30} {:<15} {:<12} {:>10}  depends", "NAME", "VERSION", "BUILD", "SIZE");
    for entry in index.packages.values() {
        println!(
            "{:<30} {:<15} {:<12} {:>10}  {}",
            entry.name,
            entry.version.to_string(),
            entry.build,
            entry.size,
            entry.depends.join(", ")
        );
    }
    println!("{} package(s)", index.packages.len());
    Ok(())
}

pub fn cmd_verify(repo: &str) -> Result<()> {
    let writer = RepoWriter::open(Path::new(repo))?;
    let total = writer.entries().len();
    info!("Verifying {} package archive(s) in {}", total, repo);

    let bad = writer.verify()?;
    if bad.is_empty() {
        println!("{total} package(s) verified OK");
        Ok(())
    } else {
        for identity in &bad {
            println!("corrupt     {identity}");
        }
        anyhow::bail!("{} of {} archive(s) failed verification", bad.len(), total);
    }
}
