// src/cli.rs
//! CLI definitions for wheelwright
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wheelwright")]
#[command(version)]
#[command(about = "Convert pip-style package trees into a native package repository", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert root requirements and their full dependency closure
    Convert {
        /// Root requirements, pip-style (e.g. "requests[socks]>=2.0")
        #[arg(required = true)]
        requirements: Vec<String>,

        /// Target repository directory
        #[arg(short, long, default_value = "./repo")]
        repo: String,

        /// Package index, ordered; repeat for fallbacks. A local directory
        /// or an http(s) URL serving index.json
        #[arg(short, long, required = true)]
        index: Vec<String>,

        /// Reconvert packages even when the repository already has them
        #[arg(long)]
        defeat_cache: bool,

        /// Stop at the first unsatisfied requirement
        #[arg(long)]
        fail_fast: bool,

        /// Worker pool size (default: one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Target platform tag (default: the host platform)
        #[arg(short, long)]
        platform: Option<String>,

        /// Network timeout in seconds
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },

    /// List the packages committed to a repository
    List {
        /// Repository directory
        #[arg(short, long, default_value = "./repo")]
        repo: String,
    },

    /// Verify repository archives against their recorded checksums
    Verify {
        /// Repository directory
        #[arg(short, long, default_value = "./repo")]
        repo: String,
    },
}
