use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Thin terminal client driving the Model/Controller. With no subcommand,
/// drops into an interactive session so `stage` and a later `dispatch` can
/// share the one process the Model lives in — there is no persisted state
/// to bridge separate invocations.
#[derive(Parser, Debug)]
#[command(
    name = "sftpc",
    author,
    version,
    about = "Stages and uploads grouped file packages over SFTP.",
    long_about = None
)]
pub struct Cli {
    /// Upload Worker Pool size. Falls back to AVALON_SFTPC_WORKERS, then 10.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Overrides the Site Directory's resolution dir.
    #[arg(long)]
    pub sites_dir: Option<PathBuf>,
    /// Engage the mock Producer/Upload-backend pair: no network or
    /// filesystem access, synthetic file sizes and simulated progress.
    #[arg(long)]
    pub demo: bool,
    /// Raise the log level and enable the file sink.
    #[arg(long)]
    pub verbose: bool,
    /// Alias for --verbose; both raise the same level.
    #[arg(long)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and stage a manifest, printing the resulting staging list.
    Stage {
        manifest: PathBuf,
        /// Dispatch every staged package immediately after staging and
        /// block, printing live progress, until all jobs are terminal.
        #[arg(long)]
        dispatch: bool,
    },
    /// Print the staging view and the upload view as two tables.
    List,
    /// Dispatch all staged packages, or a selected subset by content hash.
    Dispatch {
        #[arg(long)]
        all: bool,
        #[arg(long = "hash")]
        hashes: Vec<String>,
        /// Block, printing live progress, until all dispatched jobs are terminal.
        #[arg(long)]
        watch: bool,
    },
    /// Stop the producer and worker pool, waiting for quiescence.
    Cancel,
    /// Drop STAGING packages (or all of them, if none have progressed).
    Clear,
    /// Re-queue a package's jobs. Defaults to only the failed ones.
    Requeue {
        hash: String,
        #[arg(long)]
        all: bool,
    },
    /// List (src, dst, error) for every failed job in the named package.
    Errors { hash: String },
    /// Start the interactive session explicitly (same as no subcommand).
    Repl,
}
