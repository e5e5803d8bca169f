use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use crate::cli::Commands;
use crate::commands;
use crate::config::Config;
use crate::model::controller::Controller;
use crate::model::manifest::{FileStat, MockFileStat, RealFileStat};
use crate::site::{MockSiteSource, SiteDirectory, SiteSource};
use crate::transfer::worker::{MockUploadBackend, RealUploadBackend, UploadBackend};

/// Owns the Controller for the lifetime of the process and drives it from
/// either a single one-shot subcommand or an interactive session. There is
/// no persisted state between invocations, so a workflow that stages a
/// manifest and later dispatches it must stay inside one `App` — hence the
/// interactive session.
pub struct App {
    controller: Controller,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let (site_dir, backend, stat): (Arc<dyn SiteSource>, Arc<dyn UploadBackend>, Arc<dyn FileStat>) =
            if config.demo {
                tracing::info!("demo mode: using mock site/producer/upload backend, no network or filesystem access");
                (Arc::new(MockSiteSource), Arc::new(MockUploadBackend::default()), Arc::new(MockFileStat::default()))
            } else {
                (
                    Arc::new(SiteDirectory::new(config.sites_dir.clone())),
                    Arc::new(RealUploadBackend::default()),
                    Arc::new(RealFileStat),
                )
            };
        // Capacity matched to worker count: enough headroom that dispatch_all
        // for a typical manifest doesn't block the controller thread on a full queue.
        let queue_capacity = (config.workers * 4).max(16);
        let controller = Controller::new(config.workers, queue_capacity, site_dir, backend, stat, None);
        App { controller }
    }

    /// Executes exactly one subcommand and returns. `stage --dispatch` and
    /// `dispatch --watch` block internally until their work is quiescent;
    /// every other command here is print-and-return.
    pub fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Stage { manifest, dispatch } => commands::handle_stage(&self.controller, manifest, dispatch),
            Commands::List => commands::handle_list(&self.controller),
            Commands::Dispatch { all, hashes, watch } => {
                commands::handle_dispatch(&self.controller, all, hashes, watch)
            }
            Commands::Cancel => commands::handle_cancel(&self.controller),
            Commands::Clear => commands::handle_clear(&self.controller),
            Commands::Requeue { hash, all } => commands::handle_requeue(&self.controller, hash, all),
            Commands::Errors { hash } => commands::handle_errors(&self.controller, hash),
            Commands::Repl => self.run_repl(),
        }
    }

    /// Reads one line-oriented command at a time from stdin until `quit` or
    /// EOF, dispatching each to the same handlers as the one-shot path. This
    /// is the thin terminal client kept alive long enough to stage, then
    /// dispatch, then watch — all state lives in this one process.
    pub fn run_repl(&self) -> Result<()> {
        println!("sftpc interactive session. Commands: stage, list, dispatch, cancel, clear, requeue, errors, quit");
        let stdin = io::stdin();
        let mut out = io::stdout();
        loop {
            print!("sftpc> ");
            out.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "quit" | "exit") {
                break;
            }
            if let Err(e) = self.dispatch_repl_line(line) {
                eprintln!("❌ {}", e);
            }
        }
        Ok(())
    }

    fn dispatch_repl_line(&self, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["stage", manifest] => commands::handle_stage(&self.controller, manifest.into(), false),
            ["stage", manifest, "--dispatch"] => commands::handle_stage(&self.controller, manifest.into(), true),
            ["list"] => commands::handle_list(&self.controller),
            ["dispatch", "--all"] => commands::handle_dispatch(&self.controller, true, Vec::new(), false),
            ["dispatch", "--all", "--watch"] => commands::handle_dispatch(&self.controller, true, Vec::new(), true),
            ["dispatch", rest @ ..] if !rest.is_empty() => {
                let watch = rest.contains(&"--watch");
                let hashes = rest.iter().filter(|t| **t != "--watch").map(|s| s.to_string()).collect();
                commands::handle_dispatch(&self.controller, false, hashes, watch)
            }
            ["cancel"] => commands::handle_cancel(&self.controller),
            ["clear"] => commands::handle_clear(&self.controller),
            ["requeue", hash] => commands::handle_requeue(&self.controller, hash.to_string(), false),
            ["requeue", hash, "--all"] => commands::handle_requeue(&self.controller, hash.to_string(), true),
            ["errors", hash] => commands::handle_errors(&self.controller, hash.to_string()),
            _ => {
                eprintln!("unrecognized command: {}", line);
                Ok(())
            }
        }
    }

    /// Stops the pipeline (idempotent if already canceled) and joins the
    /// worker pool and the aggregator. Call once at process exit so a REPL
    /// session quit mid-upload doesn't leave orphaned threads behind.
    pub fn shutdown(&self) {
        self.controller.stop();
        self.controller.shutdown();
    }
}
