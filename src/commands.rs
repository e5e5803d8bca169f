use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cli_table::{Cell, CellStruct, Style, Table, format::Justify, print_stdout};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::model::controller::Controller;
use crate::model::package::{Package, PackageStatus};
use crate::util::human_bytes;

/// Stages `manifest` on the Controller's background Producer, blocking until
/// the run completes (or fails) so the resulting staging list can be
/// printed before the command returns. With `--dispatch`,
/// immediately dispatches everything just staged and watches it to
/// quiescence in the same invocation.
pub fn handle_stage(controller: &Controller, manifest: PathBuf, dispatch: bool) -> Result<()> {
    controller.stage(manifest);
    wait_while_staging(controller);

    if let Some(err) = controller.last_stage_error() {
        eprintln!("❌ staging failed: {}", err);
    }

    let staged = controller.staged_view();
    println!("staged {} package(s):", staged.len());
    print_packages(&staged);

    if dispatch {
        controller.dispatch_all();
        println!("dispatched {} package(s); watching progress...", staged.len());
        watch_until_quiescent(controller);
        print_packages(&controller.upload_view());
    }
    Ok(())
}

/// Prints the staging view and the upload view as two tables.
pub fn handle_list(controller: &Controller) -> Result<()> {
    let staged = controller.staged_view();
    println!("{}", "staging".bold());
    print_packages(&staged);

    let uploading = controller.upload_view();
    println!("{}", "upload".bold());
    print_packages(&uploading);
    Ok(())
}

/// Dispatches all staged packages or a selected subset by content hash.
pub fn handle_dispatch(controller: &Controller, all: bool, hashes: Vec<String>, watch: bool) -> Result<()> {
    if all {
        controller.dispatch_all();
    } else {
        controller.dispatch_selected(&hashes);
    }
    if watch {
        watch_until_quiescent(controller);
    }
    print_packages(&controller.upload_view());
    Ok(())
}

/// Invokes `stop()`, which itself prints nothing; the `canceling`/`canceled`
/// transitions are observed here by waiting out the call.
pub fn handle_cancel(controller: &Controller) -> Result<()> {
    println!("canceling...");
    controller.stop();
    println!("canceled");
    Ok(())
}

/// Drops STAGING packages, or all of them if none have progressed past
/// STAGING.
pub fn handle_clear(controller: &Controller) -> Result<()> {
    controller.clear_stage();
    println!("cleared staging set; {} package(s) remain", controller.all_packages().len());
    Ok(())
}

/// Re-queues a package's jobs by content hash: only the failed ones by
/// default, every job with `--all`.
pub fn handle_requeue(controller: &Controller, hash: String, all: bool) -> Result<()> {
    let Some(package) = controller.find_by_hash(&hash) else {
        eprintln!("❌ no package with hash '{}'", hash);
        return Ok(());
    };
    if all {
        controller.requeue_all(&package);
    } else {
        controller.requeue_failed(&package);
    }
    println!("requeued {} for package '{}'", if all { "all jobs" } else { "failed jobs" }, package.project);
    Ok(())
}

/// Lists (src, dst, error) for every failed job in the named package —
/// the "Show Errors" dialog's CLI equivalent.
pub fn handle_errors(controller: &Controller, hash: String) -> Result<()> {
    let Some(package) = controller.find_by_hash(&hash) else {
        eprintln!("❌ no package with hash '{}'", hash);
        return Ok(());
    };
    let failed = package.failed_jobs();
    if failed.is_empty() {
        println!("no failed jobs in package '{}'", package.project);
        return Ok(());
    }
    let title = vec!["Local".cell().bold(true), "Remote".cell().bold(true), "Error".cell().bold(true)];
    let rows: Vec<Vec<CellStruct>> =
        failed.into_iter().map(|(src, dst, err)| vec![src.cell(), dst.cell(), err.cell()]).collect();
    if let Err(e) = print_stdout(rows.table().title(title)) {
        eprintln!("⚠️ could not render table: {}", e);
    }
    Ok(())
}

/// Blocks, polling on a 100 ms tick, until the Producer has stopped producing.
fn wait_while_staging(controller: &Controller) {
    while controller.is_staging() {
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Blocks, polling on a 100 ms tick, rendering
/// one `indicatif` bar per dispatched package until neither the Producer nor
/// any worker is still active. The Aggregator itself never blocks on this —
/// it is purely a poller reading the same derived state `list` reads.
fn watch_until_quiescent(controller: &Controller) {
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:30}] {percent:>3}% {msg}")
        .expect("valid progress template")
        .progress_chars("=> ");

    let multi = MultiProgress::new();
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    loop {
        for package in controller.upload_view() {
            let bar = bars.entry(package.hash.clone()).or_insert_with(|| {
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(short_hash(&package.hash).to_string());
                bar
            });
            bar.set_position(package.percentage() as u64);
            bar.set_message(package.status().to_string());
        }
        if !controller.has_pending_work() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    for bar in bars.values() {
        bar.finish();
    }
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(10)]
}

fn status_cell(status: PackageStatus) -> CellStruct {
    let text = status.to_string();
    match status {
        PackageStatus::Completed => text.green().to_string().cell(),
        PackageStatus::Errored | PackageStatus::EndWithError => text.red().to_string().cell(),
        PackageStatus::Uploading | PackageStatus::Pending => text.yellow().to_string().cell(),
        PackageStatus::Staging => text.cell(),
    }
}

fn print_packages(packages: &[Arc<Package>]) {
    if packages.is_empty() {
        println!("  (none)");
        return;
    }
    let title = vec![
        "Hash".cell().bold(true),
        "Project".cell().bold(true),
        "Type".cell().bold(true),
        "Site".cell().bold(true),
        "Status".cell().bold(true),
        "Progress".cell().bold(true),
        "Size".cell().bold(true),
        "Files".cell().bold(true),
    ];
    let rows: Vec<Vec<CellStruct>> = packages
        .iter()
        .map(|p| {
            vec![
                short_hash(&p.hash).cell(),
                p.project.clone().cell(),
                p.kind.clone().cell(),
                p.site.clone().cell(),
                status_cell(p.status()),
                format!("{:.2}%", p.percentage()).cell().justify(Justify::Right),
                human_bytes(p.total_size).cell().justify(Justify::Right),
                format!("{}/{}", p.uploaded_count(), p.job_count()).cell().justify(Justify::Right),
            ]
        })
        .collect();
    if let Err(e) = print_stdout(rows.table().title(title)) {
        eprintln!("⚠️ could not render table: {}", e);
    }
}
