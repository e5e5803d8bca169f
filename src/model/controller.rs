use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::error::AppError;
use crate::model::manifest::{FileStat, Producer};
use crate::model::package::{Package, PackageStatus};
use crate::queue::JobQueue;
use crate::site::SiteSource;
use crate::transfer::progress::{JobMap, Outstanding, spawn_aggregator};
use crate::transfer::worker::{UploadBackend, spawn_workers};

/// Outbound control events the Model emits to whatever is driving it — the
/// CLI front-end here, a GUI elsewhere. Carry no payload; callers pull
/// derived Package state separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Staging,
    Staged,
    Canceling,
    Canceled,
}

/// Notify-driven replacement for a busy-wait on
/// `is_staging() || is_uploading()`: the Aggregator and Producer
/// completion hook call `notify_all` whenever state might have changed, and
/// `wait_while` parks until the predicate clears rather than spinning. A
/// short timeout is kept as a backstop so a missed notification cannot wedge
/// `stop()` forever.
pub struct Quiesce {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Quiesce {
    pub fn new() -> Self {
        Quiesce { mutex: Mutex::new(()), condvar: Condvar::new() }
    }

    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }

    pub fn wait_while(&self, pred: impl Fn() -> bool) {
        let mut guard = self.mutex.lock().expect("quiesce mutex poisoned");
        while pred() {
            let (next, _timeout) =
                self.condvar.wait_timeout(guard, Duration::from_millis(20)).expect("quiesce mutex poisoned");
            guard = next;
        }
    }
}

impl Default for Quiesce {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the staged set of Packages and routes user intent to the Producer,
/// Job Queue, Worker Pool and Aggregator. The staged set is mutated
/// only through Controller methods; workers never touch it.
pub struct Controller {
    packages: Arc<Mutex<Vec<Arc<Package>>>>,
    job_map: JobMap,
    queue: JobQueue,
    producer: Producer,
    consuming: Arc<Vec<AtomicBool>>,
    outstanding: Outstanding,
    quiesce: Arc<Quiesce>,
    worker_count: usize,
    signal_tx: Option<Sender<Signal>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    aggregator_handle: Mutex<Option<JoinHandle<()>>>,
    last_stage_error: Arc<Mutex<Option<AppError>>>,
}

impl Controller {
    pub fn new(
        worker_count: usize,
        queue_capacity: usize,
        site_dir: Arc<dyn SiteSource>,
        backend: Arc<dyn UploadBackend>,
        stat: Arc<dyn FileStat>,
        signal_tx: Option<Sender<Signal>>,
    ) -> Self {
        let queue = JobQueue::new(queue_capacity);
        let (progress_tx, progress_rx) = crossbeam_channel::unbounded();
        let job_map: JobMap = Arc::new(Mutex::new(HashMap::new()));
        let consuming: Arc<Vec<AtomicBool>> =
            Arc::new((0..worker_count).map(|_| AtomicBool::new(false)).collect());
        let outstanding: Outstanding = Arc::new(AtomicUsize::new(0));
        let quiesce = Arc::new(Quiesce::new());

        let worker_handles = spawn_workers(worker_count, queue.receiver(), site_dir, backend, progress_tx);
        let aggregator_handle = spawn_aggregator(
            progress_rx,
            job_map.clone(),
            consuming.clone(),
            outstanding.clone(),
            quiesce.clone(),
        );

        Controller {
            packages: Arc::new(Mutex::new(Vec::new())),
            job_map,
            queue,
            producer: Producer::new(stat),
            consuming,
            outstanding,
            quiesce,
            worker_count,
            signal_tx,
            worker_handles: Mutex::new(worker_handles),
            aggregator_handle: Mutex::new(Some(aggregator_handle)),
            last_stage_error: Arc::new(Mutex::new(None)),
        }
    }

    fn emit(&self, signal: Signal) {
        if let Some(tx) = &self.signal_tx {
            let _ = tx.send(signal);
        }
    }

    pub fn is_staging(&self) -> bool {
        self.producer.is_producing()
    }

    pub fn is_uploading(&self) -> bool {
        self.consuming.iter().any(|c| c.load(Ordering::Acquire))
    }

    /// Jobs dispatched (or requeued) but not yet resolved to a terminal
    /// result, net of any discarded unstarted by a cancel. Covers the gap
    /// `is_uploading()` misses: a worker can be briefly idle right after
    /// `dispatch()` returns and before it claims the first Job off the
    /// queue, which would otherwise read as quiescent.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn has_pending_work(&self) -> bool {
        self.is_staging() || self.is_uploading() || self.outstanding() > 0
    }

    pub fn last_stage_error(&self) -> Option<AppError> {
        self.last_stage_error.lock().expect("last_stage_error mutex poisoned").clone()
    }

    /// Parses `manifest_path` on a background thread, appending each
    /// produced Package to the staged set via the dedup rule: a
    /// Package whose hash matches one already staged is rejected unless
    /// that existing Package has reached a terminal-or-errored status, in
    /// which case the new attempt is staged alongside it.
    pub fn stage(&self, manifest_path: PathBuf) {
        self.emit(Signal::Staging);

        let packages = self.packages.clone();
        let quiesce = self.quiesce.clone();
        let last_error = self.last_stage_error.clone();
        let signal_tx = self.signal_tx.clone();

        self.producer.start(
            manifest_path,
            move |package| {
                let mut guard = packages.lock().expect("packages mutex poisoned");
                let duplicate_is_live = guard
                    .iter()
                    .find(|existing| ***existing == package)
                    .map(|existing| existing.status() < PackageStatus::Errored);
                if duplicate_is_live != Some(true) {
                    guard.push(Arc::new(package));
                }
            },
            move |err| {
                *last_error.lock().expect("last_stage_error mutex poisoned") = err;
                quiesce.notify_all();
                if let Some(tx) = &signal_tx {
                    let _ = tx.send(Signal::Staged);
                }
            },
        );
    }

    pub fn staged_view(&self) -> Vec<Arc<Package>> {
        self.packages
            .lock()
            .expect("packages mutex poisoned")
            .iter()
            .filter(|p| p.status() == PackageStatus::Staging)
            .cloned()
            .collect()
    }

    pub fn upload_view(&self) -> Vec<Arc<Package>> {
        self.packages
            .lock()
            .expect("packages mutex poisoned")
            .iter()
            .filter(|p| p.status() > PackageStatus::Staging)
            .cloned()
            .collect()
    }

    pub fn all_packages(&self) -> Vec<Arc<Package>> {
        self.packages.lock().expect("packages mutex poisoned").clone()
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<Arc<Package>> {
        self.packages.lock().expect("packages mutex poisoned").iter().find(|p| p.hash == hash).cloned()
    }

    /// Moves `package` from STAGING to PENDING and enqueues all its Jobs,
    /// recording the job→package weak link the Aggregator uses.
    pub fn dispatch(&self, package: &Arc<Package>) {
        package.mark_dispatched();
        {
            let mut map = self.job_map.lock().expect("job map mutex poisoned");
            for job in &package.jobs {
                map.insert(job.id, Arc::downgrade(job));
            }
        }
        self.outstanding.fetch_add(package.jobs.len(), Ordering::AcqRel);
        for job in &package.jobs {
            self.queue.put(job.clone());
        }
        self.quiesce.notify_all();
    }

    pub fn dispatch_all(&self) {
        for package in self.staged_view() {
            self.dispatch(&package);
        }
    }

    pub fn dispatch_selected(&self, hashes: &[String]) {
        let staged = self.staged_view();
        for hash in hashes {
            if let Some(package) = staged.iter().find(|p| &p.hash == hash) {
                self.dispatch(package);
            }
        }
    }

    /// Stops the Producer, discards Jobs still waiting in the queue
    /// (already-started transfers are left to finish or fail naturally),
    /// sends exactly `worker_count` STOP sentinels, and blocks (via
    /// [`Quiesce`]) until neither the Producer nor any worker is still
    /// active, emitting `canceling`/`canceled` around the wait.
    pub fn stop(&self) {
        if self.producer.is_producing() {
            self.producer.stop();
        }
        let drained = self.queue.drain_pending();
        if drained > 0 {
            tracing::debug!("cancel discarded {drained} not-yet-started job(s)");
            self.outstanding.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(drained))).ok();
        }
        for _ in 0..self.worker_count {
            self.queue.put_stop();
        }

        if self.has_pending_work() {
            self.emit(Signal::Canceling);
            self.quiesce.wait_while(|| self.has_pending_work());
            self.emit(Signal::Canceled);
        }
    }

    /// Drops all staged Packages if every one of them is still STAGING;
    /// otherwise drops only the STAGING ones, leaving dispatched/terminal
    /// Packages in place.
    pub fn clear_stage(&self) {
        let mut guard = self.packages.lock().expect("packages mutex poisoned");
        let all_staging = guard.iter().all(|p| p.status() == PackageStatus::Staging);
        if all_staging {
            guard.clear();
        } else {
            guard.retain(|p| p.status() != PackageStatus::Staging);
        }
    }

    /// Resets and re-enqueues only the Jobs in `package` whose result is an
    /// error; a no-op if none are.
    pub fn requeue_failed(&self, package: &Arc<Package>) {
        let mut requeued = 0usize;
        for job in &package.jobs {
            if job.result().is_error() {
                job.reset();
                self.queue.put(job.clone());
                requeued += 1;
            }
        }
        self.outstanding.fetch_add(requeued, Ordering::AcqRel);
        self.quiesce.notify_all();
    }

    /// Resets and re-enqueues every Job in `package`, regardless of prior
    /// result.
    pub fn requeue_all(&self, package: &Arc<Package>) {
        for job in &package.jobs {
            job.reset();
            self.queue.put(job.clone());
        }
        self.outstanding.fetch_add(package.jobs.len(), Ordering::AcqRel);
        self.quiesce.notify_all();
    }

    /// Joins the worker pool and the Aggregator. Call once, at process
    /// shutdown, after `stop()` has returned quiescence.
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.worker_handles.lock().expect("worker handles mutex poisoned"));
        for (worker_id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::error!("{}", AppError::UnexpectedWorkerCrash(worker_id));
            }
        }
        if let Some(handle) =
            self.aggregator_handle.lock().expect("aggregator handle mutex poisoned").take()
        {
            let _ = handle.join();
        }
    }
}
