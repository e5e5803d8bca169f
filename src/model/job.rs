use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque, process-unique identifier for a [`Job`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        JobId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// The single-file transfer a [`Job`] carries: where it comes from, where it
/// goes, and its size in bytes as measured at staging time.
#[derive(Debug, Clone)]
pub struct JobContent {
    pub local: PathBuf,
    pub remote: String,
    pub size: u64,
}

/// Terminal (or not-yet-terminal) outcome of a Job's transfer attempt.
/// `PENDING` and `SUCCESS` are the non-error result codes; any other outcome
/// is represented as `Error` and carries the underlying message.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Pending,
    Success,
    Error(String),
}

impl JobResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobResult::Pending)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JobResult::Error(_))
    }
}

/// A single file transfer: one local path to one remote path on one site.
///
/// `transferred` and `result` are mutated exclusively by the Aggregator
/// and read by the Model/Controller and the CLI's polling tick; both
/// are scalar-ish and intentionally allow a lagging read without locking the
/// whole Job for every poll — the poller tolerates a stale view by design.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub site: String,
    pub content: JobContent,
    transferred: AtomicU64,
    result: Mutex<JobResult>,
}

impl Job {
    pub fn new(site: impl Into<String>, content: JobContent) -> Self {
        Job {
            id: JobId::next(),
            site: site.into(),
            content,
            transferred: AtomicU64::new(0),
            result: Mutex::new(JobResult::Pending),
        }
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    pub fn result(&self) -> JobResult {
        self.result.lock().expect("job result mutex poisoned").clone()
    }

    /// Applied by the Aggregator on each progress message. `transferred` is
    /// monotonically non-decreasing here except via [`Job::reset`].
    pub fn apply_progress(&self, transferred: u64, result: JobResult) {
        self.transferred.store(transferred, Ordering::Release);
        *self.result.lock().expect("job result mutex poisoned") = result;
    }

    /// Used by `requeue_failed`/`requeue_all`: clears progress and result so
    /// the Job can be re-inserted into the queue as if newly staged.
    pub fn reset(&self) {
        self.transferred.store(0, Ordering::Release);
        *self.result.lock().expect("job result mutex poisoned") = JobResult::Pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = JobId::next();
        let b = JobId::next();
        assert!(b > a);
    }

    #[test]
    fn reset_clears_progress_and_result() {
        let job = Job::new("site1", JobContent { local: "/a".into(), remote: "/b".into(), size: 10 });
        job.apply_progress(10, JobResult::Error("boom".into()));
        assert!(job.result().is_error());
        job.reset();
        assert_eq!(job.transferred(), 0);
        assert_eq!(job.result(), JobResult::Pending);
    }
}
