use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::job::{Job, JobResult};

/// Status of a [`Package`], following the derived status state machine.
///
/// Discriminants are ordered deliberately so dedup ("status < ERRORED")
/// and sort order ("upload view only shows status > STAGING") fall out of
/// plain integer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PackageStatus {
    Staging = 0,
    Pending = 1,
    Uploading = 2,
    Errored = 3,
    Completed = 4,
    EndWithError = 5,
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PackageStatus::Staging => "staging",
            PackageStatus::Pending => "pending",
            PackageStatus::Uploading => "uploading",
            PackageStatus::Errored => "errored",
            PackageStatus::Completed => "completed",
            PackageStatus::EndWithError => "endWithError",
        };
        f.write_str(s)
    }
}

/// A dispatch unit grouping one or more Jobs that share project/type/
/// description/site. Identity (equality, dedup) is its content hash, not
/// its in-memory address: two Packages built from the same normalised file
/// list and site compare equal.
#[derive(Debug)]
pub struct Package {
    pub project: String,
    pub kind: String,
    pub description: String,
    pub site: String,
    pub jobs: Vec<Arc<Job>>,
    pub total_size: u64,
    pub hash: String,
    /// Flips true the instant `dispatch()` runs, before any Job has
    /// progressed. Needed because "transferred == 0" alone cannot
    /// distinguish STAGING from PENDING.
    dispatched: AtomicBool,
}

impl Package {
    pub fn new(
        project: String,
        kind: String,
        description: String,
        site: String,
        jobs: Vec<Arc<Job>>,
        total_size: u64,
        hash: String,
    ) -> Self {
        Package {
            project,
            kind,
            description,
            site,
            jobs,
            total_size,
            hash,
            dispatched: AtomicBool::new(false),
        }
    }

    pub fn mark_dispatched(&self) {
        self.dispatched.store(true, Ordering::Release);
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched.load(Ordering::Acquire)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn uploaded_count(&self) -> usize {
        self.jobs.iter().filter(|j| matches!(j.result(), JobResult::Success)).count()
    }

    pub fn transferred(&self) -> u64 {
        self.jobs.iter().map(|j| j.transferred()).sum()
    }

    /// Pure function of Job aggregate state.
    pub fn status(&self) -> PackageStatus {
        let transferred = self.transferred();
        let errored = self.jobs.iter().any(|j| j.result().is_error());

        if transferred == 0 {
            if self.is_dispatched() { PackageStatus::Pending } else { PackageStatus::Staging }
        } else if transferred < self.total_size {
            if errored { PackageStatus::Errored } else { PackageStatus::Uploading }
        } else if errored {
            PackageStatus::EndWithError
        } else {
            PackageStatus::Completed
        }
    }

    /// `round2(T / byte * 100)`.
    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        let raw = self.transferred() as f64 / self.total_size as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }

    /// Failed (src, dst, error) triples for the "Show Errors" listing.
    pub fn failed_jobs(&self) -> Vec<(String, String, String)> {
        self.jobs
            .iter()
            .filter_map(|j| match j.result() {
                JobResult::Error(msg) => Some((
                    j.content.local.display().to_string(),
                    j.content.remote.clone(),
                    msg,
                )),
                _ => None,
            })
            .collect()
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Package {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::JobContent;

    fn job(size: u64) -> Arc<Job> {
        Arc::new(Job::new("s1", JobContent { local: "/a".into(), remote: "/b".into(), size }))
    }

    #[test]
    fn staging_before_dispatch_pending_after() {
        let jobs = vec![job(100)];
        let pkg = Package::new(
            "p".into(),
            "Workfile".into(),
            "d".into(),
            "s1".into(),
            jobs,
            100,
            "hash".into(),
        );
        assert_eq!(pkg.status(), PackageStatus::Staging);
        pkg.mark_dispatched();
        assert_eq!(pkg.status(), PackageStatus::Pending);
    }

    #[test]
    fn uploading_then_completed() {
        let j = job(100);
        let jobs = vec![j.clone()];
        let pkg = Package::new(
            "p".into(),
            "Workfile".into(),
            "d".into(),
            "s1".into(),
            jobs,
            100,
            "hash".into(),
        );
        pkg.mark_dispatched();
        j.apply_progress(50, JobResult::Pending);
        assert_eq!(pkg.status(), PackageStatus::Uploading);
        j.apply_progress(100, JobResult::Success);
        assert_eq!(pkg.status(), PackageStatus::Completed);
        assert_eq!(pkg.percentage(), 100.0);
    }

    #[test]
    fn errored_then_end_with_error() {
        let j1 = job(50);
        let j2 = job(50);
        let jobs = vec![j1.clone(), j2.clone()];
        let pkg = Package::new(
            "p".into(),
            "Workfile".into(),
            "d".into(),
            "s1".into(),
            jobs,
            100,
            "hash".into(),
        );
        pkg.mark_dispatched();
        j1.apply_progress(50, JobResult::Error("nope".into()));
        assert_eq!(pkg.status(), PackageStatus::Errored);
        j2.apply_progress(50, JobResult::Success);
        assert_eq!(pkg.status(), PackageStatus::EndWithError);
        assert_eq!(pkg.failed_jobs().len(), 1);
    }

    #[test]
    fn equality_is_by_hash() {
        let a = Package::new(
            "p".into(),
            "t".into(),
            "d".into(),
            "s".into(),
            vec![],
            1,
            "abc".into(),
        );
        let b = Package::new(
            "other".into(),
            "t2".into(),
            "d2".into(),
            "s2".into(),
            vec![],
            2,
            "abc".into(),
        );
        assert_eq!(a, b);
    }
}
