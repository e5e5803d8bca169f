use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::model::controller::Quiesce;
use crate::model::job::{Job, JobId, JobResult};

/// One message on the Progress Channel: a job's new transferred-byte
/// count, its (possibly still pending) result, and which worker produced it.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub transferred: u64,
    pub result: JobResult,
    pub worker_id: usize,
}

impl ProgressEvent {
    pub fn progress(job_id: JobId, sent: u64, size: u64, worker_id: usize) -> Self {
        let result = if sent >= size { JobResult::Success } else { JobResult::Pending };
        ProgressEvent { job_id, transferred: sent, result, worker_id }
    }

    pub fn error(job_id: JobId, transferred: u64, worker_id: usize, message: String) -> Self {
        ProgressEvent { job_id, transferred, result: JobResult::Error(message), worker_id }
    }
}

/// Weak map from Job id to the live Job, so the Aggregator can drop updates
/// for Packages the Model has already cleared.
pub type JobMap = Arc<Mutex<HashMap<JobId, Weak<Job>>>>;

/// Count of Jobs the Controller has handed to the queue (via `dispatch`/
/// `requeue_*`) that have not yet reached a terminal result, minus any that
/// were discarded unstarted by `drain_pending`. `is_uploading()`'s
/// `consuming` flags only track whether a worker is *currently* busy, which
/// is false both before the first worker has picked anything up and after
/// the last one finishes — neither endpoint means "nothing was dispatched".
/// This counter closes that gap so quiescence checks (`stop()`,
/// `watch_until_quiescent`) can wait for actual completion instead of for a
/// transient lull between dispatch and the first worker claiming a job.
pub type Outstanding = Arc<AtomicUsize>;

/// Decrements `counter` by one without wrapping past zero, in case a stray
/// terminal event arrives after the corresponding increment was already
/// cancelled out (defensive; should not happen in normal operation).
fn saturating_decrement(counter: &AtomicUsize) {
    let mut current = counter.load(Ordering::Acquire);
    loop {
        let next = current.saturating_sub(1);
        match counter.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Single consumer of the Progress Channel. Resolves each message's
/// Job by id, applies the new transferred/result, and flips the producing
/// worker's `consuming` flag — still-pending results keep it true, terminal
/// results clear it. Never blocks on UI work; the CLI polls derived Package
/// state on its own tick instead of being pushed to.
pub fn spawn_aggregator(
    progress_rx: Receiver<ProgressEvent>,
    job_map: JobMap,
    consuming: Arc<Vec<AtomicBool>>,
    outstanding: Outstanding,
    quiesce: Arc<Quiesce>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("aggregator".into())
        .spawn(move || {
            while let Ok(event) = progress_rx.recv() {
                let job = { job_map.lock().expect("job map mutex poisoned").get(&event.job_id).and_then(Weak::upgrade) };

                if let Some(job) = job {
                    job.apply_progress(event.transferred, event.result.clone());
                }
                // else: the owning Package was cleared from the staged set;
                // the message is dropped silently.

                if let Some(flag) = consuming.get(event.worker_id) {
                    flag.store(!event.result.is_terminal(), Ordering::Release);
                }
                if event.result.is_terminal() {
                    saturating_decrement(&outstanding);
                }
                quiesce.notify_all();
            }
        })
        .expect("failed to spawn aggregator thread")
}
