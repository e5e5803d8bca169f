use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::model::job::Job;

/// One item flowing through the Job Queue: a file transfer to run, or the
/// sentinel that tells exactly one worker to exit.
pub enum QueueMsg {
    Job(Arc<Job>),
    Stop,
}

/// Bounded, thread-safe FIFO of `Job`s plus per-worker STOP sentinels.
/// Ordering is FIFO but per-worker pickup across a pool is not required to
/// honour global order, since Jobs are independent.
#[derive(Clone)]
pub struct JobQueue {
    tx: Sender<QueueMsg>,
    rx: Receiver<QueueMsg>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        JobQueue { tx, rx }
    }

    pub fn sender(&self) -> Sender<QueueMsg> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<QueueMsg> {
        self.rx.clone()
    }

    pub fn put(&self, job: Arc<Job>) {
        let _ = self.tx.send(QueueMsg::Job(job));
    }

    pub fn put_stop(&self) {
        let _ = self.tx.send(QueueMsg::Stop);
    }

    /// Discards every `Job` currently sitting in the queue without running
    /// it, leaving Jobs already handed to a worker (in-flight) untouched.
    /// Used by `stop()` so cancellation only lets already-started transfers
    /// finish rather than starting anything new.
    pub fn drain_pending(&self) -> usize {
        let mut drained = 0;
        while let Ok(msg) = self.rx.try_recv() {
            if matches!(msg, QueueMsg::Job(_)) {
                drained += 1;
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::JobContent;

    #[test]
    fn stop_sentinels_are_delivered_once_each() {
        let queue = JobQueue::new(8);
        for _ in 0..3 {
            queue.put_stop();
        }
        let rx = queue.receiver();
        let mut stops = 0;
        for _ in 0..3 {
            if matches!(rx.recv().unwrap(), QueueMsg::Stop) {
                stops += 1;
            }
        }
        assert_eq!(stops, 3);
    }

    #[test]
    fn jobs_and_stop_are_fifo() {
        let queue = JobQueue::new(8);
        let job = Arc::new(Job::new("s", JobContent { local: "/a".into(), remote: "/b".into(), size: 1 }));
        queue.put(job);
        queue.put_stop();
        let rx = queue.receiver();
        assert!(matches!(rx.recv().unwrap(), QueueMsg::Job(_)));
        assert!(matches!(rx.recv().unwrap(), QueueMsg::Stop));
    }

    #[test]
    fn drain_pending_discards_only_unstarted_jobs() {
        let queue = JobQueue::new(8);
        for _ in 0..3 {
            queue.put(Arc::new(Job::new("s", JobContent { local: "/a".into(), remote: "/b".into(), size: 1 })));
        }
        queue.put_stop();
        assert_eq!(queue.drain_pending(), 3);
        let rx = queue.receiver();
        assert!(matches!(rx.recv().unwrap(), QueueMsg::Stop));
    }
}
