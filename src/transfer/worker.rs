use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::error::AppError;
use crate::model::job::JobContent;
use crate::queue::QueueMsg;
use crate::site::{SiteParams, SiteSource};
use crate::transfer::progress::ProgressEvent;
use crate::transfer::sftp_like::ensure_remote_dir_all;

/// Pluggable transfer capability selected once at program startup:
/// the real SFTP backend for live deployments, or a mock backend that
/// simulates progress for demo mode and tests. The worker loop is oblivious
/// to which is installed.
pub trait UploadBackend: Send + Sync {
    fn upload(
        &self,
        params: &SiteParams,
        content: &JobContent,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<(), AppError>;
}

/// Streams a local file to a fresh SFTP connection, creating parent
/// directories first and preserving mtime after the write completes.
pub struct RealUploadBackend {
    pub chunk_size: usize,
}

impl Default for RealUploadBackend {
    fn default() -> Self {
        RealUploadBackend { chunk_size: 256 * 1024 }
    }
}

impl UploadBackend for RealUploadBackend {
    fn upload(
        &self,
        params: &SiteParams,
        content: &JobContent,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<(), AppError> {
        let sftp = crate::transfer::session::connect_sftp(params)?;
        let remote_path = Path::new(&content.remote);
        if let Some(parent) = remote_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_remote_dir_all(sftp.as_ref(), parent).map_err(AppError::TransferError)?;
        }

        let mut reader = std::fs::File::open(&content.local)
            .map_err(|_| AppError::MissingFile(content.local.clone()))?;
        let mut writer = sftp.create_write(remote_path).map_err(AppError::TransferError)?;

        let mut buf = vec![0u8; self.chunk_size.max(4096)];
        let mut sent: u64 = 0;
        loop {
            let n = reader.read(&mut buf).map_err(|e| AppError::TransferError(e.to_string()))?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).map_err(|e| AppError::TransferError(e.to_string()))?;
            sent += n as u64;
            on_progress(sent);
        }
        if sent == 0 {
            on_progress(sent);
        }
        drop(writer);

        if let Ok(meta) = std::fs::metadata(&content.local) {
            if let Ok(modified) = meta.modified() {
                if let Ok(dur) = modified.duration_since(std::time::UNIX_EPOCH) {
                    let _ = sftp.set_mtime(remote_path, dur.as_secs());
                }
            }
        }
        Ok(())
    }
}

/// Simulates a transfer's byte-level progress without touching the network
/// or filesystem, for demo mode and for exercising the pool's
/// lifecycle in tests without live infrastructure.
pub struct MockUploadBackend {
    pub steps: u64,
    pub step_delay: Duration,
    /// Fraction in [0, 1]; a value > 0 makes some uploads fail after
    /// completing their simulated progress, mirroring the original demo
    /// uploader's occasional injected failure.
    pub fail_rate: f64,
}

impl Default for MockUploadBackend {
    fn default() -> Self {
        MockUploadBackend { steps: 10, step_delay: Duration::from_millis(20), fail_rate: 0.0 }
    }
}

impl UploadBackend for MockUploadBackend {
    fn upload(
        &self,
        _params: &SiteParams,
        content: &JobContent,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<(), AppError> {
        let steps = self.steps.max(1);
        for i in 1..=steps {
            if !self.step_delay.is_zero() {
                std::thread::sleep(self.step_delay);
            }
            let sent = content.size * i / steps;
            on_progress(sent);
        }
        if self.fail_rate > 0.0 && sample_unit_interval() < self.fail_rate {
            return Err(AppError::TransferError("simulated transfer failure".into()));
        }
        Ok(())
    }
}

/// Cheap, dependency-free pseudo-randomness in `[0, 1)` for the mock
/// backend's failure injection. Not suitable for anything security-sensitive
/// — it only needs to vary run to run for demo purposes.
fn sample_unit_interval() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1_000_000) as f64 / 1_000_000.0
}

/// Spawns a fixed pool of independent worker threads. Each
/// repeatedly pulls one `QueueMsg` and either transfers it or exits on
/// `Stop`. A worker thread that panics is isolated by Rust's own thread
/// model — other workers are unaffected; the caller observes the crash via
/// `JoinHandle::join` returning `Err` and is responsible for logging
/// `AppError::UnexpectedWorkerCrash`.
pub fn spawn_workers(
    count: usize,
    queue_rx: Receiver<QueueMsg>,
    site_dir: Arc<dyn SiteSource>,
    backend: Arc<dyn UploadBackend>,
    progress_tx: Sender<ProgressEvent>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let queue_rx = queue_rx.clone();
            let site_dir = site_dir.clone();
            let backend = backend.clone();
            let progress_tx = progress_tx.clone();
            std::thread::Builder::new()
                .name(format!("upload-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, queue_rx, site_dir, backend, progress_tx))
                .expect("failed to spawn upload worker thread")
        })
        .collect()
}

fn worker_loop(
    worker_id: usize,
    queue_rx: Receiver<QueueMsg>,
    site_dir: Arc<dyn SiteSource>,
    backend: Arc<dyn UploadBackend>,
    progress_tx: Sender<ProgressEvent>,
) {
    loop {
        let job = match queue_rx.recv() {
            Ok(QueueMsg::Stop) => break,
            Ok(QueueMsg::Job(job)) => job,
            Err(_) => break,
        };

        let params = match site_dir.lookup(&job.site) {
            Ok(p) => p,
            Err(e) => {
                let _ = progress_tx.send(ProgressEvent::error(job.id, job.content.size, worker_id, e.to_string()));
                continue;
            }
        };

        let job_id = job.id;
        let size = job.content.size;
        let progress_tx_cb = progress_tx.clone();
        let mut on_progress = move |sent: u64| {
            let _ = progress_tx_cb.send(ProgressEvent::progress(job_id, sent, size, worker_id));
        };

        if let Err(e) = backend.upload(&params, &job.content, &mut on_progress) {
            let _ = progress_tx.send(ProgressEvent::error(job_id, size, worker_id, e.to_string()));
        }
    }
    tracing::debug!("[worker {worker_id}] stopped");
}
