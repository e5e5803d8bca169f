use std::path::PathBuf;

/// Structured errors for the staging-and-upload pipeline.
///
/// Producer-level variants (`ManifestSchemaError`, `EmptyPackage`,
/// `ManifestIo`) abort a manifest run. `ConfigMissing`, `ConnectionError` and
/// `TransferError` stay local to a single Job: they are recorded on the Job's
/// terminal result and never unwind a worker thread. `UnexpectedWorkerCrash`
/// is reported by the pool supervisor when a worker thread panics.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Site unknown or its profile unreadable/invalid.
    ConfigMissing(String),
    /// Manifest JSON did not match the documented schema.
    ManifestSchemaError(String),
    /// Manifest file could not be opened or read.
    ManifestIo(PathBuf, String),
    /// A package descriptor normalised to zero total bytes.
    EmptyPackage { project: String, site: String },
    /// A referenced local file does not exist or is unreadable.
    MissingFile(PathBuf),
    /// SFTP handshake / auth / host-key mismatch.
    ConnectionError(String),
    /// Mid-transfer failure: mkdir (non "exists") or read/write after connect.
    TransferError(String),
    /// A worker thread panicked; the pool is now down by one slot.
    UnexpectedWorkerCrash(usize),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use AppError::*;
        match self {
            ConfigMissing(site) => write!(f, "site '{}' has no usable configuration", site),
            ManifestSchemaError(msg) => write!(f, "manifest schema error: {}", msg),
            ManifestIo(path, msg) => {
                write!(f, "could not read manifest {}: {}", path.display(), msg)
            }
            EmptyPackage { project, site } => {
                write!(f, "package '{}' for site '{}' has zero total bytes", project, site)
            }
            MissingFile(path) => write!(f, "local file not found: {}", path.display()),
            ConnectionError(msg) => write!(f, "connection error: {}", msg),
            TransferError(msg) => write!(f, "transfer error: {}", msg),
            UnexpectedWorkerCrash(worker_id) => {
                write!(f, "worker {} crashed unexpectedly; pool is down by one", worker_id)
            }
        }
    }
}

impl std::error::Error for AppError {}
