use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use sha2::{Digest, Sha512};

use crate::error::AppError;
use crate::model::job::{Job, JobContent};
use crate::model::package::Package;

/// One element of the manifest JSON array. Unknown fields are ignored
/// by virtue of not being named here; a missing required field fails
/// deserialization, which `Producer::digest` turns into `ManifestSchemaError`.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    project: String,
    #[serde(rename = "type")]
    kind: String,
    description: String,
    site: String,
    files: Vec<(String, String)>,
}

/// Seam for measuring a local file's size. `RealFileStat` calls `stat`;
/// `MockFileStat` returns a fixed size without touching the filesystem, used
/// by demo mode and by tests that don't want real files on disk.
pub trait FileStat: Send + Sync {
    fn size(&self, path: &Path) -> Result<u64, AppError>;
}

pub struct RealFileStat;

impl FileStat for RealFileStat {
    fn size(&self, path: &Path) -> Result<u64, AppError> {
        std::fs::metadata(path).map(|m| m.len()).map_err(|_| AppError::MissingFile(path.to_path_buf()))
    }
}

pub struct MockFileStat {
    pub default_size: u64,
}

impl Default for MockFileStat {
    fn default() -> Self {
        MockFileStat { default_size: 1000 }
    }
}

impl FileStat for MockFileStat {
    fn size(&self, _path: &Path) -> Result<u64, AppError> {
        Ok(self.default_size)
    }
}

/// Parses a manifest document into hashed, deduplicated `Package` units and
/// streams them to a callback in manifest order.
///
/// One `Producer` drives at most one manifest run at a time; `start` spawns
/// a dedicated background thread, kept distinct from the worker pool and the
/// aggregator. `stop` is cooperative: the run loop checks it only between
/// packages.
pub struct Producer {
    stat: Arc<dyn FileStat>,
    producing: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
}

impl Producer {
    pub fn new(stat: Arc<dyn FileStat>) -> Self {
        Producer { stat, producing: Arc::new(AtomicBool::new(false)), stop_flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn is_producing(&self) -> bool {
        self.producing.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Spawns the background digest thread. `on_package` is invoked once per
    /// Package in manifest order; `on_complete` fires exactly once, whether
    /// the manifest was exhausted, stopped early, or aborted by an error.
    pub fn start(
        &self,
        manifest_path: PathBuf,
        mut on_package: impl FnMut(Package) + Send + 'static,
        on_complete: impl FnOnce(Option<AppError>) + Send + 'static,
    ) {
        let stat = self.stat.clone();
        let producing = self.producing.clone();
        let stop_flag = self.stop_flag.clone();
        stop_flag.store(false, Ordering::Release);
        producing.store(true, Ordering::Release);

        std::thread::spawn(move || {
            let outcome = digest(&manifest_path, stat.as_ref(), &stop_flag, &mut on_package);
            producing.store(false, Ordering::Release);
            on_complete(outcome.err());
        });
    }
}

fn digest(
    manifest_path: &Path,
    stat: &dyn FileStat,
    stop_flag: &AtomicBool,
    on_package: &mut dyn FnMut(Package),
) -> Result<(), AppError> {
    let text = std::fs::read_to_string(manifest_path)
        .map_err(|e| AppError::ManifestIo(manifest_path.to_path_buf(), e.to_string()))?;
    let entries: Vec<ManifestEntry> =
        serde_json::from_str(&text).map_err(|e| AppError::ManifestSchemaError(e.to_string()))?;

    for entry in entries {
        if stop_flag.load(Ordering::Acquire) {
            break;
        }
        let package = build_package(entry, stat)?;
        on_package(package);
    }
    Ok(())
}

fn build_package(entry: ManifestEntry, stat: &dyn FileStat) -> Result<Package, AppError> {
    let mut files = entry.files;
    files.sort();
    files.dedup();

    let mut hasher = Sha512::new();
    let mut total_size: u64 = 0;
    let mut jobs = Vec::with_capacity(files.len());

    for (src, dst) in &files {
        let size = stat.size(Path::new(src))?;
        total_size += size;
        hasher.update(src.as_bytes());
        hasher.update(dst.as_bytes());
        jobs.push(Arc::new(Job::new(
            entry.site.clone(),
            JobContent { local: PathBuf::from(src), remote: dst.clone(), size },
        )));
    }

    if total_size == 0 {
        return Err(AppError::EmptyPackage { project: entry.project, site: entry.site });
    }

    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    let hash = format!("{}{}", entry.site, hex);

    Ok(Package::new(entry.project, entry.kind, entry.description, entry.site, jobs, total_size, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn write_manifest(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("manifest.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn happy_path_single_package() {
        let dir = std::env::temp_dir().join(format!("sftpc-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = write_manifest(
            &dir,
            r#"[{"project":"P","type":"Workfile","description":"d","site":"s1","files":[["/a.bin","/r/a.bin"]]}]"#,
        );

        let producer = Producer::new(Arc::new(MockFileStat { default_size: 1024 }));
        let packages: Arc<Mutex<Vec<Package>>> = Arc::new(Mutex::new(Vec::new()));
        let packages2 = packages.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        producer.start(
            manifest,
            move |pkg| packages2.lock().unwrap().push(pkg),
            move |err| {
                let _ = done_tx.send(err);
            },
        );

        let err = done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert!(err.is_none());
        let packages = packages.lock().unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].total_size, 1024);
        assert_eq!(packages[0].job_count(), 1);
    }

    #[test]
    fn empty_manifest_emits_nothing() {
        let dir = std::env::temp_dir().join(format!("sftpc-test-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = write_manifest(&dir, "[]");

        let producer = Producer::new(Arc::new(MockFileStat::default()));
        let count = Arc::new(Mutex::new(0usize));
        let count2 = count.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        producer.start(
            manifest,
            move |_| *count2.lock().unwrap() += 1,
            move |err| {
                let _ = done_tx.send(err);
            },
        );
        let err = done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert!(err.is_none());
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn zero_byte_package_is_rejected() {
        let dir = std::env::temp_dir().join(format!("sftpc-test-zero-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = write_manifest(
            &dir,
            r#"[{"project":"P","type":"Workfile","description":"d","site":"s1","files":[["/a.bin","/r/a.bin"]]}]"#,
        );

        let producer = Producer::new(Arc::new(MockFileStat { default_size: 0 }));
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        producer.start(
            manifest,
            |_| {},
            move |err| {
                let _ = done_tx.send(err);
            },
        );
        let err = done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert!(matches!(err, Some(AppError::EmptyPackage { .. })));
    }

    #[test]
    fn hashing_same_manifest_twice_is_byte_equal() {
        let dir = std::env::temp_dir().join(format!("sftpc-test-hash-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let body = r#"[{"project":"P","type":"Workfile","description":"d","site":"s1","files":[["/a.bin","/r/a.bin"],["/b.bin","/r/b.bin"]]}]"#;
        let manifest = write_manifest(&dir, body);

        let hashes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let producer = Producer::new(Arc::new(MockFileStat::default()));
            let hashes2 = hashes.clone();
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            producer.start(
                manifest.clone(),
                move |pkg| hashes2.lock().unwrap().push(pkg.hash.clone()),
                move |err| {
                    let _ = done_tx.send(err);
                },
            );
            done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        }
        let hashes = hashes.lock().unwrap();
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn unordered_duplicate_files_yield_same_hash() {
        let dir = std::env::temp_dir().join(format!("sftpc-test-dedup-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let a = write_manifest(
            &dir,
            r#"[{"project":"P","type":"T","description":"d","site":"s1","files":[["/a","/ra"],["/b","/rb"]]}]"#,
        );
        let b_path = dir.join("manifest_b.json");
        std::fs::write(
            &b_path,
            r#"[{"project":"P","type":"T","description":"d","site":"s1","files":[["/b","/rb"],["/a","/ra"],["/a","/ra"]]}]"#,
        )
        .unwrap();

        let mut hashes = Vec::new();
        for manifest in [a, b_path] {
            let producer = Producer::new(Arc::new(MockFileStat::default()));
            let got: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
            let got2 = got.clone();
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            producer.start(
                manifest,
                move |pkg| *got2.lock().unwrap() = Some(pkg.hash.clone()),
                move |err| {
                    let _ = done_tx.send(err);
                },
            );
            done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
            hashes.push(got.lock().unwrap().clone().unwrap());
        }
        assert_eq!(hashes[0], hashes[1]);
    }
}
