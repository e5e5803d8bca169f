use std::path::Path;

/// Abstracts the SFTP operations a worker needs so the worker loop can be
/// driven against a mock connection in tests and in demo mode, without
/// touching the network. Implementors must be `Send` so they can live
/// inside a worker thread as a trait object.
pub trait SftpLike: Send {
    fn stat_is_file(&self, p: &Path) -> Result<bool, String>;
    fn mkdir(&self, p: &Path, mode: i32) -> Result<(), String>;
    fn create_write(&self, p: &Path) -> Result<Box<dyn std::io::Write + Send>, String>;
    fn open_read(&self, p: &Path) -> Result<Box<dyn std::io::Read + Send>, String>;
    /// Best-effort mtime preservation after a `put` (`preserve_mtime=true`).
    /// Not every backend can honour this (the mock backend is a no-op);
    /// failures here are swallowed by the caller rather than failing the
    /// transfer.
    fn set_mtime(&self, _p: &Path, _mtime: u64) -> Result<(), String> {
        Ok(())
    }
}

/// Adapter over an owned `ssh2::Sftp` session.
pub struct Ssh2Adapter(pub ssh2::Sftp);

impl SftpLike for Ssh2Adapter {
    fn stat_is_file(&self, p: &Path) -> Result<bool, String> {
        match self.0.stat(p) {
            Ok(st) => Ok(st.is_file()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn mkdir(&self, p: &Path, mode: i32) -> Result<(), String> {
        self.0.mkdir(p, mode).map_err(|e| e.to_string())
    }

    fn create_write(&self, p: &Path) -> Result<Box<dyn std::io::Write + Send>, String> {
        self.0.create(p).map(|f| Box::new(f) as Box<dyn std::io::Write + Send>).map_err(|e| e.to_string())
    }

    fn open_read(&self, p: &Path) -> Result<Box<dyn std::io::Read + Send>, String> {
        self.0.open(p).map(|f| Box::new(f) as Box<dyn std::io::Read + Send>).map_err(|e| e.to_string())
    }

    fn set_mtime(&self, p: &Path, mtime: u64) -> Result<(), String> {
        let mut st = self.0.stat(p).map_err(|e| e.to_string())?;
        st.mtime = Some(mtime);
        self.0.setstat(p, st).map_err(|e| e.to_string())
    }
}

/// Recursively creates `dir_path` on the remote, tolerating "already exists"
/// failures at each path component: a component that already exists as a directory is fine; one that
/// exists as a file is a hard error; any other mkdir failure is re-checked
/// once (a concurrent creator may have won the race) before being reported.
pub fn ensure_remote_dir_all(sftp: &dyn SftpLike, dir_path: &Path) -> Result<(), String> {
    let mut accum = std::path::PathBuf::new();
    for comp in dir_path.components() {
        use std::path::Component;
        match comp {
            Component::RootDir => accum.push(Path::new("/")),
            Component::Prefix(_) | Component::CurDir | Component::ParentDir => {}
            Component::Normal(seg) => accum.push(seg),
        }
        let p = accum.as_path();
        if p.as_os_str().is_empty() {
            continue;
        }
        match sftp.stat_is_file(p) {
            Ok(true) => return Err(format!("remote path exists as a file, expected directory: {}", p.display())),
            Ok(false) => continue,
            Err(_) => {
                if let Err(e) = sftp.mkdir(p, 0o755) {
                    match sftp.stat_is_file(p) {
                        Ok(true) => {
                            return Err(format!(
                                "remote path exists as a file, expected directory: {}",
                                p.display()
                            ));
                        }
                        Ok(false) => continue,
                        Err(_) => return Err(e),
                    }
                }
            }
        }
    }
    Ok(())
}
