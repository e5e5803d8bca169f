use std::path::PathBuf;

use crate::error::AppError;

/// Connection parameters resolved for one named site. Loaded on demand by
/// [`SiteDirectory::lookup`]; never mutated after load.
#[derive(Debug, Clone)]
pub struct SiteParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Decoded `ssh-rsa` host key bytes, if the profile pinned one. Absence
    /// disables host verification — a deliberate, documented default for
    /// internal deployments.
    pub hostkey: Option<Vec<u8>>,
}

/// Resolves a site name to its connection parameters. Implemented by
/// [`SiteDirectory`] (reads `<sites_dir>/<name>.cfg`) and by
/// [`MockSiteSource`] (synthesizes params, touching neither disk nor
/// network), so the Upload Worker Pool can run identically against either —
/// demo mode means no network or filesystem access at all, which covers
/// site resolution, not just the transfer itself.
pub trait SiteSource: Send + Sync {
    fn lookup(&self, site_name: &str) -> Result<SiteParams, AppError>;
}

/// Resolves a site name to [`SiteParams`] by reading `<sites_dir>/<name>.cfg`,
/// a key/value profile under an `[avalon-sftp]` section. Read-only; no
/// caching is required since each connection attempt calls `lookup` once.
pub struct SiteDirectory {
    sites_dir: PathBuf,
}

impl SiteDirectory {
    /// `sites_dir` resolution order: explicit override, else the
    /// `AVALON_SFTPC_SITES` environment variable, else `<install>/sites`
    /// alongside the running executable.
    pub fn new(sites_dir_override: Option<PathBuf>) -> Self {
        let sites_dir = sites_dir_override
            .or_else(|| std::env::var_os("AVALON_SFTPC_SITES").map(PathBuf::from))
            .unwrap_or_else(default_sites_dir);
        SiteDirectory { sites_dir }
    }

    pub fn lookup(&self, site_name: &str) -> Result<SiteParams, AppError> {
        let path = self.sites_dir.join(format!("{}.cfg", site_name));
        let text = std::fs::read_to_string(&path)
            .map_err(|_| AppError::ConfigMissing(site_name.to_string()))?;
        parse_site_config(&text).ok_or_else(|| AppError::ConfigMissing(site_name.to_string()))
    }
}

impl SiteSource for SiteDirectory {
    fn lookup(&self, site_name: &str) -> Result<SiteParams, AppError> {
        SiteDirectory::lookup(self, site_name)
    }
}

/// Synthesizes `SiteParams` for any site name without touching disk, for
/// demo mode and for tests that don't want `.cfg` fixtures on disk.
#[derive(Default)]
pub struct MockSiteSource;

impl SiteSource for MockSiteSource {
    fn lookup(&self, site_name: &str) -> Result<SiteParams, AppError> {
        Ok(SiteParams {
            host: format!("{site_name}.demo.invalid"),
            port: 22,
            username: "demo".into(),
            password: String::new(),
            hostkey: None,
        })
    }
}

fn default_sites_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join("sites")))
        .unwrap_or_else(|| PathBuf::from("sites"))
}

/// Parses the `[avalon-sftp]` key/value section. Intentionally hand-rolled
/// rather than pulled in through a general-purpose INI crate: the format has
/// exactly one section and four flat keys, and the original tool reads it
/// with nothing fancier than a line scanner either.
fn parse_site_config(text: &str) -> Option<SiteParams> {
    let mut host = None;
    let mut port: u16 = 22;
    let mut username = None;
    let mut password = None;
    let mut hostkey_raw = String::new();
    let mut in_section = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = line.trim_matches(['[', ']']) == "avalon-sftp";
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        let value = value.trim();
        match key {
            "host" => host = Some(value.to_string()),
            "port" => port = value.parse().unwrap_or(22),
            "username" => username = Some(value.to_string()),
            "password" => password = Some(value.to_string()),
            "hostkey" => hostkey_raw.push_str(value),
            _ => {}
        }
    }

    let host = host?;
    let username = username?;
    let password = password.unwrap_or_default();
    let hostkey = if hostkey_raw.is_empty() {
        None
    } else {
        let stripped: String = hostkey_raw.split_whitespace().collect();
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.decode(stripped).ok()
    };

    Some(SiteParams { host, port, username, password, hostkey })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_profile() {
        let cfg = "[avalon-sftp]\nhost = example.com\nusername = bob\npassword = secret\n";
        let params = parse_site_config(cfg).unwrap();
        assert_eq!(params.host, "example.com");
        assert_eq!(params.port, 22);
        assert_eq!(params.username, "bob");
        assert_eq!(params.password, "secret");
        assert!(params.hostkey.is_none());
    }

    #[test]
    fn parses_port_and_whitespace_stripped_hostkey() {
        let cfg = "[avalon-sftp]\nhost=h\nport=2222\nusername=u\npassword=p\nhostkey= aGVsbG8=\n   \n";
        let params = parse_site_config(cfg).unwrap();
        assert_eq!(params.port, 2222);
        assert_eq!(params.hostkey.unwrap(), b"hello");
    }

    #[test]
    fn missing_host_fails() {
        let cfg = "[avalon-sftp]\nusername=u\npassword=p\n";
        assert!(parse_site_config(cfg).is_none());
    }

    #[test]
    fn lookup_missing_file_is_config_missing() {
        let dir = SiteDirectory::new(Some(PathBuf::from("/nonexistent/sites/dir")));
        let err = dir.lookup("no-such-site").unwrap_err();
        assert!(matches!(err, AppError::ConfigMissing(_)));
    }
}
