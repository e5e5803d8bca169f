use std::path::PathBuf;

/// Process-wide settings resolved once at startup from CLI flags with
/// environment-variable fallbacks. There is no on-disk settings file: the
/// only on-disk state this program reads is the Site Directory's per-site
/// profiles, which `Config` does not own.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the Upload Worker Pool. Default 10.
    pub workers: usize,
    /// Overrides the Site Directory's resolution dir; falls through to
    /// `AVALON_SFTPC_SITES`, then `<install>/sites`.
    pub sites_dir: Option<PathBuf>,
    /// Engages the mock Producer/Upload-backend pair so the whole
    /// staging/dispatch/cancel lifecycle can be exercised without live SSH
    /// credentials or real files on disk.
    pub demo: bool,
    /// Raises the log level to DEBUG and enables the file sink.
    pub debug: bool,
}

impl Config {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        let workers = cli.workers.unwrap_or_else(|| {
            std::env::var("AVALON_SFTPC_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10)
        });
        Config {
            workers,
            sites_dir: cli.sites_dir.clone(),
            demo: cli.demo,
            debug: cli.debug || cli.verbose,
        }
    }

    /// Directory that holds this run's log file, created on demand.
    /// `SFTPC_LOG_DIR` overrides the conventional per-user data directory.
    pub fn log_dir(&self) -> PathBuf {
        std::env::var_os("SFTPC_LOG_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_local_dir().map(|d| d.join("sftpc").join("logs")))
            .unwrap_or_else(|| PathBuf::from("sftpc-logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn workers_defaults_to_ten() {
        let cli = Cli::parse_from(["sftpc"]);
        let cfg = Config::from_cli(&cli);
        assert_eq!(cfg.workers, 10);
    }

    #[test]
    fn explicit_workers_flag_wins() {
        let cli = Cli::parse_from(["sftpc", "--workers", "3"]);
        let cfg = Config::from_cli(&cli);
        assert_eq!(cfg.workers, 3);
    }

    #[test]
    fn demo_flag_is_carried() {
        let cli = Cli::parse_from(["sftpc", "--demo"]);
        assert!(Config::from_cli(&cli).demo);
    }
}
