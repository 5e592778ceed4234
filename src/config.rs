//! Application configuration management.
//!
//! Settings are layered with figment, later sources winning:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory (or `--config`)
//! 3. `DUPESCAN_*` environment variables
//! 4. Command-line flags ([`Config::merge_cli`], [`Config::merge_scan_args`])

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::ScanMode;
use crate::cli::{Cli, ScanArgs};
use crate::engine::ScanConfig;
use crate::scanner::DEFAULT_MMAP_THRESHOLD;

const ENV_PREFIX: &str = "DUPESCAN_";
const MIB: u64 = 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hash database location. `None` means the platform data directory.
    pub database: Option<PathBuf>,
    /// Partial hash size in MiB.
    pub partial_limit_mib: u64,
    /// Number of hashing threads.
    pub io_threads: usize,
    /// Skip directories whose files are all recorded.
    pub skip_known_dirs: bool,
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,
    /// Minimum file size in bytes for memory-mapped full hashing.
    pub mmap_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            partial_limit_mib: 2,
            io_threads: 4,
            skip_known_dirs: true,
            follow_symlinks: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from the default config file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a config source exists but cannot be parsed.
    pub fn load() -> Result<Self, figment::Error> {
        match Self::config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Self::figment(None).extract(),
        }
    }

    /// Load configuration from `path` and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment value is malformed.
    pub fn load_from_path(path: &Path) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(Some(path)).extract()?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Apply global command-line overrides.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(ref db) = cli.db {
            self.database = Some(db.clone());
        }
    }

    /// Apply `scan` subcommand overrides.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if let Some(limit) = args.limit {
            self.partial_limit_mib = limit;
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = usize::try_from(threads).unwrap_or(usize::MAX);
        }
        if args.no_dir_skip {
            self.skip_known_dirs = false;
        }
        if args.follow_symlinks {
            self.follow_symlinks = true;
        }
    }

    /// Partial hash size in bytes.
    #[must_use]
    pub fn partial_threshold_bytes(&self) -> u64 {
        self.partial_limit_mib.max(1).saturating_mul(MIB)
    }

    /// Resolved database location, or `None` if no data directory is known.
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.clone().or_else(Self::default_database_path)
    }

    /// Build the scan settings for `mode`.
    #[must_use]
    pub fn scan_config(&self, mode: ScanMode) -> ScanConfig {
        ScanConfig::default()
            .with_mode(mode)
            .with_partial_threshold(self.partial_threshold_bytes())
            .with_io_threads(self.io_threads)
            .with_skip_known_dirs(self.skip_known_dirs)
            .with_follow_symlinks(self.follow_symlinks)
            .with_mmap_threshold(Some(self.mmap_threshold))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "dupescan", "dupescan")
    }

    /// Default platform-specific configuration file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default platform-specific database path.
    #[must_use]
    pub fn default_database_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("dupescan.db"))
    }
}
