// src/config.rs
//! Configuration file parsing
//!
//! TOML with the following sections, all optional:
//! - [rpc] - Metadata service host, endpoint path, batch URL limit
//! - [cache] - Build and reviewed-recipe cache directories
//! - [build] - Log files, polling interval, VCS probe timeout
//! - [search] - Debounce interval

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub search: SearchSection,
}

/// Metadata service settings
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Longest batch info request path
    #[serde(default = "default_max_url_len")]
    pub max_url_len: usize,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            endpoint: default_endpoint(),
            max_url_len: default_max_url_len(),
        }
    }
}

/// Cache locations; unset paths resolve under the invoking user's home
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    /// One working copy per package group
    pub build_dir: Option<PathBuf>,

    /// Last accepted recipe per package group
    pub reviewed_dir: Option<PathBuf>,
}

/// Build pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    #[serde(default = "default_vcs_log_file")]
    pub vcs_log_file: PathBuf,

    /// How often the log tail is polled
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ceiling for the VCS version probe
    #[serde(default = "default_vcs_timeout_secs")]
    pub vcs_timeout_secs: u64,

    /// Artifacts kept per group when cleaning the build cache
    #[serde(default = "default_keep_artifacts")]
    pub keep_artifacts: usize,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            vcs_log_file: default_vcs_log_file(),
            poll_interval_ms: default_poll_interval_ms(),
            vcs_timeout_secs: default_vcs_timeout_secs(),
            keep_artifacts: default_keep_artifacts(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_host() -> String {
    "aur.archlinux.org".to_string()
}

fn default_endpoint() -> String {
    crate::rpc::DEFAULT_ENDPOINT.to_string()
}

fn default_max_url_len() -> usize {
    crate::rpc::MAX_URL_LEN
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/tmp/pmt_build.log")
}

fn default_vcs_log_file() -> PathBuf {
    PathBuf::from("/tmp/pmt_vcs_check.log")
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_vcs_timeout_secs() -> u64 {
    120
}

fn default_keep_artifacts() -> usize {
    2
}

fn default_debounce_ms() -> u64 {
    150
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or the default location; a missing default file yields defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `$XDG_CONFIG_HOME/pmt/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pmt").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc.host.is_empty() {
            return Err(Error::Config("rpc.host must not be empty".to_string()));
        }
        if !self.rpc.endpoint.starts_with('/') {
            return Err(Error::Config(format!(
                "rpc.endpoint must be an absolute path: {}",
                self.rpc.endpoint
            )));
        }
        if self.build.poll_interval_ms == 0 {
            return Err(Error::Config("build.poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Build cache directory, defaulting to `<home>/.cache/pmt/aur`
    pub fn build_dir(&self, home: &Path) -> PathBuf {
        self.cache
            .build_dir
            .clone()
            .unwrap_or_else(|| home.join(".cache/pmt/aur"))
    }

    /// Reviewed recipe directory, defaulting to `<home>/.cache/pmt/reviewed`
    pub fn reviewed_dir(&self, home: &Path) -> PathBuf {
        self.cache
            .reviewed_dir
            .clone()
            .unwrap_or_else(|| home.join(".cache/pmt/reviewed"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.build.poll_interval_ms)
    }

    pub fn vcs_timeout(&self) -> Duration {
        Duration::from_secs(self.build.vcs_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }
}
