use crate::error::{PnaError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DriverConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverConfig {
    /// In-process actuators; nothing leaves the machine.
    Simulated {
        #[serde(default)]
        latency_ms: u64,
    },
    /// The actuator bridge service.
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig::Simulated { latency_ms: 0 }
    }
}

// ---------------------------------------------------------------------------
// RunnerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Delay between jobs while the queue is running.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_jobs_db")]
    pub jobs_db: PathBuf,
}

fn default_jobs_db() -> PathBuf {
    PathBuf::from(paths::JOBS_DB)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            jobs_db: default_jobs_db(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_macros_dir")]
    pub macros_dir: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_macros_dir() -> PathBuf {
    PathBuf::from(paths::MACROS_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            driver: DriverConfig::default(),
            runner: RunnerConfig::default(),
            storage: StorageConfig::default(),
            macros_dir: default_macros_dir(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PnaError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn jobs_db_path(&self, root: &Path) -> PathBuf {
        paths::under_root(root, &self.storage.jobs_db)
    }

    pub fn macros_path(&self, root: &Path) -> PathBuf {
        paths::under_root(root, &self.macros_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let DriverConfig::Http {
            base_url,
            timeout_secs,
        } = &self.driver
        {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("driver.base_url '{base_url}' is not an http(s) URL"),
                });
            }
            if *timeout_secs == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "driver.timeout_secs is 0; every bridge call will time out"
                        .to_string(),
                });
            }
        }

        if self.runner.interval_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "runner.interval_ms is 0; the queue will run jobs back-to-back"
                    .to_string(),
            });
        }

        if self.storage.jobs_db.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "storage.jobs_db is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
