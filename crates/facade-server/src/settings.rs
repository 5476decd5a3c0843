//! Application settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `vcs-facade.{yaml,toml,json}` file (path overridable with
//! `FACADE_CONFIG`), and `FACADE__`-prefixed environment variables, e.g.
//! `FACADE__SERVER__PORT=9090`.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use facade_index::{ExecutorSettings, ScanSettings};
use facade_vcs::BackendConfig;

use crate::cache::CacheConfig;
use crate::job::JobSettings;

/// Default settings file, without extension.
pub const DEFAULT_CONFIG_FILE: &str = "vcs-facade";

/// Environment variable overriding the settings file path.
pub const CONFIG_PATH_ENV: &str = "FACADE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub job: JobSection,
    pub scan: ScanSection,
    pub scheduler: SchedulerSection,
    pub repository_cache: CacheSection,
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Deferred-result job settings. Durations are whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSection {
    #[serde(with = "duration_secs")]
    pub fast_work_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub retry_after: Duration,
    pub pool_size: usize,
    /// Uncollected jobs idle this long are dropped.
    #[serde(with = "duration_secs")]
    pub abandon_after: Duration,
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            fast_work_timeout: Duration::from_secs(2),
            retry_after: Duration::from_secs(10),
            pool_size: 8,
            abandon_after: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub pool_size: usize,
    pub queue_capacity: usize,
    #[serde(with = "duration_secs")]
    pub submit_delay: Duration,
    /// Six-field cron expression (seconds first).
    pub rescan_cron: String,
    pub batch_size: usize,
    pub max_commits_per_ref: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            pool_size: 4,
            queue_capacity: 64,
            submit_delay: Duration::from_secs(5),
            rescan_cron: "0 0 */6 * * *".to_string(),
            batch_size: 100,
            max_commits_per_ref: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Hostname of the instance allowed to schedule scans. Blank means
    /// every instance schedules.
    pub master_hostname: Option<String>,
    /// Hostname of this instance; `$HOSTNAME` when unset.
    pub local_hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    pub max_capacity: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 10_000,
        }
    }
}

impl Settings {
    /// Loads settings from the default file (if present) and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Loads settings from `path` (optional, any supported format) and
    /// environment.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("FACADE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            fast_work_timeout: self.job.fast_work_timeout,
            retry_after: self.job.retry_after,
            pool_size: self.job.pool_size,
            abandon_after: self.job.abandon_after,
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            batch_size: self.scan.batch_size,
            max_commits_per_ref: self.scan.max_commits_per_ref,
            ..ScanSettings::default()
        }
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            pool_size: self.scan.pool_size,
            queue_capacity: self.scan.queue_capacity,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.repository_cache.ttl,
            max_capacity: self.repository_cache.max_capacity,
        }
    }

    /// Hostname this instance compares against the master hostname.
    pub fn local_hostname(&self) -> String {
        self.scheduler
            .local_hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_default()
    }
}

mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
