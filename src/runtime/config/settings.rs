use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use super::Environment;

pub const ENV_PREFIX: &str = "PIPELINE";
pub const DEFAULT_CONFIG_DIR: &str = "config";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub worker: WorkerSettings,
    pub queue: QueueSettings,
    pub retry: RetrySettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub transcoder: TranscoderSettings,
    #[serde(default)]
    pub publishing: PublishingSettings,
    pub moderation: ModerationSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_DIR), environment)
    }

    /// Layers `default.toml`, the optional `{environment}.toml` and
    /// `PIPELINE__SECTION__KEY` environment variables.
    pub fn load_from(config_dir: &Path, environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(config_dir.join("default")).required(true))
            .add_source(File::from(config_dir.join(environment.as_str())).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("moderation.banned_keywords")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()
            .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.worker.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub scratch_path: PathBuf,
    pub consumer_prefix: String,
    /// Zero disables reclaiming messages abandoned by other consumers.
    pub reclaim_idle_secs: u64,
    /// Zero disables the per-job deadline.
    pub job_timeout_secs: u64,
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn reclaim_idle(&self) -> Option<Duration> {
        (self.reclaim_idle_secs > 0).then(|| Duration::from_secs(self.reclaim_idle_secs))
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    /// Reclaim takes over any message idle longer than `reclaim_idle_secs`,
    /// so every job has to finish well before that.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reclaim_idle_secs == 0 {
            return Ok(());
        }
        if self.job_timeout_secs == 0 || self.job_timeout_secs * 2 > self.reclaim_idle_secs {
            return Err(ConfigError::Message(format!(
                "worker.reclaim_idle_secs ({}) must be at least twice worker.job_timeout_secs ({}), and the timeout must be set",
                self.reclaim_idle_secs, self.job_timeout_secs
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueProvider {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    pub provider: QueueProvider,
    pub url: String,
    pub transcode_topic: String,
    pub transcode_group: String,
    pub finalize_topic: String,
    pub finalize_group: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub transcode_max_attempts: u32,
    pub finalize_max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseProvider {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub provider: DatabaseProvider,
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderSetting {
    Local,
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub provider: StorageProviderSetting,
    pub local_path: PathBuf,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscoderSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub opus_kbps: u32,
    pub sample_rate: u32,
    pub rnnoise_model: Option<PathBuf>,
    pub waveform_points: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishingSettings {
    pub cdn_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationSettings {
    pub banned_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}
