mod environment;
mod settings;

pub use environment::{ENVIRONMENT_VAR, Environment};
pub use settings::{
    DEFAULT_CONFIG_DIR, DatabaseProvider, DatabaseSettings, ENV_PREFIX, LoggingSettings,
    ModerationSettings, PublishingSettings, QueueProvider, QueueSettings, RetrySettings,
    Settings, StorageProviderSetting, StorageSettings, TranscoderSettings, WorkerSettings,
};
