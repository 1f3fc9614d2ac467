mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    AsrSettings, AzureSettings, DatabaseSettings, LlmProviderSettings, LlmSettings,
    LoggingSettings, PipelineSettings, RedisSettings, S3Settings, ServerSettings, Settings,
    StorageSettings, UploadSettings,
};
