mod app_config;
mod s3_config;

pub use app_config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, Environment, S3Settings, ServerConfig,
    StorageConfig,
};
pub use s3_config::*;
