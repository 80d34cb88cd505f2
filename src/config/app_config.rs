use crate::error::{AppError, Result};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub refresh_grace_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub base_url: Option<String>,
    pub s3: Option<S3Settings>,
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .as_str()
        {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .map_err(|_| AppError::ConfigError("Invalid PORT value".to_string()))?,
                max_body_size: env::var("MAX_BODY_SIZE")
                    .unwrap_or_else(|_| "12582912".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::ConfigError("Invalid MAX_BODY_SIZE value".to_string())
                    })?,
            },
            database: DatabaseConfig {
                url: env::var("DB_URL")
                    .map_err(|_| AppError::ConfigError("DB_URL not set".to_string()))?,
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::ConfigError("Invalid DB_MAX_CONNECTIONS value".to_string())
                    })?,
            },
            cors: CorsConfig {
                allowed_origins: env::var("FRONTEND_URL")
                    .map_err(|_| AppError::ConfigError("FRONTEND_URL not set".to_string()))?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| AppError::ConfigError("JWT_SECRET not set".to_string()))?,
                token_ttl_secs: env::var("TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "604800".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::ConfigError("Invalid TOKEN_TTL_SECS value".to_string())
                    })?,
                refresh_grace_secs: env::var("REFRESH_GRACE_SECS")
                    .unwrap_or_else(|_| "1209600".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::ConfigError("Invalid REFRESH_GRACE_SECS value".to_string())
                    })?,
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
                base_url: env::var("BASE_URL").ok().filter(|s| !s.is_empty()),
                s3: resolve_s3_settings(
                    env::var("AWS_ACCESS_KEY_ID").ok(),
                    env::var("AWS_SECRET_ACCESS_KEY").ok(),
                    env::var("S3_BUCKET_NAME").ok(),
                    env::var("AWS_REGION").ok(),
                )?,
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Storage backend selection happens once, at startup. All three credentials
/// present means S3, none means local disk, anything in between is a
/// configuration error rather than a silent downgrade.
fn resolve_s3_settings(
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    bucket: Option<String>,
    region: Option<String>,
) -> Result<Option<S3Settings>> {
    let access_key_id = access_key_id.filter(|s| !s.is_empty());
    let secret_access_key = secret_access_key.filter(|s| !s.is_empty());
    let bucket = bucket.filter(|s| !s.is_empty());

    match (access_key_id, secret_access_key, bucket) {
        (Some(access_key_id), Some(secret_access_key), Some(bucket)) => Ok(Some(S3Settings {
            access_key_id,
            secret_access_key,
            region: region.unwrap_or_else(|| "us-east-1".to_string()),
            bucket,
        })),
        (None, None, None) => Ok(None),
        _ => Err(AppError::ConfigError(
            "S3 storage is partially configured: AWS_ACCESS_KEY_ID, \
             AWS_SECRET_ACCESS_KEY and S3_BUCKET_NAME must be set together"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credentials_selects_local_storage() {
        let s3 = resolve_s3_settings(None, None, None, None).unwrap();
        assert!(s3.is_none());
    }

    #[test]
    fn full_credentials_select_s3() {
        let s3 = resolve_s3_settings(
            Some("key".to_string()),
            Some("secret".to_string()),
            Some("bucket".to_string()),
            Some("eu-west-1".to_string()),
        )
        .unwrap()
        .unwrap();

        assert_eq!(s3.bucket, "bucket");
        assert_eq!(s3.region, "eu-west-1");
    }

    #[test]
    fn region_defaults_when_unset() {
        let s3 = resolve_s3_settings(
            Some("key".to_string()),
            Some("secret".to_string()),
            Some("bucket".to_string()),
            None,
        )
        .unwrap()
        .unwrap();

        assert_eq!(s3.region, "us-east-1");
    }

    #[test]
    fn partial_credentials_fail_fast() {
        let result = resolve_s3_settings(Some("key".to_string()), None, None, None);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let s3 = resolve_s3_settings(
            Some(String::new()),
            Some(String::new()),
            Some(String::new()),
            None,
        )
        .unwrap();
        assert!(s3.is_none());
    }
}
