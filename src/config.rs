/// Configuration management for Driftcast
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Top-level configuration tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Bind address and public URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub public_url: Option<String>,
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Transcoding pipeline callback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
    /// Accepted clock skew for signed event timestamps, in seconds
    pub webhook_tolerance_secs: u64,
    /// Base URL for playback-derived imagery (thumbnails, previews)
    pub image_base_url: String,
}

/// Limiter quotas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

/// Log level default for the tracing filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Read every setting from the environment, after loading `.env`
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("DRIFT_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DRIFT_PORT")
            .unwrap_or_else(|_| "8790".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("DRIFT_PUBLIC_URL").ok();

        let data_directory: PathBuf = env::var("DRIFT_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("DRIFT_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("driftcast.sqlite"));

        let webhook_secret = env::var("DRIFT_WEBHOOK_SECRET")
            .map_err(|_| ApiError::Validation("Webhook secret required".to_string()))?;
        let webhook_tolerance_secs = env::var("DRIFT_WEBHOOK_TOLERANCE_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);
        let image_base_url = env::var("DRIFT_IMAGE_BASE_URL")
            .unwrap_or_else(|_| format!("https://{}/images", hostname));

        let rate_limit_enabled = env::var("DRIFT_RATE_LIMIT_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);
        let authenticated_rps = env::var("DRIFT_RATE_LIMIT_AUTHENTICATED_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let unauthenticated_rps = env::var("DRIFT_RATE_LIMIT_UNAUTHENTICATED_RPS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        let burst_size = env::var("DRIFT_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let log_level = env::var("DRIFT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            media: MediaConfig {
                webhook_secret,
                webhook_tolerance_secs,
                image_base_url,
            },
            rate_limit: RateLimitSettings {
                enabled: rate_limit_enabled,
                authenticated_rps,
                unauthenticated_rps,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.media.webhook_secret.len() < 16 {
            return Err(ApiError::Validation(
                "Webhook secret must be at least 16 characters".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8790,
                public_url: None,
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/driftcast.sqlite".into(),
            },
            media: MediaConfig {
                webhook_secret: "0123456789abcdef".to_string(),
                webhook_tolerance_secs: 300,
                image_base_url: "https://localhost/images".to_string(),
            },
            rate_limit: RateLimitSettings {
                enabled: true,
                authenticated_rps: 100,
                unauthenticated_rps: 20,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn short_webhook_secret_rejected() {
        let mut config = sample_config();
        config.media.webhook_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_hostname_rejected() {
        let mut config = sample_config();
        config.service.hostname = String::new();
        assert!(config.validate().is_err());
    }
}
