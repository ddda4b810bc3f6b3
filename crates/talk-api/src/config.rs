//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Timeout for plain JSON requests (uploads and streams are exempt)
    pub request_timeout: Duration,
    /// Largest accepted upload in bytes
    pub max_upload_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Where uploaded videos are written and served from
    pub upload_dir: PathBuf,
    /// Externally visible base URL, used to build `video_path`
    pub public_base_url: String,
    /// Expose Prometheus metrics on `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_rps: 10,
            request_timeout: Duration::from_secs(30),
            max_upload_size: 1024 * 1024 * 1024, // 1GiB
            environment: "development".to_string(),
            upload_dir: PathBuf::from("uploads"),
            public_base_url: "http://localhost:8000".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            request_timeout: std::env::var("REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Public URL of a stored upload.
    pub fn video_url(&self, stored_filename: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, stored_filename)
    }

    /// Local path of a stored upload.
    pub fn upload_path(&self, stored_filename: &str) -> PathBuf {
        self.upload_dir.join(stored_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_url() {
        let config = ApiConfig {
            public_base_url: "https://talks.example.com".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(
            config.video_url("abc_talk.mp4"),
            "https://talks.example.com/uploads/abc_talk.mp4"
        );
        assert_eq!(config.upload_path("abc_talk.mp4"), PathBuf::from("uploads/abc_talk.mp4"));
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());
        config.environment = "Production".to_string();
        assert!(config.is_production());
    }
}
