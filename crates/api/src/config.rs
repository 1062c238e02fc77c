use std::path::PathBuf;
use std::time::Duration;

use storyreel_backends::{PollConfig, RetryPolicy};
use storyreel_core::generation::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, DEFAULT_VIDEO_POLL_INTERVAL,
    DEFAULT_VIDEO_POLL_MAX_ATTEMPTS,
};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Generation and
    /// assembly requests are not bounded by it.
    pub request_timeout_secs: u64,
    /// PostgreSQL URL. Without one the server runs on an in-memory store.
    pub database_url: Option<String>,
    pub pipeline: PipelineConfig,
}

/// External services and pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image_backend_url: String,
    pub image_model: String,
    pub video_backend_url: String,
    pub video_model: String,
    /// Directory generated assets are written under.
    pub storage_root: PathBuf,
    /// URL prefix `storage_root` is served from.
    pub storage_public_url: String,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub video_poll_interval: Duration,
    pub video_poll_max_attempts: u32,
    /// Parent of the media engine's working directory.
    pub ffmpeg_work_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                         |
    /// |----------------------------|---------------------------------|
    /// | `HOST`                     | `0.0.0.0`                       |
    /// | `PORT`                     | `3000`                          |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`         |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                            |
    /// | `DATABASE_URL`             | unset (in-memory store)         |
    /// | `IMAGE_BACKEND_URL`        | `http://localhost:8100`         |
    /// | `IMAGE_MODEL`              | `image-default`                 |
    /// | `VIDEO_BACKEND_URL`        | `http://localhost:8200`         |
    /// | `VIDEO_MODEL`              | `video-default`                 |
    /// | `STORAGE_ROOT`             | `./storage`                     |
    /// | `STORAGE_PUBLIC_URL`       | `http://localhost:3000/media`   |
    /// | `RETRY_MAX_ATTEMPTS`       | `3`                             |
    /// | `RETRY_BASE_DELAY_MS`      | `1000`                          |
    /// | `VIDEO_POLL_INTERVAL_SECS` | `10`                            |
    /// | `VIDEO_POLL_MAX_ATTEMPTS`  | `60`                            |
    /// | `FFMPEG_WORK_DIR`          | system temp dir                 |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = env_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            pipeline: PipelineConfig::from_env(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let retry_max_attempts: u32 = env_or("RETRY_MAX_ATTEMPTS", &DEFAULT_RETRY_ATTEMPTS.to_string())
            .parse()
            .expect("RETRY_MAX_ATTEMPTS must be a valid u32");
        let retry_base_delay_ms: u64 = env_or(
            "RETRY_BASE_DELAY_MS",
            &DEFAULT_RETRY_BASE_DELAY.as_millis().to_string(),
        )
        .parse()
        .expect("RETRY_BASE_DELAY_MS must be a valid u64");
        let video_poll_interval_secs: u64 = env_or(
            "VIDEO_POLL_INTERVAL_SECS",
            &DEFAULT_VIDEO_POLL_INTERVAL.as_secs().to_string(),
        )
        .parse()
        .expect("VIDEO_POLL_INTERVAL_SECS must be a valid u64");
        let video_poll_max_attempts: u32 = env_or(
            "VIDEO_POLL_MAX_ATTEMPTS",
            &DEFAULT_VIDEO_POLL_MAX_ATTEMPTS.to_string(),
        )
        .parse()
        .expect("VIDEO_POLL_MAX_ATTEMPTS must be a valid u32");

        let ffmpeg_work_dir = std::env::var("FFMPEG_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        Self {
            image_backend_url: env_or("IMAGE_BACKEND_URL", "http://localhost:8100"),
            image_model: env_or("IMAGE_MODEL", "image-default"),
            video_backend_url: env_or("VIDEO_BACKEND_URL", "http://localhost:8200"),
            video_model: env_or("VIDEO_MODEL", "video-default"),
            storage_root: PathBuf::from(env_or("STORAGE_ROOT", "./storage")),
            storage_public_url: env_or("STORAGE_PUBLIC_URL", "http://localhost:3000/media"),
            retry_max_attempts,
            retry_base_delay: Duration::from_millis(retry_base_delay_ms),
            video_poll_interval: Duration::from_secs(video_poll_interval_secs),
            video_poll_max_attempts,
            ffmpeg_work_dir,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts, self.retry_base_delay)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.video_poll_interval,
            max_attempts: self.video_poll_max_attempts,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
