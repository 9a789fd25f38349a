//! Client configuration

use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Backend address used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Status checks allowed per job before giving up (30 minutes at the default interval)
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 1800;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base address, e.g. `http://127.0.0.1:8080`
    pub base_url: String,

    /// Delay between status checks
    pub poll_interval: Duration,

    /// Maximum number of status checks per job; `None` polls forever
    pub max_poll_attempts: Option<u32>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Timeout for submit, status and health calls; result downloads are not bounded
    pub request_timeout: Duration,

    /// Directory results are saved into
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
            max_poll_attempts: Some(DEFAULT_MAX_POLL_ATTEMPTS),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load defaults overridden by `MEDIA_DOWNLOADER_*` environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut builder = Self::builder();
        if let Ok(base) = std::env::var("MEDIA_DOWNLOADER_BASE_URL") {
            builder = builder.base_url(&base);
        }
        if let Some(ms) = env_u64("MEDIA_DOWNLOADER_POLL_INTERVAL_MS") {
            builder = builder.poll_interval(Duration::from_millis(ms));
        }
        if let Some(attempts) = env_u64("MEDIA_DOWNLOADER_MAX_POLL_ATTEMPTS") {
            builder = builder.max_poll_attempts(u32::try_from(attempts).ok().filter(|n| *n > 0));
        }
        if let Ok(dir) = std::env::var("MEDIA_DOWNLOADER_OUTPUT_DIR") {
            builder = builder.output_dir(dir);
        }
        builder.build()
    }

    /// Parsed base URL with a trailing slash so relative joins keep any path prefix
    pub fn base(&self) -> Result<Url> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/", trimmed))?)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the backend base address
    pub fn base_url(mut self, url: &str) -> Self {
        self.config.base_url = url.to_string();
        self
    }

    /// Set poll interval
    pub fn poll_interval(mut self, duration: Duration) -> Self {
        self.config.poll_interval = duration;
        self
    }

    /// Set poll interval in milliseconds
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval = Duration::from_millis(ms);
        self
    }

    /// Bound the number of status checks; `None` disables the bound
    pub fn max_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.config.request_timeout = duration;
        self
    }

    /// Set the directory results are written to
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
