use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::request::{KeyStyle, SubmitEncoding};

/// Configuration for the video analysis job client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Remote service location and wire conventions
    pub service: ServiceConfig,

    /// HTTP transport settings
    pub transport: TransportConfig,

    /// Local checks applied before uploading
    pub upload: UploadConfig,

    /// Automatic status polling
    pub polling: PollingConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the video processing service
    pub base_url: String,

    /// Multipart upload endpoint
    pub upload_path: String,

    /// Job submission endpoint
    pub submit_path: String,

    /// Status endpoint; `{task_id}` is substituted
    pub status_path: String,

    /// Artifact endpoint; `{task_id}` is substituted
    pub download_path: String,

    /// Parameter key naming on the wire
    pub key_style: KeyStyle,

    /// Whether submit parameters go in the query string or a JSON body
    pub submit_encoding: SubmitEncoding,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeout for submit, status and download requests (seconds)
    pub request_timeout_seconds: u64,

    /// Timeout for the upload request (seconds)
    pub upload_timeout_seconds: u64,

    /// TCP connect timeout (seconds)
    pub connect_timeout_seconds: u64,

    /// User-Agent header
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Extensions treated as video; others only produce a warning
    pub video_extensions: Vec<String>,

    /// Maximum file size in bytes (0 = no limit)
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between status checks (milliseconds)
    pub interval_ms: u64,

    /// Give up after this many checks (0 = until terminal)
    pub max_attempts: u32,

    /// Give up after this many failed checks in a row
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Where downloaded artifacts are written
    pub download_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            upload_path: "/upload".to_string(),
            submit_path: crate::request::DEFAULT_SUBMIT_PATH.to_string(),
            status_path: "/task_status/{task_id}".to_string(),
            download_path: "/download_processed/{task_id}".to_string(),
            key_style: KeyStyle::CamelCase,
            submit_encoding: SubmitEncoding::Query,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            upload_timeout_seconds: 600, // large videos
            connect_timeout_seconds: 10,
            user_agent: concat!("vision-job-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            video_extensions: ["mp4", "avi", "mov", "mkv", "webm", "m4v", "flv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_file_size: 0,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 0,
            max_consecutive_failures: 5,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./downloads"),
            log_level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            transport: TransportConfig::default(),
            upload: UploadConfig::default(),
            polling: PollingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from the first config file found, then the environment
    pub fn load() -> Result<Self> {
        let config_paths = ["vision-job.toml", "config/vision-job.toml"];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::load_from(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config file {}: {}", path, e),
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific TOML file, with environment overrides applied on top
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.with_env_overrides()
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(base_url) = std::env::var("VISION_JOB_BASE_URL") {
            self.service.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("VISION_JOB_TIMEOUT") {
            self.transport.request_timeout_seconds = timeout
                .parse()
                .map_err(|_| ClientError::Config(format!("VISION_JOB_TIMEOUT is not a number: {}", timeout)))?;
        }

        if let Ok(style) = std::env::var("VISION_JOB_KEY_STYLE") {
            self.service.key_style = match style.to_ascii_lowercase().as_str() {
                "camel_case" | "camel" => KeyStyle::CamelCase,
                "snake_case" | "snake" => KeyStyle::SnakeCase,
                other => {
                    return Err(ClientError::Config(format!("unknown key style: {}", other)));
                }
            };
        }

        if let Ok(dir) = std::env::var("VISION_JOB_DOWNLOAD_DIR") {
            self.output.download_dir = PathBuf::from(dir);
        }

        if let Ok(log_level) = std::env::var("VISION_JOB_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        Ok(self)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.service.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base_url {}: {}", self.service.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!("unsupported scheme: {}", base.scheme())));
        }

        for (name, path) in [
            ("upload_path", &self.service.upload_path),
            ("submit_path", &self.service.submit_path),
            ("status_path", &self.service.status_path),
            ("download_path", &self.service.download_path),
        ] {
            if !path.starts_with('/') {
                return Err(ClientError::Config(format!("{} must start with '/': {}", name, path)));
            }
        }

        for (name, path) in [
            ("status_path", &self.service.status_path),
            ("download_path", &self.service.download_path),
        ] {
            if !path.contains("{task_id}") {
                return Err(ClientError::Config(format!("{} must contain {{task_id}}: {}", name, path)));
            }
        }

        if self.transport.request_timeout_seconds == 0
            || self.transport.upload_timeout_seconds == 0
            || self.transport.connect_timeout_seconds == 0
        {
            return Err(ClientError::Config("timeouts must be greater than 0".to_string()));
        }

        if self.polling.interval_ms == 0 {
            return Err(ClientError::Config("polling interval must be greater than 0".to_string()));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Vision Job Client Configuration:\n\
            - Service: {}\n\
            - Key Style: {:?}\n\
            - Submit Encoding: {:?}\n\
            - Request Timeout: {}s (upload {}s)\n\
            - Poll Interval: {}ms\n\
            - Download Directory: {}",
            self.service.base_url,
            self.service.key_style,
            self.service.submit_encoding,
            self.transport.request_timeout_seconds,
            self.transport.upload_timeout_seconds,
            self.polling.interval_ms,
            self.output.download_dir.display()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.service.base_url = base_url.into();
        self
    }

    pub fn with_key_style(mut self, key_style: KeyStyle) -> Self {
        self.config.service.key_style = key_style;
        self
    }

    pub fn with_submit_encoding(mut self, encoding: SubmitEncoding) -> Self {
        self.config.service.submit_encoding = encoding;
        self
    }

    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.config.transport.request_timeout_seconds = seconds;
        self
    }

    pub fn with_upload_timeout(mut self, seconds: u64) -> Self {
        self.config.transport.upload_timeout_seconds = seconds;
        self
    }

    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.polling.interval_ms = interval_ms;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.polling.max_attempts = attempts;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.config.upload.max_file_size = bytes;
        self
    }

    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.download_dir = dir;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
