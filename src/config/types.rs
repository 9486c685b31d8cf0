// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

use crate::http::ContentTypePolicy;
use crate::storage::DEFAULT_DIR_MODE;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STORAGE_ROOT: &str = "./public/uploads";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 20 * 1024 * 1024;
pub const DEFAULT_MAX_FILES_PER_FIELD: usize = 100;
pub const DEFAULT_UPLOAD_PATH: &str = "/file/upload";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub download: DownloadConfig,
    pub routes: RoutesConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: None,
        }
    }
}

/// Where files live on disk
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
    /// Unix permission bits for created directories
    pub dir_mode: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_STORAGE_ROOT.to_string(),
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

/// Which file fields of one request get processed
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Only the first file field in body order
    #[default]
    FirstOnly,
    /// Every file field, stopping at the first one that fails
    All,
}

/// Upload limits and form conventions
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    /// Exclusive bound on the declared Content-Length, also the parser ceiling
    pub max_size: u64,
    pub max_files_per_field: usize,
    /// Name of the text field that selects the target subdirectory
    pub subdir_field: String,
    pub field_policy: FieldPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_files_per_field: DEFAULT_MAX_FILES_PER_FIELD,
            subdir_field: "subdir".to_string(),
            field_policy: FieldPolicy::default(),
        }
    }
}

/// Download configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DownloadConfig {
    pub content_type: ContentTypePolicy,
}

/// Routes configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    pub upload_path: String,
    /// Paths answered with an empty 200 instead of a file lookup
    pub favicon_paths: Vec<String>,
    pub health: HealthConfig,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            favicon_paths: vec!["/favicon.ico".to_string()],
            health: HealthConfig::default(),
        }
    }
}

/// Health check configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    pub readiness_path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            liveness_path: "/healthz".to_string(),
            readiness_path: "/readyz".to_string(),
        }
    }
}

/// How failures map to HTTP status codes
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// 200 with an error text for everything but a missing download (404)
    #[default]
    Compat,
    /// 4xx/5xx per error kind
    Strict,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub status_mode: StatusMode,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "rust-fileserver".to_string(),
            enable_cors: false,
            status_mode: StatusMode::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout: 75,
            read_timeout: 30,
            write_timeout: 30,
            max_connections: None,
        }
    }
}
