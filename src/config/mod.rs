// Configuration module entry point
// Loads the service configuration and builds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, DownloadConfig, FieldPolicy, HealthConfig, HttpConfig, LoggingConfig,
    PerformanceConfig, RoutesConfig, ServerConfig, StatusMode, StorageConfig, UploadConfig,
    DEFAULT_MAX_UPLOAD_SIZE,
};

/// Environment variable prefix, e.g. `FILESERVER_STORAGE__ROOT`
const ENV_PREFIX: &str = "FILESERVER";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", types::DEFAULT_HOST)?
            .set_default("server.port", i64::from(types::DEFAULT_PORT))?
            .set_default("storage.root", types::DEFAULT_STORAGE_ROOT)?
            .set_default("upload.max_size", DEFAULT_MAX_UPLOAD_SIZE)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
