// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub build: BuildConfig,
    pub ui: UiConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub max_body_size: u64,
}

/// Plugin build configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BuildConfig {
    /// Toolchain binary invoked per build
    pub toolchain: String,
    /// Directory for temporary units and artifacts; system temp dir
    /// when unset
    #[serde(default)]
    pub temp_dir: Option<String>,
    /// Wall-clock bound on one toolchain invocation
    pub timeout_secs: u64,
}

/// Bundled UI configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub root: String,
    pub index_files: Vec<String>,
}
