// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    BuildConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, UiConfig,
};

impl Config {
    /// Load configuration from the default "config.toml" (optional)
    /// plus `PLUGD`-prefixed environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("PLUGD").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("build.toolchain", "rustc")?
            .set_default("build.timeout_secs", 30)?
            .set_default("ui.root", "ui")?
            .set_default("ui.index_files", vec!["index.html", "index.htm"])?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = Config::load_from("plugd-test-missing-config").unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.build.toolchain, "rustc");
        assert_eq!(cfg.build.timeout_secs, 30);
        assert!(cfg.build.temp_dir.is_none());
        assert_eq!(cfg.ui.root, "ui");
        assert!(cfg.ui.index_files.contains(&"index.html".to_string()));
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let cfg = Config::load_from("plugd-test-missing-config").unwrap();
        let addr = cfg.get_socket_addr().unwrap();
        assert_eq!(addr.port(), 8000);
    }
}
