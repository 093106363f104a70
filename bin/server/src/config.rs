//! Centralized server configuration.
//!
//! Strongly-typed configuration for the server, loaded via the `config`
//! crate from environment variables.

use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// HTTP bind configuration.
    #[serde(default)]
    pub http: HttpConfig,

    /// Interval between output log buffer flushes, in seconds.
    #[serde(default = "default_flush_interval_seconds")]
    pub flush_interval_seconds: u64,
}

/// HTTP bind host and port.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_flush_interval_seconds() -> u64 {
    1
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl HttpConfig {
    /// The socket address to bind, as a string suitable for
    /// `TcpListener::bind`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_config_has_correct_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn flush_interval_default_is_one_second() {
        assert_eq!(default_flush_interval_seconds(), 1);
    }
}
