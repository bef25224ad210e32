//! Bridge configuration.
//!
//! Values come from, in increasing precedence:
//! 1. Built-in defaults
//! 2. A YAML file named by `CAPBRIDGE_CONFIG`
//! 3. `CAPBRIDGE_*` environment overrides
//!
//! ```yaml
//! tcp:
//!   host: 127.0.0.1
//!   port: 6400
//! http:
//!   enabled: true
//!   port: 8090
//! main_thread_timeout_secs: 10
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transport::frame::DEFAULT_MAX_FRAME_BYTES;
use crate::transport::tcp::{DEFAULT_HANDSHAKE_REQUEST, DEFAULT_HANDSHAKE_RESPONSE};

pub const CONFIG_PATH_VAR: &str = "CAPBRIDGE_CONFIG";
pub const TCP_PORT_VAR: &str = "CAPBRIDGE_TCP_PORT";
pub const HTTP_PORT_VAR: &str = "CAPBRIDGE_HTTP_PORT";
pub const HTTP_ENABLED_VAR: &str = "CAPBRIDGE_HTTP_ENABLED";
pub const MAIN_THREAD_TIMEOUT_VAR: &str = "CAPBRIDGE_MAIN_THREAD_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// Top-level configuration for the bridge binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub tcp: TcpConfig,
    pub http: HttpConfig,
    /// How long a caller waits for main-thread work.
    pub main_thread_timeout_secs: f64,
    pub max_frame_bytes: usize,
    pub handshake_request: String,
    pub handshake_response: String,
    pub handshake_timeout_secs: f64,
    /// Period of the simulated host main loop.
    pub tick_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tcp: TcpConfig::default(),
            http: HttpConfig::default(),
            main_thread_timeout_secs: 10.0,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            handshake_request: DEFAULT_HANDSHAKE_REQUEST.to_string(),
            handshake_response: DEFAULT_HANDSHAKE_RESPONSE.to_string(),
            handshake_timeout_secs: 5.0,
            tick_interval_ms: 16,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tcp_port(mut self, port: u16) -> Self {
        self.tcp.port = port;
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http.port = port;
        self
    }

    pub fn with_http_enabled(mut self, enabled: bool) -> Self {
        self.http.enabled = enabled;
        self
    }

    pub fn with_main_thread_timeout(mut self, timeout: Duration) -> Self {
        self.main_thread_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid bridge configuration")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults or the file named by `CAPBRIDGE_CONFIG`, then environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply `CAPBRIDGE_*` overrides read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(TCP_PORT_VAR) {
            self.tcp.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} must be a port number, got {:?}", TCP_PORT_VAR, port))?;
        }
        if let Some(port) = lookup(HTTP_PORT_VAR) {
            self.http.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} must be a port number, got {:?}", HTTP_PORT_VAR, port))?;
        }
        if let Some(enabled) = lookup(HTTP_ENABLED_VAR) {
            self.http.enabled = match enabled.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => anyhow::bail!("{} must be a boolean, got {:?}", HTTP_ENABLED_VAR, other),
            };
        }
        if let Some(secs) = lookup(MAIN_THREAD_TIMEOUT_VAR) {
            let secs: f64 = secs.trim().parse().with_context(|| {
                format!("{} must be a number of seconds, got {:?}", MAIN_THREAD_TIMEOUT_VAR, secs)
            })?;
            self.main_thread_timeout_secs = secs;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        check_timeout("main_thread_timeout_secs", self.main_thread_timeout_secs)?;
        check_timeout("handshake_timeout_secs", self.handshake_timeout_secs)?;
        if self.max_frame_bytes == 0 || self.max_frame_bytes > u32::MAX as usize {
            anyhow::bail!("max_frame_bytes must be between 1 and {}", u32::MAX);
        }
        if self.handshake_request.is_empty() {
            anyhow::bail!("handshake_request must not be empty");
        }
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.tcp.host, self.tcp.port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Saturates to `Duration::MAX` for values `validate` would reject.
    pub fn main_thread_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.main_thread_timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.handshake_timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// A timeout must be positive and fit in a `Duration`.
fn check_timeout(field: &str, secs: f64) -> Result<()> {
    if !(secs.is_finite() && secs > 0.0) {
        anyhow::bail!("{} must be positive", field);
    }
    if Duration::try_from_secs_f64(secs).is_err() {
        anyhow::bail!("{} is too large: {}", field, secs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.tcp_addr(), "127.0.0.1:6400");
        assert_eq!(config.http.port, 8090);
        assert!(config.http.enabled);
        assert_eq!(config.main_thread_timeout(), Duration::from_secs(10));
        assert_eq!(config.handshake_request, "YAUM_HANDSHAKE_REQUEST");
        assert_eq!(config.max_frame_bytes, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = BridgeConfig::from_yaml("tcp:\n  port: 7000\nhttp:\n  enabled: false\n").unwrap();
        assert_eq!(config.tcp.port, 7000);
        assert_eq!(config.tcp.host, "127.0.0.1");
        assert!(!config.http.enabled);
        assert_eq!(config.tick_interval_ms, 16);
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "main_thread_timeout_secs: 2.5").unwrap();
        writeln!(file, "handshake_timeout_secs: 1").unwrap();
        let config = BridgeConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.main_thread_timeout(), Duration::from_millis(2500));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(1));

        assert!(BridgeConfig::from_yaml_file("/no/such/capbridge.yaml").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = BridgeConfig::default()
            .apply_env(env(&[
                (TCP_PORT_VAR, "6500"),
                (HTTP_PORT_VAR, " 9000 "),
                (HTTP_ENABLED_VAR, "off"),
                (MAIN_THREAD_TIMEOUT_VAR, "3"),
            ]))
            .unwrap();
        assert_eq!(config.tcp.port, 6500);
        assert_eq!(config.http.port, 9000);
        assert!(!config.http.enabled);
        assert_eq!(config.main_thread_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_bad_env_values_are_errors() {
        assert!(BridgeConfig::default().apply_env(env(&[(TCP_PORT_VAR, "70000")])).is_err());
        assert!(BridgeConfig::default().apply_env(env(&[(HTTP_ENABLED_VAR, "maybe")])).is_err());
        assert!(BridgeConfig::default()
            .apply_env(env(&[(MAIN_THREAD_TIMEOUT_VAR, "0")]))
            .is_err());
    }

    #[test]
    fn test_oversized_timeouts_are_rejected() {
        let config = BridgeConfig::from_yaml("main_thread_timeout_secs: 1e30").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("main_thread_timeout_secs"));

        let config = BridgeConfig::from_yaml("handshake_timeout_secs: 1e30").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("handshake_timeout_secs"));

        assert!(BridgeConfig::default()
            .apply_env(env(&[(MAIN_THREAD_TIMEOUT_VAR, "1e300")]))
            .is_err());

        let mut config = BridgeConfig::default();
        config.main_thread_timeout_secs = 1e30;
        assert!(config.validate().is_err());
        assert_eq!(config.main_thread_timeout(), Duration::MAX);
    }

    #[test]
    fn test_builders() {
        let config = BridgeConfig::new()
            .with_tcp_port(1)
            .with_http_port(2)
            .with_http_enabled(false)
            .with_main_thread_timeout(Duration::from_secs(4));
        assert_eq!(config.tcp.port, 1);
        assert_eq!(config.http_addr(), "127.0.0.1:2");
        assert!(!config.http.enabled);
        assert_eq!(config.main_thread_timeout_secs, 4.0);
    }
}
