//! Configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Polymarket endpoints
    #[serde(default)]
    pub polymarket: PolymarketConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Polymarket endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolymarketConfig {
    /// Gamma API URL for event and market discovery
    #[serde(default = "default_polymarket_gamma_url")]
    pub gamma_url: String,
    /// WebSocket base URL; the market channel lives under `/ws/market`
    #[serde(default = "default_polymarket_ws_url")]
    pub websocket_url: String,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: default_polymarket_gamma_url(),
            websocket_url: default_polymarket_ws_url(),
        }
    }
}

fn default_polymarket_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com".to_string()
}

fn default_polymarket_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Retries for idempotent GET requests
    #[serde(default = "default_max_http_retries")]
    pub max_http_retries: u32,
    /// Base delay between HTTP retries, doubled on each attempt
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial_delay")]
    pub reconnect_initial_delay_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// Fraction of the reconnect delay randomized in either direction
    #[serde(default = "default_reconnect_jitter")]
    pub reconnect_jitter: f64,
    /// Text heartbeat interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Silence on the feed longer than this forces a reconnect
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    /// Websocket handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Websocket send timeout in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    /// Render tick in milliseconds
    #[serde(default = "default_render_interval")]
    pub render_interval_ms: u64,
    /// Levels shown per side before clamping to the terminal height
    #[serde(default = "default_depth")]
    pub depth: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout_seconds: default_request_timeout(),
            max_http_retries: default_max_http_retries(),
            retry_backoff_ms: default_retry_backoff(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            reconnect_jitter: default_reconnect_jitter(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            heartbeat_timeout_seconds: default_heartbeat_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            send_timeout_seconds: default_send_timeout(),
            render_interval_ms: default_render_interval(),
            depth: default_depth(),
        }
    }
}

impl AppSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_http_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    200
}

fn default_reconnect_initial_delay() -> u64 {
    1000
}

fn default_reconnect_max_delay() -> u64 {
    30_000
}

fn default_reconnect_jitter() -> f64 {
    0.2
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_heartbeat_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_send_timeout() -> u64 {
    5
}

fn default_render_interval() -> u64 {
    100
}

fn default_depth() -> usize {
    16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.polymarket.gamma_url, "https://gamma-api.polymarket.com");
        assert_eq!(config.settings.render_interval(), Duration::from_millis(100));
        assert_eq!(config.settings.reconnect_max_delay_ms, 30_000);
        assert_eq!(config.settings.depth, 16);
    }
}
