//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{ClientError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. `POLYMARKET_GAMMA_URL` / `POLYMARKET_WS_URL`
/// 2. Environment variables prefixed with `APP__` (e.g. `APP__SETTINGS__DEPTH`)
/// 3. Configuration file (TOML format)
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder = builder
        .set_override_option("polymarket.gamma_url", std::env::var("POLYMARKET_GAMMA_URL").ok())
        .and_then(|b| {
            b.set_override_option("polymarket.websocket_url", std::env::var("POLYMARKET_WS_URL").ok())
        })
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))
}
