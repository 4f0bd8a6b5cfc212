use std::{env, io::ErrorKind, path::Path};

use anyhow::{anyhow, Context, Result};
use gateway::GatewayConfig;
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

pub const PORT_ENV: &str = "MARKET_PORT";
pub const UPSTREAM_ENV: &str = "MARKET_UPSTREAM_URL";

/// Reads the proxy config from disk, falling back to defaults when the file
/// is absent, then applies environment overrides.
pub async fn load_config(config_path: &Path) -> Result<GatewayConfig> {
    let cfg = match fs::read(config_path).await {
        Ok(raw) => parse_config(&raw)
            .with_context(|| format!("load config file: {}", config_path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(
                "config file {} not found, using defaults",
                config_path.display()
            );
            GatewayConfig::default()
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("read config file: {}", config_path.display())))
        }
    };
    apply_env(cfg, |key| env::var(key).ok())
}

fn parse_config(raw: &[u8]) -> Result<GatewayConfig> {
    let value: Value = serde_json::from_slice(raw).context("parse config json")?;
    if !value.is_object() {
        return Err(anyhow!("config root must be a JSON object"));
    }
    serde_json::from_value(value).context("decode config sections")
}

fn apply_env<F>(mut cfg: GatewayConfig, lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(PORT_ENV).filter(|v| !v.is_empty()) {
        cfg.server.port = port
            .parse()
            .with_context(|| format!("{PORT_ENV} must be a port number, got {port:?}"))?;
    }
    if let Some(url) = lookup(UPSTREAM_ENV).filter(|v| !v.is_empty()) {
        cfg.upstream.base_url = url;
    }
    if cfg.upstream.base_url.trim().is_empty() {
        warn!("empty upstream.base_url, restoring default");
        cfg.upstream.base_url = GatewayConfig::default().upstream.base_url;
    }
    Ok(cfg)
}
