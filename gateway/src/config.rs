use serde::{Deserialize, Serialize};

pub const DEFAULT_UPSTREAM: &str = "https://k-connect.ru";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_connections: usize,
    pub image_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM.to_string(),
            timeout_ms: 10_000,
            max_connections: 16,
            image_base_url: DEFAULT_UPSTREAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub metrics: MetricsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: GatewayConfig =
            serde_json::from_str(r#"{"upstream": {"timeout_ms": 2500}}"#).expect("json");
        assert_eq!(cfg.upstream.timeout_ms, 2_500);
        assert_eq!(cfg.upstream.base_url, DEFAULT_UPSTREAM);
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.metrics.enabled);
    }
}
