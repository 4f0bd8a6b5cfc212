use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProxyMetrics {
    pub proxied: IntCounterVec,
    pub failed: IntCounterVec,
}

impl ProxyMetrics {
    pub fn new(registry: &Registry) -> Arc<Self> {
        let proxied = IntCounterVec::new(
            Opts::new("proxy_requests_total", "Inbound requests proxied"),
            &["route"],
        )
        .expect("static metric definition");
        let failed = IntCounterVec::new(
            Opts::new("proxy_failures_total", "Inbound requests answered with an error envelope"),
            &["route", "status"],
        )
        .expect("static metric definition");
        registry.register(Box::new(proxied.clone())).ok();
        registry.register(Box::new(failed.clone())).ok();
        Arc::new(Self { proxied, failed })
    }
}

/// Prometheus text exposition of everything in `registry`.
pub fn render(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .context("encode metrics")?;
    String::from_utf8(buffer).context("metrics not utf-8")
}
