use crate::config::UpstreamConfig;
use anyhow::{Context, Result};
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Registry};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE, PRAGMA, USER_AGENT},
    Client, ClientBuilder,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

const AGENT: &str = concat!("market-gateway/", env!("CARGO_PKG_VERSION"));

/// Keep-alive client bound to the backend base URL. Every request bypasses
/// caches on the way out.
#[derive(Clone)]
pub struct UpstreamPool {
    client: Client,
    base: Url,
    metrics: Arc<HttpMetrics>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub json: Option<Value>,
    pub text: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl UpstreamPool {
    pub fn new(cfg: &UpstreamConfig, registry: &Registry) -> Result<Self> {
        let client = ClientBuilder::new()
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(cfg.max_connections)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .connect_timeout(Duration::from_millis(cfg.timeout_ms))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("build reqwest client")?;
        let base = Url::parse(&cfg.base_url).context("parse upstream base url")?;
        Ok(Self {
            client,
            base,
            metrics: Arc::new(HttpMetrics::new(registry)),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn build_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base.join(path).context("join url")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    fn default_headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        h.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        h.insert(USER_AGENT, HeaderValue::from_static(AGENT));
        h
    }

    /// `label` names the route in metrics so per-username paths do not
    /// explode label cardinality.
    pub async fn get(&self, label: &str, path: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let url = self.build_url(path, query)?;
        let start = Instant::now();
        self.metrics.inflight.with_label_values(&["GET"]).inc();
        self.metrics.req_total.with_label_values(&["GET", label]).inc();
        let sent = self
            .client
            .get(url)
            .headers(Self::default_headers())
            .send()
            .await;
        let result = match sent {
            Ok(resp) => {
                let status = resp.status().as_u16();
                resp.bytes()
                    .await
                    .map(|body| (status, body))
                    .context("read body bytes")
            }
            Err(err) => Err(anyhow::Error::new(err).context("http send")),
        };
        let dur = start.elapsed().as_secs_f64();
        self.metrics.inflight.with_label_values(&["GET"]).dec();
        self.metrics
            .latency
            .with_label_values(&["GET", label])
            .observe(dur);
        let (status, body) = match result {
            Ok(ok) => ok,
            Err(err) => {
                self.metrics.fail_total.with_label_values(&["GET", label]).inc();
                return Err(err);
            }
        };
        if status >= 400 {
            self.metrics.fail_total.with_label_values(&["GET", label]).inc();
        }
        let dur_ms = (dur * 1000.0) as u64;
        tracing::info!(target: "http", method = "GET", path = %path, status = %status, latency_ms = %dur_ms, bytes = %body.len(), "HTTP request completed");
        Ok(Self::parse_body(status, &body))
    }

    fn parse_body(status: u16, bytes: &[u8]) -> HttpResponse {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(v) => HttpResponse {
                status,
                json: Some(v),
                text: None,
            },
            Err(_) => HttpResponse {
                status,
                json: None,
                text: Some(String::from_utf8_lossy(bytes).to_string()),
            },
        }
    }
}

#[derive(Clone)]
struct HttpMetrics {
    req_total: IntCounterVec,
    fail_total: IntCounterVec,
    inflight: IntGaugeVec,
    latency: HistogramVec,
}

impl HttpMetrics {
    fn new(registry: &Registry) -> Self {
        let req_total = IntCounterVec::new(
            prometheus::Opts::new("upstream_requests_total", "Upstream requests total"),
            &["method", "path"],
        )
        .expect("static metric definition");
        let fail_total = IntCounterVec::new(
            prometheus::Opts::new("upstream_failures_total", "Upstream failures total"),
            &["method", "path"],
        )
        .expect("static metric definition");
        let inflight = IntGaugeVec::new(
            prometheus::Opts::new("upstream_inflight", "Upstream inflight requests"),
            &["method"],
        )
        .expect("static metric definition");
        let latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "upstream_latency_seconds",
                "Upstream request latency seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("static metric definition");
        registry.register(Box::new(req_total.clone())).ok();
        registry.register(Box::new(fail_total.clone())).ok();
        registry.register(Box::new(inflight.clone())).ok();
        registry.register(Box::new(latency.clone())).ok();
        Self {
            req_total,
            fail_total,
            inflight,
            latency,
        }
    }
}
