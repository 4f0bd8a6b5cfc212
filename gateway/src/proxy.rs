use std::sync::Arc;

use market_core::envelope::{error_envelope, ListKey};
use serde_json::Value;
use tracing::{debug, error};

use crate::{error::ProxyError, http_pool::UpstreamPool, metrics::ProxyMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Marketplace,
    Badges,
    TrendingBadges,
    History,
}

impl Endpoint {
    /// Inbound route template, also the metrics label.
    pub fn route(self) -> &'static str {
        match self {
            Endpoint::Marketplace => "/api/marketplace",
            Endpoint::Badges => "/api/badges",
            Endpoint::TrendingBadges => "/api/badges/trending",
            Endpoint::History => "/api/history/{username}",
        }
    }

    pub fn list_key(self) -> ListKey {
        match self {
            Endpoint::Marketplace => ListKey::Listings,
            Endpoint::Badges | Endpoint::TrendingBadges => ListKey::Badges,
            Endpoint::History => ListKey::OwnershipHistory,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Endpoint::Marketplace => "marketplace",
            Endpoint::Badges => "badges",
            Endpoint::TrendingBadges => "trending badges",
            Endpoint::History => "history",
        }
    }

    pub fn upstream_path(self, username: Option<&str>) -> String {
        match self {
            Endpoint::Marketplace => "/api/username/marketplace".to_string(),
            Endpoint::Badges => "/api/badges".to_string(),
            Endpoint::TrendingBadges => "/api/badges/trending".to_string(),
            Endpoint::History => format!(
                "/api/username/history/{}",
                urlencoding::encode(username.unwrap_or_default())
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub body: Value,
}

/// Stateless passthrough: one inbound call, one upstream GET, no retries.
#[derive(Clone)]
pub struct Proxy {
    pool: UpstreamPool,
    metrics: Arc<ProxyMetrics>,
}

impl Proxy {
    pub fn new(pool: UpstreamPool, metrics: Arc<ProxyMetrics>) -> Self {
        Self { pool, metrics }
    }

    pub async fn marketplace(&self, status: &str) -> ProxyReply {
        self.forward(Endpoint::Marketplace, None, &[("status", status)])
            .await
    }

    pub async fn badges(&self) -> ProxyReply {
        self.forward(Endpoint::Badges, None, &[]).await
    }

    pub async fn trending(&self) -> ProxyReply {
        self.forward(Endpoint::TrendingBadges, None, &[]).await
    }

    pub async fn history(&self, username: &str) -> ProxyReply {
        self.forward(Endpoint::History, Some(username), &[]).await
    }

    async fn forward(
        &self,
        endpoint: Endpoint,
        username: Option<&str>,
        query: &[(&str, &str)],
    ) -> ProxyReply {
        self.metrics
            .proxied
            .with_label_values(&[endpoint.route()])
            .inc();
        match self.fetch(endpoint, username, query).await {
            Ok(body) => ProxyReply { status: 200, body },
            Err(err) => {
                let status = err.status();
                match &err {
                    ProxyError::UpstreamStatus { body, .. } => {
                        error!(target: "proxy", route = endpoint.route(), status, body = %body, "fetch to upstream failed");
                    }
                    other => {
                        error!(target: "proxy", route = endpoint.route(), status, err = ?other, "error fetching {}", endpoint.noun());
                    }
                }
                self.metrics
                    .failed
                    .with_label_values(&[endpoint.route(), &status.to_string()])
                    .inc();
                let message = match err {
                    ProxyError::Transport(_) => format!("Failed to fetch {}", endpoint.noun()),
                    other => other.to_string(),
                };
                ProxyReply {
                    status,
                    body: error_envelope(endpoint.list_key(), &message),
                }
            }
        }
    }

    async fn fetch(
        &self,
        endpoint: Endpoint,
        username: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Value, ProxyError> {
        let path = endpoint.upstream_path(username);
        let resp = self.pool.get(endpoint.route(), &path, query).await?;
        if !resp.is_success() {
            return Err(ProxyError::UpstreamStatus {
                status: resp.status,
                body: resp.text.unwrap_or_else(|| {
                    resp.json.map(|v| v.to_string()).unwrap_or_default()
                }),
            });
        }
        debug!(target: "proxy", route = endpoint.route(), status = resp.status, "relaying upstream body");
        resp.json.ok_or(ProxyError::Decode)
    }
}
