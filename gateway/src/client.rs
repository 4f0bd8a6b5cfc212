use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use market_core::{
    envelope::{BadgesEnvelope, HistoryEnvelope, ListingsEnvelope},
    ports::CatalogSource,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL},
    Client,
};
use serde::de::DeserializeOwned;
use url::Url;

/// Talks to the proxy's `/api/*` surface.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    base: Url,
}

impl HttpCatalogSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build reqwest client for catalog")?;
        let base = Url::parse(base_url).context("parse catalog base url")?;
        Ok(Self { client, base })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self.base.join(path).context("join catalog url")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("send {path} request"))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("read {path} body"))?;
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "{} http {}: {}",
                path,
                status.as_u16(),
                String::from_utf8_lossy(&body)
            ));
        }
        serde_json::from_slice(&body).with_context(|| format!("parse {path} json"))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_listings(&self, status: &str) -> Result<ListingsEnvelope> {
        self.get_json("/api/marketplace", &[("status", status)]).await
    }

    async fn fetch_badges(&self) -> Result<BadgesEnvelope> {
        self.get_json("/api/badges", &[]).await
    }

    async fn fetch_trending(&self) -> Result<BadgesEnvelope> {
        self.get_json("/api/badges/trending", &[]).await
    }

    async fn fetch_history(&self, username: &str) -> Result<HistoryEnvelope> {
        let path = format!("/api/history/{}", urlencoding::encode(username));
        self.get_json(&path, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GatewayConfig, server, testutil::spawn_upstream};
    use market_core::load::{load_catalog, load_history};
    use prometheus::Registry;
    use std::sync::Arc;

    async fn spawn_gateway() -> String {
        let mut cfg = GatewayConfig::default();
        cfg.upstream.base_url = spawn_upstream().await;
        cfg.upstream.timeout_ms = 2_000;
        let proxy = server::build_proxy(&cfg, &Registry::new()).expect("proxy");
        let routes = crate::routes::api(Arc::new(proxy));
        let (addr, fut) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(fut);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn catalog_loads_through_the_proxy_with_isolated_failures() {
        let base = spawn_gateway().await;
        let source = HttpCatalogSource::new(&base, Duration::from_secs(5)).expect("source");

        let snapshot = load_catalog(&source).await;
        let listings = snapshot.listings.expect("listings");
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].seller.name, "Morpheus");
        // upstream answers 503 for the full badge list
        assert!(snapshot.badges.is_none());
        assert_eq!(snapshot.trending.map(|t| t.len()), Some(1));

        let history = load_history(&source, "neo").await.expect("history");
        let history = history.expect("history data");
        assert_eq!(history.username, "neo");
        assert!(history.ownership_history[0].is_mint());
    }

    #[tokio::test]
    async fn unreachable_proxy_is_an_error_not_a_panic() {
        let source =
            HttpCatalogSource::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("source");
        assert!(source.fetch_badges().await.is_err());
        let snapshot = load_catalog(&source).await;
        assert!(snapshot.listings.is_none());
        assert!(snapshot.badges.is_none());
        assert!(snapshot.trending.is_none());
    }
}
