use async_trait::async_trait;

use crate::envelope::{BadgesEnvelope, HistoryEnvelope, ListingsEnvelope};

/// Read side of the backend, as seen by the storefront.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_listings(&self, status: &str) -> anyhow::Result<ListingsEnvelope>;
    async fn fetch_badges(&self) -> anyhow::Result<BadgesEnvelope>;
    async fn fetch_trending(&self) -> anyhow::Result<BadgesEnvelope>;
    async fn fetch_history(&self, username: &str) -> anyhow::Result<HistoryEnvelope>;
}

// purchase hand-off; nothing comes back
pub trait Navigator: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}
