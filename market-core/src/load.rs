use tracing::{debug, warn};

use crate::{
    envelope::{BadgesEnvelope, HistoryEnvelope, ListingsEnvelope},
    model::{Badge, HistoryData, Listing},
    ports::CatalogSource,
};

pub const ACTIVE_STATUS: &str = "active";

/// Outcome of one catalog load. `None` means the dataset failed or came back
/// in an unrecognised shape; the previous value should be kept.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub listings: Option<Vec<Listing>>,
    pub badges: Option<Vec<Badge>>,
    pub trending: Option<Vec<Badge>>,
}

pub async fn load_catalog<S: CatalogSource + ?Sized>(source: &S) -> CatalogSnapshot {
    let (listings, badges, trending) = futures::join!(
        source.fetch_listings(ACTIVE_STATUS),
        source.fetch_badges(),
        source.fetch_trending(),
    );
    CatalogSnapshot {
        listings: settle("listings", listings.map(ListingsEnvelope::into_listings)),
        badges: settle("badges", badges.map(BadgesEnvelope::into_badges)),
        trending: settle("trending", trending.map(BadgesEnvelope::into_badges)),
    }
}

pub async fn load_history<S: CatalogSource + ?Sized>(
    source: &S,
    username: &str,
) -> anyhow::Result<Option<HistoryData>> {
    let envelope = source.fetch_history(username).await?;
    Ok(HistoryEnvelope::into_history(envelope))
}

fn settle<T>(dataset: &str, res: anyhow::Result<Option<Vec<T>>>) -> Option<Vec<T>> {
    match res {
        Ok(Some(items)) => {
            debug!(target: "catalog", dataset, count = items.len(), "dataset loaded");
            Some(items)
        }
        Ok(None) => {
            warn!(target: "catalog", dataset, "unrecognised response shape, keeping previous data");
            None
        }
        Err(err) => {
            warn!(target: "catalog", dataset, ?err, "dataset fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    struct MockSource {
        fail_badges: bool,
    }

    #[async_trait]
    impl CatalogSource for MockSource {
        async fn fetch_listings(&self, status: &str) -> anyhow::Result<ListingsEnvelope> {
            assert_eq!(status, ACTIVE_STATUS);
            Ok(serde_json::from_value(json!({
                "success": true,
                "listings": [{"id": 1, "username": "neo", "price": 500}]
            }))?)
        }
        async fn fetch_badges(&self) -> anyhow::Result<BadgesEnvelope> {
            if self.fail_badges {
                return Err(anyhow!("connection refused"));
            }
            Ok(serde_json::from_value(json!({
                "success": true,
                "badges": [{"id": 3, "name": "Founder", "price": 100}]
            }))?)
        }
        async fn fetch_trending(&self) -> anyhow::Result<BadgesEnvelope> {
            Ok(serde_json::from_value(json!({"error": "nope"}))?)
        }
        async fn fetch_history(&self, username: &str) -> anyhow::Result<HistoryEnvelope> {
            Ok(serde_json::from_value(json!({
                "username": username,
                "ownership_history": []
            }))?)
        }
    }

    #[tokio::test]
    async fn one_failing_dataset_does_not_block_the_others() {
        let snapshot = load_catalog(&MockSource { fail_badges: true }).await;
        assert_eq!(snapshot.listings.map(|l| l.len()), Some(1));
        assert!(snapshot.badges.is_none());
        assert!(snapshot.trending.is_none());
    }

    #[tokio::test]
    async fn all_datasets_loaded() {
        let snapshot = load_catalog(&MockSource { fail_badges: false }).await;
        assert_eq!(snapshot.badges.map(|b| b.len()), Some(1));
        let history = load_history(&MockSource { fail_badges: false }, "neo")
            .await
            .expect("history");
        assert_eq!(history.map(|h| h.username), Some("neo".to_string()));
    }
}
