//! Response bodies as they arrive from the backend (and from the proxy,
//! which relays them verbatim). Each envelope knows its own success shape;
//! anything else is treated as "no data".

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{Badge, HistoryData, Listing};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub listings: Vec<Listing>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ListingsEnvelope {
    pub fn into_listings(self) -> Option<Vec<Listing>> {
        self.success.then_some(self.listings)
    }
}

/// The trending endpoint omits `success`, so the presence of `badges` is the
/// success marker for both badge endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BadgesEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub badges: Option<Vec<Badge>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BadgesEnvelope {
    pub fn into_badges(self) -> Option<Vec<Badge>> {
        self.badges
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEnvelope {
    Data(HistoryData),
    Failure {
        #[serde(default)]
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

impl HistoryEnvelope {
    pub fn into_history(self) -> Option<HistoryData> {
        match self {
            HistoryEnvelope::Data(data) => Some(data),
            HistoryEnvelope::Failure { .. } => None,
        }
    }
}

/// Which list field an error envelope carries so consumers still find an
/// (empty) collection where they expect one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKey {
    Listings,
    Badges,
    OwnershipHistory,
}

impl ListKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ListKey::Listings => "listings",
            ListKey::Badges => "badges",
            ListKey::OwnershipHistory => "ownership_history",
        }
    }
}

pub fn error_envelope(key: ListKey, message: &str) -> Value {
    let mut body = json!({
        "success": false,
        "error": message,
    });
    body[key.as_str()] = json!([]);
    body
}
