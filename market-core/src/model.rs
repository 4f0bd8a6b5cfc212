use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::format::parse_timestamp;

pub type ItemId = i64;

/// Treats an explicit `null` like a missing key.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Seller, creator, buyer or owner as embedded in upstream payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default, deserialize_with = "null_default")]
    pub id: ItemId,
    #[serde(default, deserialize_with = "null_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub is_verified: bool,
}

impl UserRef {
    pub fn avatar(&self) -> Option<&str> {
        self.photo
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.avatar_url.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn initial(&self, fallback: char) -> char {
        self.name.chars().next().unwrap_or(fallback)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ItemId,
    pub username: String,
    pub price: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub seller_id: ItemId,
    #[serde(default, deserialize_with = "null_default")]
    pub seller: UserRef,
    #[serde(default)]
    pub buyer_id: Option<ItemId>,
    #[serde(default)]
    pub buyer: Option<UserRef>,
    #[serde(default, deserialize_with = "null_default")]
    pub status: ListingStatus,
    #[serde(default, deserialize_with = "null_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_default")]
    pub updated_at: String,
    #[serde(default)]
    pub sold_at: Option<String>,
    #[serde(default)]
    pub purchase_url: Option<String>,
}

impl Listing {
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.created_at)
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    pub fn name_len(&self) -> usize {
        self.username.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgePurchase {
    #[serde(default, deserialize_with = "null_default")]
    pub buyer_id: ItemId,
    #[serde(default, deserialize_with = "null_default")]
    pub buyer: UserRef,
    #[serde(default, deserialize_with = "null_default")]
    pub purchase_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supply {
    Unlimited,
    Limited { sold: u32, max: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: ItemId,
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub image_path: String,
    pub price: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub creator_id: ItemId,
    #[serde(default, deserialize_with = "null_default")]
    pub creator: UserRef,
    #[serde(default, deserialize_with = "null_default")]
    pub copies_sold: u32,
    /// Zero means the badge has no supply cap.
    #[serde(default, deserialize_with = "null_default")]
    pub max_copies: u32,
    #[serde(default, deserialize_with = "null_default")]
    pub is_sold_out: bool,
    #[serde(default)]
    pub upgrade: Option<String>,
    #[serde(default)]
    pub color_upgrade: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub purchases: Vec<BadgePurchase>,
    #[serde(default)]
    pub purchase_url: Option<String>,
}

impl Badge {
    pub fn supply(&self) -> Supply {
        if self.max_copies == 0 {
            Supply::Unlimited
        } else {
            Supply::Limited {
                sold: self.copies_sold,
                max: self.max_copies,
            }
        }
    }

    /// Share of the cap already sold, rounded; `None` for uncapped badges.
    pub fn progress_percent(&self) -> Option<u8> {
        match self.supply() {
            Supply::Unlimited => None,
            Supply::Limited { sold, max } => {
                let pct = (f64::from(sold) / f64::from(max) * 100.0).round();
                Some(pct.clamp(0.0, 100.0) as u8)
            }
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.supply() {
            Supply::Unlimited => None,
            Supply::Limited { sold, max } => Some(max.saturating_sub(sold)),
        }
    }

    pub fn sold_out(&self) -> bool {
        match self.supply() {
            Supply::Unlimited => false,
            Supply::Limited { sold, max } => self.is_sold_out || sold >= max,
        }
    }

    pub fn image_url(&self, base: &str) -> Option<String> {
        if self.image_path.is_empty() {
            return None;
        }
        Some(format!(
            "{}/static/uploads/badges/{}",
            base.trim_end_matches('/'),
            self.image_path
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    #[serde(default, deserialize_with = "null_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_default")]
    pub price: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub buyer_id: ItemId,
    #[serde(default, deserialize_with = "null_default")]
    pub buyer_username: String,
    #[serde(default)]
    pub seller_id: Option<ItemId>,
    #[serde(default)]
    pub seller_username: Option<String>,
}

impl OwnershipRecord {
    /// The first record of a username has no seller.
    pub fn is_mint(&self) -> bool {
        self.seller_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default, deserialize_with = "null_default")]
    pub id: ItemId,
    #[serde(default, deserialize_with = "null_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryData {
    pub username: String,
    #[serde(default, deserialize_with = "null_default")]
    pub current_owner: Owner,
    #[serde(default, deserialize_with = "null_default")]
    pub ownership_history: Vec<OwnershipRecord>,
    /// Keyed by the user id rendered as a string.
    #[serde(default, deserialize_with = "null_default")]
    pub users: HashMap<String, UserRef>,
}

impl HistoryData {
    pub fn buyer_of(&self, record: &OwnershipRecord) -> Option<&UserRef> {
        self.users.get(&record.buyer_id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartKind {
    Username,
    Badge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsernameItem {
    pub id: ItemId,
    pub name: String,
    pub price: i64,
    pub purchase_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeItem {
    pub id: ItemId,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
    pub purchase_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CartItem {
    Username(UsernameItem),
    Badge(BadgeItem),
}

impl CartItem {
    pub fn kind(&self) -> CartKind {
        match self {
            CartItem::Username(_) => CartKind::Username,
            CartItem::Badge(_) => CartKind::Badge,
        }
    }

    pub fn id(&self) -> ItemId {
        match self {
            CartItem::Username(item) => item.id,
            CartItem::Badge(item) => item.id,
        }
    }

    pub fn key(&self) -> (CartKind, ItemId) {
        (self.kind(), self.id())
    }

    pub fn price(&self) -> i64 {
        match self {
            CartItem::Username(item) => item.price,
            CartItem::Badge(item) => item.price,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            CartItem::Username(item) => format!("@{}", item.name),
            CartItem::Badge(item) => item.name.clone(),
        }
    }

    pub fn purchase_url(&self) -> Option<&str> {
        match self {
            CartItem::Username(item) => item.purchase_url.as_deref(),
            CartItem::Badge(item) => item.purchase_url.as_deref(),
        }
    }
}

impl From<&Listing> for CartItem {
    fn from(listing: &Listing) -> Self {
        CartItem::Username(UsernameItem {
            id: listing.id,
            name: listing.username.clone(),
            price: listing.price,
            purchase_url: listing.purchase_url.clone(),
        })
    }
}

impl From<&Badge> for CartItem {
    fn from(badge: &Badge) -> Self {
        CartItem::Badge(BadgeItem {
            id: badge.id,
            name: badge.name.clone(),
            price: badge.price,
            image: (!badge.image_path.is_empty()).then(|| badge.image_path.clone()),
            purchase_url: badge.purchase_url.clone(),
        })
    }
}
