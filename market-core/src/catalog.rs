use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::anyhow;
use tracing::debug;

use crate::{
    cart::Cart,
    load::CatalogSnapshot,
    model::{Badge, CartItem, CartKind, HistoryData, ItemId, Listing},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Usernames,
    Badges,
}

impl Tab {
    pub fn toggle(self) -> Self {
        match self {
            Tab::Usernames => Tab::Badges,
            Tab::Badges => Tab::Usernames,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
    Popular,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Newest,
        SortKey::PriceAsc,
        SortKey::PriceDesc,
        SortKey::Popular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::PriceAsc => "price-asc",
            SortKey::PriceDesc => "price-desc",
            SortKey::Newest => "newest",
            SortKey::Popular => "popular",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Newest => "Newest first",
            SortKey::PriceAsc => "Cheapest first",
            SortKey::PriceDesc => "Most expensive first",
            SortKey::Popular => "Popular",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow!("unknown sort key: {s}"))
    }
}

fn matches_any(fields: &[&str], needle: &str) -> bool {
    needle.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(needle))
}

/// Listings whose username or seller name contains `search`
/// (case-insensitive), ordered by `sort`. Sorting is stable.
pub fn filter_listings<'a>(listings: &'a [Listing], search: &str, sort: SortKey) -> Vec<&'a Listing> {
    let needle = search.to_lowercase();
    let mut out: Vec<&Listing> = listings
        .iter()
        .filter(|l| matches_any(&[l.username.as_str(), l.seller.name.as_str()], &needle))
        .collect();
    match sort {
        SortKey::PriceAsc => out.sort_by_key(|l| l.price),
        SortKey::PriceDesc => out.sort_by(|a, b| b.price.cmp(&a.price)),
        SortKey::Newest => out.sort_by(|a, b| match (a.created_at(), b.created_at()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKey::Popular => out.sort_by_key(|l| l.name_len()),
    }
    out
}

/// Badges whose name or creator name contains `search`. Badges carry no
/// creation time, so `Newest` keeps fetch order.
pub fn filter_badges<'a>(badges: &'a [Badge], search: &str, sort: SortKey) -> Vec<&'a Badge> {
    let needle = search.to_lowercase();
    let mut out: Vec<&Badge> = badges
        .iter()
        .filter(|b| matches_any(&[b.name.as_str(), b.creator.name.as_str()], &needle))
        .collect();
    match sort {
        SortKey::PriceAsc => out.sort_by_key(|b| b.price),
        SortKey::PriceDesc => out.sort_by(|a, b| b.price.cmp(&a.price)),
        SortKey::Newest => {}
        SortKey::Popular => out.sort_by(|a, b| b.copies_sold.cmp(&a.copies_sold)),
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketStats {
    pub username_count: usize,
    pub badge_count: usize,
    pub total_value: i64,
    pub trending_count: usize,
}

impl MarketStats {
    pub fn compute(listings: &[Listing], badges: &[Badge], trending: &[Badge]) -> Self {
        let total_value = listings
            .iter()
            .map(|l| l.price)
            .chain(badges.iter().map(|b| b.price))
            .fold(0i64, i64::saturating_add);
        Self {
            username_count: listings.len(),
            badge_count: badges.len(),
            total_value,
            trending_count: trending.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Listing(Listing),
    Badge(Badge),
}

impl Selection {
    pub fn purchase_url(&self) -> Option<&str> {
        match self {
            Selection::Listing(l) => l.purchase_url.as_deref(),
            Selection::Badge(b) => b.purchase_url.as_deref(),
        }
        .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum HistoryState {
    #[default]
    Idle,
    Loading,
    Loaded(HistoryData),
    Unavailable,
}

/// Ticket for an ownership-history fetch. Responses are only accepted while
/// `generation` is still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub generation: u64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct CatalogState {
    pub listings: Vec<Listing>,
    pub badges: Vec<Badge>,
    pub trending: Vec<Badge>,
    pub loading: bool,
    pub tab: Tab,
    pub search: String,
    pub sort: SortKey,
    pub cart: Cart,
    pub cart_open: bool,
    selection: Option<Selection>,
    history: HistoryState,
    history_generation: u64,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogState {
    pub fn new() -> Self {
        Self {
            listings: Vec::new(),
            badges: Vec::new(),
            trending: Vec::new(),
            loading: true,
            tab: Tab::default(),
            search: String::new(),
            sort: SortKey::default(),
            cart: Cart::new(),
            cart_open: false,
            selection: None,
            history: HistoryState::Idle,
            history_generation: 0,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: CatalogSnapshot) {
        if let Some(listings) = snapshot.listings {
            self.listings = listings;
        }
        if let Some(badges) = snapshot.badges {
            self.badges = badges;
        }
        if let Some(trending) = snapshot.trending {
            self.trending = trending;
        }
        self.loading = false;
    }

    pub fn visible_listings(&self) -> Vec<&Listing> {
        filter_listings(&self.listings, &self.search, self.sort)
    }

    pub fn visible_badges(&self) -> Vec<&Badge> {
        filter_badges(&self.badges, &self.search, self.sort)
    }

    pub fn visible_len(&self) -> usize {
        match self.tab {
            Tab::Usernames => self.visible_listings().len(),
            Tab::Badges => self.visible_badges().len(),
        }
    }

    pub fn stats(&self) -> MarketStats {
        MarketStats::compute(&self.listings, &self.badges, &self.trending)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    /// Opens the listing detail and hands back the history fetch to issue.
    pub fn select_listing(&mut self, id: ItemId) -> Option<HistoryRequest> {
        let listing = self.listings.iter().find(|l| l.id == id)?.clone();
        self.history_generation += 1;
        self.history = HistoryState::Loading;
        let request = HistoryRequest {
            generation: self.history_generation,
            username: listing.username.clone(),
        };
        self.selection = Some(Selection::Listing(listing));
        Some(request)
    }

    pub fn select_badge(&mut self, id: ItemId) -> bool {
        let Some(badge) = self.badges.iter().find(|b| b.id == id).cloned() else {
            return false;
        };
        self.history_generation += 1;
        self.history = HistoryState::Idle;
        self.selection = Some(Selection::Badge(badge));
        true
    }

    /// Same as [`select_badge`](Self::select_badge) but for the trending strip,
    /// whose entries may be absent from the main badge list.
    pub fn select_trending(&mut self, id: ItemId) -> bool {
        if self.select_badge(id) {
            return true;
        }
        let Some(badge) = self.trending.iter().find(|b| b.id == id).cloned() else {
            return false;
        };
        self.history_generation += 1;
        self.history = HistoryState::Idle;
        self.selection = Some(Selection::Badge(badge));
        true
    }

    pub fn close_detail(&mut self) {
        self.selection = None;
        self.history = HistoryState::Idle;
        self.history_generation += 1;
    }

    /// Returns `false` when the response belongs to a detail view that is no
    /// longer open.
    pub fn apply_history(
        &mut self,
        generation: u64,
        result: anyhow::Result<Option<HistoryData>>,
    ) -> bool {
        if generation != self.history_generation {
            debug!(
                target: "catalog",
                generation,
                current = self.history_generation,
                "dropping stale ownership history"
            );
            return false;
        }
        self.history = match result {
            Ok(Some(data)) => HistoryState::Loaded(data),
            Ok(None) => HistoryState::Unavailable,
            Err(err) => {
                tracing::warn!(target: "catalog", ?err, "ownership history fetch failed");
                HistoryState::Unavailable
            }
        };
        true
    }

    pub fn purchase_url(&self) -> Option<&str> {
        self.selection.as_ref().and_then(Selection::purchase_url)
    }

    pub fn add_to_cart(&mut self, item: CartItem) -> bool {
        self.cart.add(item)
    }

    pub fn add_listing_to_cart(&mut self, id: ItemId) -> bool {
        match self.listings.iter().find(|l| l.id == id) {
            Some(listing) => {
                let item = CartItem::from(listing);
                self.cart.add(item)
            }
            None => false,
        }
    }

    /// Sold-out badges cannot be added.
    pub fn add_badge_to_cart(&mut self, id: ItemId) -> bool {
        let found = self
            .badges
            .iter()
            .chain(self.trending.iter())
            .find(|b| b.id == id);
        match found {
            Some(badge) if !badge.sold_out() => {
                let item = CartItem::from(badge);
                self.cart.add(item)
            }
            _ => false,
        }
    }

    pub fn remove_from_cart(&mut self, kind: CartKind, id: ItemId) -> bool {
        self.cart.remove(kind, id)
    }

    pub fn in_cart(&self, kind: CartKind, id: ItemId) -> bool {
        self.cart.contains(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRef;
    use serde_json::json;

    fn listing(id: ItemId, username: &str, price: i64, created_at: &str) -> Listing {
        serde_json::from_value(json!({
            "id": id,
            "username": username,
            "price": price,
            "created_at": created_at,
        }))
        .expect("listing json")
    }

    fn badge(id: ItemId, name: &str, price: i64, copies_sold: u32) -> Badge {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "price": price,
            "copies_sold": copies_sold,
        }))
        .expect("badge json")
    }

    fn ids<T>(items: &[&T], id: impl Fn(&T) -> ItemId) -> Vec<ItemId> {
        items.iter().map(|i| id(*i)).collect()
    }

    fn scenario() -> Vec<Listing> {
        vec![
            listing(1, "neo", 500, "2024-01-01"),
            listing(2, "ab", 100, "2024-06-01"),
        ]
    }

    #[test]
    fn scenario_orders_and_search() {
        let base = scenario();
        let by_id = |l: &Listing| l.id;
        assert_eq!(ids(&filter_listings(&base, "", SortKey::Newest), by_id), vec![2, 1]);
        assert_eq!(ids(&filter_listings(&base, "", SortKey::PriceAsc), by_id), vec![2, 1]);
        assert_eq!(ids(&filter_listings(&base, "", SortKey::PriceDesc), by_id), vec![1, 2]);
        assert_eq!(ids(&filter_listings(&base, "", SortKey::Popular), by_id), vec![2, 1]);
        for sort in SortKey::ALL {
            assert_eq!(ids(&filter_listings(&base, "neo", sort), by_id), vec![1]);
        }
    }

    #[test]
    fn search_matches_seller_name_case_insensitively() {
        let mut base = scenario();
        base[1].seller = UserRef {
            name: "Морфеус".into(),
            ..UserRef::default()
        };
        let hits = filter_listings(&base, "МОРФ", SortKey::Newest);
        assert_eq!(ids(&hits, |l| l.id), vec![2]);
        assert!(filter_listings(&base, "zzz", SortKey::Newest).is_empty());
    }

    #[test]
    fn filtered_output_is_an_ordered_subset() {
        let base = vec![
            listing(1, "alpha", 900, "2023-03-01"),
            listing(2, "alphabet", 100, "2024-03-01"),
            listing(3, "beta", 300, "garbage"),
            listing(4, "gamma", 300, "2022-01-01T08:00:00"),
            listing(5, "delta", 50, "2024-12-31 23:59:59"),
        ];
        for search in ["", "a", "ALPHA", "ta", "nothing"] {
            for sort in SortKey::ALL {
                let out = filter_listings(&base, search, sort);
                let needle = search.to_lowercase();
                assert!(out.iter().all(|l| l.username.to_lowercase().contains(&needle)));
                let expected = base
                    .iter()
                    .filter(|l| l.username.to_lowercase().contains(&needle))
                    .count();
                assert_eq!(out.len(), expected);
                for pair in out.windows(2) {
                    match sort {
                        SortKey::PriceAsc => assert!(pair[0].price <= pair[1].price),
                        SortKey::PriceDesc => assert!(pair[0].price >= pair[1].price),
                        SortKey::Popular => assert!(pair[0].name_len() <= pair[1].name_len()),
                        SortKey::Newest => {
                            if let (Some(a), Some(b)) = (pair[0].created_at(), pair[1].created_at()) {
                                assert!(a >= b);
                            } else {
                                assert!(pair[1].created_at().is_none());
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn badge_orderings() {
        let base = vec![
            badge(1, "Gold", 300, 5),
            badge(2, "Silver", 100, 50),
            badge(3, "Golden Hour", 200, 1),
        ];
        let by_id = |b: &Badge| b.id;
        assert_eq!(ids(&filter_badges(&base, "", SortKey::Newest), by_id), vec![1, 2, 3]);
        assert_eq!(ids(&filter_badges(&base, "", SortKey::PriceAsc), by_id), vec![2, 3, 1]);
        assert_eq!(ids(&filter_badges(&base, "", SortKey::Popular), by_id), vec![2, 1, 3]);
        assert_eq!(ids(&filter_badges(&base, "gold", SortKey::PriceDesc), by_id), vec![1, 3]);
    }

    #[test]
    fn stats_sum_both_collections() {
        assert_eq!(MarketStats::compute(&[], &[], &[]), MarketStats::default());

        let listings = scenario();
        let badges = vec![badge(1, "Gold", 300, 0), badge(2, "Silver", 100, 0)];
        let trending = vec![badges[0].clone()];
        let stats = MarketStats::compute(&listings, &badges, &trending);
        assert_eq!(stats.username_count, 2);
        assert_eq!(stats.badge_count, 2);
        assert_eq!(stats.total_value, 600 + 400);
        assert_eq!(stats.trending_count, 1);
    }

    #[test]
    fn stats_total_saturates_on_huge_prices() {
        let listings = vec![
            listing(1, "whale", i64::MAX, "2024-01-01"),
            listing(2, "orca", i64::MAX, "2024-01-02"),
        ];
        let badges = vec![badge(3, "Gold", 10, 0)];
        let stats = MarketStats::compute(&listings, &badges, &[]);
        assert_eq!(stats.total_value, i64::MAX);
    }

    #[test]
    fn snapshot_keeps_previous_data_for_failed_datasets() {
        let mut state = CatalogState::new();
        assert!(state.loading);
        state.apply_snapshot(CatalogSnapshot {
            listings: Some(scenario()),
            badges: Some(vec![badge(1, "Gold", 300, 0)]),
            trending: None,
        });
        assert!(!state.loading);
        state.apply_snapshot(CatalogSnapshot {
            listings: None,
            badges: Some(Vec::new()),
            trending: None,
        });
        assert_eq!(state.listings.len(), 2);
        assert!(state.badges.is_empty());
        assert!(state.trending.is_empty());
    }

    #[test]
    fn stale_history_is_discarded() {
        let mut state = CatalogState::new();
        state.apply_snapshot(CatalogSnapshot {
            listings: Some(scenario()),
            ..CatalogSnapshot::default()
        });

        let first = state.select_listing(1).expect("listing 1");
        assert_eq!(first.username, "neo");
        assert_eq!(state.history(), &HistoryState::Loading);

        state.close_detail();
        let second = state.select_listing(2).expect("listing 2");
        assert_ne!(first.generation, second.generation);

        let neo = HistoryData {
            username: "neo".into(),
            current_owner: Default::default(),
            ownership_history: Vec::new(),
            users: Default::default(),
        };
        assert!(!state.apply_history(first.generation, Ok(Some(neo.clone()))));
        assert_eq!(state.history(), &HistoryState::Loading);

        let ab = HistoryData {
            username: "ab".into(),
            ..neo
        };
        assert!(state.apply_history(second.generation, Ok(Some(ab))));
        assert!(matches!(state.history(), HistoryState::Loaded(h) if h.username == "ab"));

        state.close_detail();
        assert!(state.selection().is_none());
        assert_eq!(state.history(), &HistoryState::Idle);
    }

    #[test]
    fn failed_history_marks_unavailable() {
        let mut state = CatalogState::new();
        state.listings = scenario();
        let req = state.select_listing(2).expect("listing");
        assert!(state.apply_history(req.generation, Err(anyhow!("timeout"))));
        assert_eq!(state.history(), &HistoryState::Unavailable);
        assert!(state.select_listing(99).is_none());
    }

    #[test]
    fn purchase_url_follows_selection() {
        let mut state = CatalogState::new();
        state.listings = scenario();
        state.listings[0].purchase_url = Some("https://k-connect.ru/buy/1".into());
        state.badges = vec![badge(5, "Gold", 300, 0)];

        assert!(state.purchase_url().is_none());
        state.select_listing(1);
        assert_eq!(state.purchase_url(), Some("https://k-connect.ru/buy/1"));
        assert!(state.select_badge(5));
        assert!(state.purchase_url().is_none());
    }

    #[test]
    fn cart_through_state_respects_sold_out() {
        let mut state = CatalogState::new();
        state.listings = scenario();
        let mut sold_out = badge(9, "Rare", 1_000, 10);
        sold_out.max_copies = 10;
        state.badges = vec![badge(5, "Gold", 300, 0), sold_out];

        assert!(state.add_listing_to_cart(1));
        assert!(!state.add_listing_to_cart(1));
        assert!(state.add_badge_to_cart(5));
        assert!(!state.add_badge_to_cart(9));
        assert!(!state.add_listing_to_cart(42));
        assert_eq!(state.cart.len(), 2);
        assert!(state.in_cart(CartKind::Username, 1));
        assert!(state.remove_from_cart(CartKind::Badge, 5));
        assert!(!state.remove_from_cart(CartKind::Badge, 5));
        assert_eq!(state.cart.total(), 500);
    }

    #[test]
    fn sort_keys_round_trip_their_wire_names() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().expect("parse"), key);
        }
        assert!("oldest".parse::<SortKey>().is_err());
        assert_eq!(SortKey::Popular.next(), SortKey::Newest);
        assert_eq!(Tab::Usernames.toggle(), Tab::Badges);
    }
}
