use chrono::Locale;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use market_core::{
    Badge, CartKind, CatalogSnapshot, CatalogState, HistoryData, HistoryRequest, ItemId, Listing,
    Navigator, Selection, Tab,
};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    List,
    Trending,
}

/// Side effects the event loop performs after a key press.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Reload,
    FetchHistory(HistoryRequest),
}

pub struct AppState {
    pub catalog: CatalogState,
    pub focus: Focus,
    pub editing_search: bool,
    pub selected: usize,
    pub trending_selected: usize,
    pub cart_selected: usize,
    pub status: Option<String>,
    pub locale: Locale,
    pub image_base: String,
}

impl AppState {
    pub fn new(locale: Locale, image_base: String) -> Self {
        Self {
            catalog: CatalogState::new(),
            focus: Focus::List,
            editing_search: false,
            selected: 0,
            trending_selected: 0,
            cart_selected: 0,
            status: None,
            locale,
            image_base,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: CatalogSnapshot) {
        let missing: Vec<&str> = [
            ("listings", snapshot.listings.is_none()),
            ("badges", snapshot.badges.is_none()),
            ("trending", snapshot.trending.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, failed)| failed.then_some(name))
        .collect();
        self.catalog.apply_snapshot(snapshot);
        self.status = if missing.is_empty() {
            None
        } else {
            Some(format!("Could not load: {}", missing.join(", ")))
        };
        self.clamp_selection();
    }

    pub fn apply_history(&mut self, generation: u64, result: anyhow::Result<Option<HistoryData>>) {
        if !self.catalog.apply_history(generation, result) {
            debug!(target: "tui", generation, "history response arrived after detail closed");
        }
    }

    pub fn detail_open(&self) -> bool {
        self.catalog.selection().is_some()
    }

    pub fn trending_visible(&self) -> bool {
        self.catalog.tab == Tab::Badges && !self.catalog.trending.is_empty()
    }

    pub fn highlighted_listing(&self) -> Option<&Listing> {
        self.catalog.visible_listings().get(self.selected).copied()
    }

    pub fn highlighted_badge(&self) -> Option<&Badge> {
        match self.focus {
            Focus::Trending if self.trending_visible() => {
                self.catalog.trending.get(self.trending_selected)
            }
            _ => self.catalog.visible_badges().get(self.selected).copied(),
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.catalog.visible_len();
        self.selected = if len == 0 { 0 } else { self.selected.min(len - 1) };
        let tlen = self.catalog.trending.len();
        self.trending_selected = if tlen == 0 {
            0
        } else {
            self.trending_selected.min(tlen - 1)
        };
        let clen = self.catalog.cart.len();
        self.cart_selected = if clen == 0 {
            0
        } else {
            self.cart_selected.min(clen - 1)
        };
        if !self.trending_visible() {
            self.focus = Focus::List;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, nav: &dyn Navigator) -> Action {
        if key.kind == KeyEventKind::Release {
            return Action::None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        if self.editing_search {
            self.handle_search_key(key.code);
            return Action::None;
        }
        if self.detail_open() {
            return self.handle_detail_key(key.code, nav);
        }
        if self.catalog.cart_open {
            self.handle_cart_key(key.code, nav);
            return Action::None;
        }
        self.handle_main_key(key.code)
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc | KeyCode::Enter => self.editing_search = false,
            KeyCode::Backspace => {
                self.catalog.search.pop();
                self.selected = 0;
            }
            KeyCode::Char(c) => {
                self.catalog.search.push(c);
                self.selected = 0;
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, code: KeyCode, nav: &dyn Navigator) -> Action {
        match code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => self.catalog.close_detail(),
            KeyCode::Char('b') | KeyCode::Enter => self.purchase_selection(nav),
            KeyCode::Char('a') => {
                let key = match self.catalog.selection() {
                    Some(Selection::Listing(l)) => Some((CartKind::Username, l.id)),
                    Some(Selection::Badge(b)) => Some((CartKind::Badge, b.id)),
                    None => None,
                };
                if let Some((kind, id)) = key {
                    self.add_to_cart(kind, id);
                }
            }
            _ => {}
        }
        Action::None
    }

    fn handle_cart_key(&mut self, code: KeyCode, nav: &dyn Navigator) {
        let len = self.catalog.cart.len();
        match code {
            KeyCode::Esc | KeyCode::Char('c') | KeyCode::Char('q') => {
                self.catalog.cart_open = false
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cart_selected = self.cart_selected.saturating_sub(1)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cart_selected + 1 < len {
                    self.cart_selected += 1;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(item) = self.catalog.cart.get(self.cart_selected) {
                    let (kind, id) = item.key();
                    let name = item.display_name();
                    self.catalog.remove_from_cart(kind, id);
                    self.status = Some(format!("Removed {name} from cart"));
                    self.clamp_selection();
                }
            }
            KeyCode::Enter | KeyCode::Char('b') => {
                let url = self
                    .catalog
                    .cart
                    .get(self.cart_selected)
                    .and_then(|item| item.purchase_url())
                    .map(str::to_string);
                self.open_url(url.as_deref(), nav);
            }
            _ => {}
        }
    }

    fn handle_main_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') => return Action::Quit,
            KeyCode::Char('r') => {
                if self.catalog.loading {
                    self.status = Some("Still loading".to_string());
                    return Action::None;
                }
                self.catalog.loading = true;
                self.status = None;
                return Action::Reload;
            }
            KeyCode::Char('/') => self.editing_search = true,
            KeyCode::Char('s') => {
                self.catalog.sort = self.catalog.sort.next();
                self.selected = 0;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.catalog.tab = self.catalog.tab.toggle();
                self.selected = 0;
                self.focus = Focus::List;
            }
            KeyCode::Char('t') => {
                if self.trending_visible() {
                    self.focus = match self.focus {
                        Focus::List => Focus::Trending,
                        Focus::Trending => Focus::List,
                    };
                }
            }
            KeyCode::Char('c') => {
                self.catalog.cart_open = true;
                self.clamp_selection();
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Left | KeyCode::Char('h') => self.move_by(-1),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Right | KeyCode::Char('l') => {
                self.move_by(1)
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::Char('a') => self.add_highlighted(),
            KeyCode::Enter => return self.open_highlighted(),
            _ => {}
        }
        Action::None
    }

    fn move_by(&mut self, delta: isize) {
        let (cursor, len) = match self.focus {
            Focus::Trending if self.trending_visible() => {
                (&mut self.trending_selected, self.catalog.trending.len())
            }
            _ => {
                let len = self.catalog.visible_len();
                (&mut self.selected, len)
            }
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = (*cursor as isize + delta).clamp(0, len as isize - 1);
        *cursor = next as usize;
    }

    fn open_highlighted(&mut self) -> Action {
        match self.catalog.tab {
            Tab::Usernames => {
                let Some(id) = self.highlighted_listing().map(|l| l.id) else {
                    return Action::None;
                };
                self.catalog
                    .select_listing(id)
                    .map(Action::FetchHistory)
                    .unwrap_or(Action::None)
            }
            Tab::Badges => {
                if let Some(id) = self.highlighted_badge().map(|b| b.id) {
                    if self.focus == Focus::Trending {
                        self.catalog.select_trending(id);
                    } else {
                        self.catalog.select_badge(id);
                    }
                }
                Action::None
            }
        }
    }

    fn add_highlighted(&mut self) {
        let key = match self.catalog.tab {
            Tab::Usernames => self.highlighted_listing().map(|l| (CartKind::Username, l.id)),
            Tab::Badges => self.highlighted_badge().map(|b| (CartKind::Badge, b.id)),
        };
        if let Some((kind, id)) = key {
            self.add_to_cart(kind, id);
        }
    }

    fn add_to_cart(&mut self, kind: CartKind, id: ItemId) {
        if self.catalog.in_cart(kind, id) {
            self.status = Some("Already in cart".to_string());
            return;
        }
        let added = match kind {
            CartKind::Username => self.catalog.add_listing_to_cart(id),
            CartKind::Badge => self.catalog.add_badge_to_cart(id),
        };
        let sold_out = kind == CartKind::Badge
            && self
                .catalog
                .badges
                .iter()
                .chain(self.catalog.trending.iter())
                .any(|b| b.id == id && b.sold_out());
        self.status = Some(if added {
            format!("Added to cart ({} items)", self.catalog.cart.len())
        } else if sold_out {
            "Sold out".to_string()
        } else {
            "Item is no longer listed".to_string()
        });
    }

    fn purchase_selection(&mut self, nav: &dyn Navigator) {
        if let Some(Selection::Badge(badge)) = self.catalog.selection() {
            if badge.sold_out() {
                self.status = Some("Sold out".to_string());
                return;
            }
        }
        let url = self.catalog.purchase_url().map(str::to_string);
        self.open_url(url.as_deref(), nav);
    }

    fn open_url(&mut self, url: Option<&str>, nav: &dyn Navigator) {
        let Some(url) = url else {
            self.status = Some("No purchase link for this item".to_string());
            return;
        };
        self.status = Some(match nav.open(url) {
            Ok(()) => format!("Opened {url}"),
            Err(err) => {
                warn!(target: "tui", ?err, url, "purchase navigation failed");
                format!("Could not open browser: {err}")
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{format::DEFAULT_LOCALE, HistoryState};
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingNav {
        opened: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNav {
        fn open(&self, url: &str) -> anyhow::Result<()> {
            self.opened.lock().push(url.to_string());
            Ok(())
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut AppState, nav: &RecordingNav, codes: &[KeyCode]) -> Action {
        let mut last = Action::None;
        for code in codes {
            last = app.handle_key(key(*code), nav);
        }
        last
    }

    fn loaded() -> AppState {
        let mut app = AppState::new(DEFAULT_LOCALE, "https://k-connect.ru".into());
        let listings: Vec<Listing> = serde_json::from_value(json!([
            {"id": 1, "username": "neo", "price": 500, "created_at": "2024-01-01",
             "purchase_url": "https://shop.test/u/1"},
            {"id": 2, "username": "ab", "price": 100, "created_at": "2024-06-01"},
        ]))
        .expect("listings");
        let badges: Vec<Badge> = serde_json::from_value(json!([
            {"id": 10, "name": "Gold", "price": 300, "copies_sold": 5, "max_copies": 5,
             "purchase_url": "https://shop.test/b/10"},
            {"id": 11, "name": "Silver", "price": 200, "copies_sold": 1, "max_copies": 0,
             "purchase_url": "https://shop.test/b/11"},
        ]))
        .expect("badges");
        let trending: Vec<Badge> = serde_json::from_value(json!([
            {"id": 99, "name": "Founder", "price": 900}
        ]))
        .expect("trending");
        app.apply_snapshot(CatalogSnapshot {
            listings: Some(listings),
            badges: Some(badges),
            trending: Some(trending),
        });
        app
    }

    #[test]
    fn typing_a_search_narrows_the_list() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        assert_eq!(app.catalog.visible_len(), 2);
        press(
            &mut app,
            &nav,
            &[KeyCode::Char('/'), KeyCode::Char('N'), KeyCode::Char('e'), KeyCode::Esc],
        );
        assert!(!app.editing_search);
        assert_eq!(app.catalog.search, "Ne");
        assert_eq!(app.highlighted_listing().map(|l| l.id), Some(1));
        // 'q' while editing is text, not quit
        press(&mut app, &nav, &[KeyCode::Char('/'), KeyCode::Char('q')]);
        assert_eq!(app.catalog.search, "Neq");
        assert_eq!(app.catalog.visible_len(), 0);
    }

    #[test]
    fn enter_on_a_listing_requests_history_and_esc_discards_it() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        // newest first: "ab" then "neo"
        let action = press(&mut app, &nav, &[KeyCode::Down, KeyCode::Enter]);
        let Action::FetchHistory(request) = action else {
            panic!("expected history request, got {action:?}");
        };
        assert_eq!(request.username, "neo");
        assert!(app.detail_open());
        assert_eq!(app.catalog.history(), &HistoryState::Loading);

        press(&mut app, &nav, &[KeyCode::Esc]);
        assert!(!app.detail_open());
        app.apply_history(request.generation, Ok(None));
        assert_eq!(app.catalog.history(), &HistoryState::Idle);
    }

    #[test]
    fn purchase_opens_the_link_and_skips_sold_out_badges() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        press(&mut app, &nav, &[KeyCode::Down, KeyCode::Enter, KeyCode::Char('b')]);
        assert_eq!(nav.opened.lock().as_slice(), ["https://shop.test/u/1"]);

        press(&mut app, &nav, &[KeyCode::Esc, KeyCode::Tab, KeyCode::Char('s')]);
        // price ascending: Silver (200) then Gold (300, sold out)
        assert_eq!(app.highlighted_badge().map(|b| b.id), Some(11));
        press(&mut app, &nav, &[KeyCode::Down, KeyCode::Enter, KeyCode::Char('b')]);
        assert_eq!(nav.opened.lock().len(), 1);
        assert_eq!(app.status.as_deref(), Some("Sold out"));
    }

    #[test]
    fn listing_without_link_reports_status() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        press(&mut app, &nav, &[KeyCode::Enter, KeyCode::Char('b')]);
        assert!(nav.opened.lock().is_empty());
        assert_eq!(app.status.as_deref(), Some("No purchase link for this item"));
    }

    #[test]
    fn cart_add_is_idempotent_and_remove_works() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        press(&mut app, &nav, &[KeyCode::Char('a'), KeyCode::Char('a')]);
        assert_eq!(app.catalog.cart.len(), 1);
        assert_eq!(app.status.as_deref(), Some("Already in cart"));

        press(&mut app, &nav, &[KeyCode::Tab, KeyCode::Char('s'), KeyCode::Char('s')]);
        // price descending puts sold-out Gold first
        press(&mut app, &nav, &[KeyCode::Char('a')]);
        assert_eq!(app.catalog.cart.len(), 1);
        press(&mut app, &nav, &[KeyCode::Down, KeyCode::Char('a')]);
        assert_eq!(app.catalog.cart.len(), 2);
        assert_eq!(app.catalog.cart.total(), 300);

        press(&mut app, &nav, &[KeyCode::Char('c'), KeyCode::Down, KeyCode::Char('d')]);
        assert!(app.catalog.cart_open);
        assert_eq!(app.catalog.cart.len(), 1);
        assert!(!app.catalog.in_cart(CartKind::Badge, 11));
        assert_eq!(app.cart_selected, 0);

        press(&mut app, &nav, &[KeyCode::Esc]);
        assert!(!app.catalog.cart_open);
    }

    #[test]
    fn trending_strip_takes_focus_on_badges_tab() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        press(&mut app, &nav, &[KeyCode::Char('t')]);
        assert_eq!(app.focus, Focus::List);

        press(&mut app, &nav, &[KeyCode::Tab, KeyCode::Char('t'), KeyCode::Enter]);
        assert_eq!(app.focus, Focus::Trending);
        match app.catalog.selection() {
            Some(Selection::Badge(b)) => assert_eq!(b.name, "Founder"),
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[test]
    fn failed_datasets_are_reported_and_quit_reload_map_to_actions() {
        let nav = RecordingNav::default();
        let mut app = loaded();
        app.apply_snapshot(CatalogSnapshot {
            listings: None,
            badges: Some(Vec::new()),
            trending: None,
        });
        assert_eq!(app.catalog.listings.len(), 2);
        assert_eq!(app.status.as_deref(), Some("Could not load: listings, trending"));

        assert_eq!(press(&mut app, &nav, &[KeyCode::Char('r')]), Action::Reload);
        assert!(app.catalog.loading);
        assert_eq!(press(&mut app, &nav, &[KeyCode::Char('q')]), Action::Quit);
    }

    #[test]
    fn reload_is_ignored_while_a_load_is_in_flight() {
        let nav = RecordingNav::default();
        let mut fresh = AppState::new(DEFAULT_LOCALE, String::new());
        assert_eq!(press(&mut fresh, &nav, &[KeyCode::Char('r')]), Action::None);

        let mut app = loaded();
        assert_eq!(press(&mut app, &nav, &[KeyCode::Char('r')]), Action::Reload);
        assert_eq!(press(&mut app, &nav, &[KeyCode::Char('r')]), Action::None);
        assert_eq!(app.status.as_deref(), Some("Still loading"));

        app.apply_snapshot(CatalogSnapshot::default());
        assert!(!app.catalog.loading);
        assert_eq!(press(&mut app, &nav, &[KeyCode::Char('r')]), Action::Reload);
    }

    #[test]
    fn missing_items_are_not_reported_as_sold_out() {
        let mut app = loaded();
        app.add_to_cart(CartKind::Badge, 404);
        assert_eq!(app.status.as_deref(), Some("Item is no longer listed"));
        app.add_to_cart(CartKind::Username, 404);
        assert_eq!(app.status.as_deref(), Some("Item is no longer listed"));
        app.add_to_cart(CartKind::Badge, 10);
        assert_eq!(app.status.as_deref(), Some("Sold out"));
        assert!(app.catalog.cart.is_empty());
    }
}
