use market_core::{
    format::{format_date, format_date_full, format_price},
    Badge, CartKind, HistoryData, HistoryState, Listing, Selection, Supply, Tab,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{AppState, Focus};

const VERIFIED: &str = " ✓";

pub fn draw_ui(f: &mut Frame, app: &AppState) {
    let full = f.size();
    if full.height == 0 || full.width == 0 {
        return;
    }
    let trending_height = if app.trending_visible() { 3 } else { 0 };
    let regions = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(trending_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(full);

    draw_header(f, regions[0], app);
    draw_controls(f, regions[1], app);
    if trending_height > 0 {
        draw_trending(f, regions[2], app);
    }
    draw_catalog(f, regions[3], app);
    draw_status_line(f, regions[4], app);

    if app.catalog.cart_open {
        draw_cart(f, full, app);
    }
    if let Some(selection) = app.catalog.selection() {
        let area = centered_rect(full, 80, 80);
        match selection {
            Selection::Listing(listing) => draw_listing_detail(f, area, app, listing),
            Selection::Badge(badge) => draw_badge_detail(f, area, app, badge),
        }
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &AppState) {
    let stats = app.catalog.stats();
    let label = Style::default().fg(Color::Gray);
    let value = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let mut spans = vec![
        Span::styled("Usernames ", label),
        Span::styled(stats.username_count.to_string(), value),
        Span::raw("   "),
        Span::styled("Badges ", label),
        Span::styled(stats.badge_count.to_string(), value),
        Span::raw("   "),
        Span::styled("Listed value ", label),
        Span::styled(format_price(stats.total_value), value),
        Span::raw("   "),
        Span::styled("Trending ", label),
        Span::styled(stats.trending_count.to_string(), value),
    ];
    let cart = &app.catalog.cart;
    if !cart.is_empty() {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            format!("Cart {} · {}", cart.len(), format_price(cart.total())),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    let title = Span::styled(
        fit_text_variants(area.width.saturating_sub(2), &["Username & Badge Market", "Market"]),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    );
    let para = Paragraph::new(Line::from(spans))
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(para, area);
}

fn draw_controls(f: &mut Frame, area: Rect, app: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(10)])
        .split(area);

    let selected = match app.catalog.tab {
        Tab::Usernames => 0,
        Tab::Badges => 1,
    };
    let tabs = Tabs::new(vec!["Usernames", "Badges"])
        .select(selected)
        .block(Block::default().borders(Borders::ALL).title("Tab"))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, cols[0]);

    let title = compose_search_title(cols[1].width, app.catalog.sort.label());
    let text = if app.catalog.search.is_empty() && !app.editing_search {
        Span::styled("press / to search", Style::default().fg(Color::DarkGray))
    } else if app.editing_search {
        Span::raw(format!("{}_", app.catalog.search))
    } else {
        Span::raw(app.catalog.search.as_str())
    };
    let input = Paragraph::new(Line::from(text)).block(
        outer_block(app.editing_search).title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
    );
    f.render_widget(input, cols[1]);
}

fn draw_trending(f: &mut Frame, area: Rect, app: &AppState) {
    let focused = app.focus == Focus::Trending;
    let mut spans: Vec<Span> = Vec::new();
    for (i, badge) in app.catalog.trending.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        let mut style = Style::default().fg(Color::Yellow);
        if focused && i == app.trending_selected {
            style = style.bg(Color::Blue).fg(Color::White);
        }
        spans.push(Span::styled(
            format!("{} {}", badge.name, format_price(badge.price)),
            style,
        ));
    }
    let title = fit_text_variants(
        area.width.saturating_sub(2),
        &["Trending ('t' to focus, Left/Right to pick)", "Trending"],
    );
    let para = Paragraph::new(Line::from(spans)).block(outer_block(focused).title(title));
    f.render_widget(para, area);
}

fn draw_catalog(f: &mut Frame, area: Rect, app: &AppState) {
    let focused = app.focus == Focus::List && !app.editing_search;
    if app.catalog.loading {
        let para = Paragraph::new("Loading...")
            .alignment(Alignment::Center)
            .block(outer_block(focused));
        f.render_widget(para, area);
        return;
    }

    let (items, title, empty_hint): (Vec<ListItem>, &str, &str) = match app.catalog.tab {
        Tab::Usernames => (
            app.catalog
                .visible_listings()
                .into_iter()
                .map(|l| ListItem::new(listing_row(app, l)))
                .collect(),
            "Usernames",
            "No active listings",
        ),
        Tab::Badges => (
            app.catalog
                .visible_badges()
                .into_iter()
                .map(|b| ListItem::new(badge_row(app, b)))
                .collect(),
            "Badges",
            "No badges available",
        ),
    };

    if items.is_empty() {
        let hint = if app.catalog.search.is_empty() {
            empty_hint
        } else {
            "Try a different query"
        };
        let lines = vec![
            Line::from(Span::styled(
                "Nothing found",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        ];
        let para = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(outer_block(focused).title(title));
        f.render_widget(para, area);
        return;
    }

    let len = items.len();
    let list = List::new(items)
        .block(outer_block(focused).title(format!("{title} ({len})")))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
    let mut state = list_state(app.selected, len);
    f.render_stateful_widget(list, area, &mut state);
}

fn listing_row(app: &AppState, listing: &Listing) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            format!("@{}", listing.username),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ({})", listing.name_len()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::raw(listing.seller.display_name().to_string()),
    ];
    if listing.seller.is_verified {
        spans.push(Span::styled(VERIFIED, Style::default().fg(Color::Blue)));
    }
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format_price(listing.price),
        Style::default().fg(Color::Green),
    ));
    if app.catalog.in_cart(CartKind::Username, listing.id) {
        spans.push(Span::styled(" [in cart]", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn badge_row(app: &AppState, badge: &Badge) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            badge.name.clone(),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  by {}", badge.creator.display_name()),
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Supply::Limited { sold, max } = badge.supply() {
        let pct = badge.progress_percent().unwrap_or(0);
        spans.push(Span::raw(format!("  sold {sold} of {max} ({pct}%)")));
    }
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format_price(badge.price),
        Style::default().fg(Color::Green),
    ));
    if badge.sold_out() {
        spans.push(Span::styled(
            " SOLD OUT",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    if app.catalog.in_cart(CartKind::Badge, badge.id) {
        spans.push(Span::styled(" [in cart]", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &AppState) {
    let (text, style) = match &app.status {
        Some(msg) => (msg.clone(), Style::default().fg(Color::Yellow)),
        None => (
            compose_help(area.width, app),
            Style::default().fg(Color::DarkGray),
        ),
    };
    f.render_widget(
        Paragraph::new(trim_to_width(&text, area.width as usize)).style(style),
        area,
    );
}

fn draw_listing_detail(f: &mut Frame, area: Rect, app: &AppState, listing: &Listing) {
    f.render_widget(Clear, area);
    let title = compose_detail_title(area.width, &format!("@{}", listing.username));
    let block = outer_block(true).title(Span::styled(
        title,
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Price    ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_price(listing.price),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Seller   ", Style::default().fg(Color::Gray)),
            Span::raw(seller_label(listing)),
        ]),
        Line::from(vec![
            Span::styled("Listed   ", Style::default().fg(Color::Gray)),
            Span::raw(format_date_full(&listing.created_at, app.locale)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Ownership history",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    match app.catalog.history() {
        HistoryState::Idle => {}
        HistoryState::Loading => lines.push(Line::from(Span::styled(
            "Loading history...",
            Style::default().fg(Color::DarkGray),
        ))),
        HistoryState::Unavailable => lines.push(Line::from(Span::styled(
            "History unavailable",
            Style::default().fg(Color::Red),
        ))),
        HistoryState::Loaded(data) => lines.extend(history_lines(app, data)),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        fit_text_variants(
            inner.width,
            &["b buy · a add to cart · Esc close", "b/a/Esc"],
        ),
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn seller_label(listing: &Listing) -> String {
    let seller = &listing.seller;
    let mut label = seller.display_name().to_string();
    if !seller.username.is_empty() && seller.username != label {
        label.push_str(&format!(" (@{})", seller.username));
    }
    if seller.is_verified {
        label.push_str(VERIFIED);
    }
    label
}

fn history_lines(app: &AppState, data: &HistoryData) -> Vec<Line<'static>> {
    if data.ownership_history.is_empty() {
        return vec![Line::from(Span::styled(
            "No ownership records",
            Style::default().fg(Color::DarkGray),
        ))];
    }
    data.ownership_history
        .iter()
        .map(|record| {
            let buyer = data
                .buyer_of(record)
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| record.buyer_username.clone());
            let mut spans = vec![
                Span::raw(format!("  {buyer}")),
                Span::styled(
                    format!("  {}", format_price(record.price)),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!("  {}", format_date(&record.timestamp, app.locale)),
                    Style::default().fg(Color::Gray),
                ),
            ];
            if record.is_mint() {
                spans.push(Span::styled(" [mint]", Style::default().fg(Color::Cyan)));
            }
            Line::from(spans)
        })
        .collect()
}

fn draw_badge_detail(f: &mut Frame, area: Rect, app: &AppState, badge: &Badge) {
    f.render_widget(Clear, area);
    let title = compose_detail_title(area.width, &badge.name);
    let block = outer_block(true).title(Span::styled(
        title,
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let gauge_height = if badge.progress_percent().is_some() { 3 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(gauge_height),
            Constraint::Min(2),
            Constraint::Length(1),
        ])
        .split(inner);

    let mut head = vec![
        Line::from(vec![
            Span::styled("Price    ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_price(badge.price),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Creator  ", Style::default().fg(Color::Gray)),
            Span::raw(badge.creator.display_name().to_string()),
        ]),
    ];
    if let Some(url) = badge.image_url(&app.image_base) {
        head.push(Line::from(vec![
            Span::styled("Image    ", Style::default().fg(Color::Gray)),
            Span::styled(url, Style::default().fg(Color::DarkGray)),
        ]));
    }
    if !badge.description.is_empty() {
        head.push(Line::from(badge.description.clone()));
    }
    f.render_widget(Paragraph::new(head).wrap(Wrap { trim: true }), rows[0]);

    if let Some(pct) = badge.progress_percent() {
        let label = match (badge.sold_out(), badge.remaining()) {
            (true, _) => "SOLD OUT".to_string(),
            (false, Some(left)) => format!("{pct}% sold · {left} left"),
            (false, None) => format!("{pct}% sold"),
        };
        let color = if badge.sold_out() {
            Color::Red
        } else {
            Color::Magenta
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Supply"))
            .gauge_style(Style::default().fg(color))
            .percent(u16::from(pct))
            .label(label);
        f.render_widget(gauge, rows[1]);
    }

    let owners: Vec<ListItem> = badge
        .purchases
        .iter()
        .map(|p| {
            ListItem::new(Line::from(vec![
                Span::raw(p.buyer.display_name().to_string()),
                Span::styled(
                    format!("  {}", format_date(&p.purchase_date, app.locale)),
                    Style::default().fg(Color::Gray),
                ),
            ]))
        })
        .collect();
    let owners_title = format!("Owners ({})", badge.purchases.len());
    if owners.is_empty() {
        f.render_widget(
            Paragraph::new("No owners yet").block(Block::default().title(owners_title)),
            rows[2],
        );
    } else {
        f.render_widget(
            List::new(owners).block(Block::default().title(owners_title)),
            rows[2],
        );
    }

    let hint = if badge.sold_out() {
        Span::styled(
            "SOLD OUT · Esc close",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            fit_text_variants(rows[3].width, &["b buy · a add to cart · Esc close", "b/a/Esc"]),
            Style::default().fg(Color::DarkGray),
        )
    };
    f.render_widget(Paragraph::new(Line::from(hint)), rows[3]);
}

fn draw_cart(f: &mut Frame, full: Rect, app: &AppState) {
    let width = (full.width / 2).max(30).min(full.width);
    let area = Rect {
        x: full.x + full.width - width,
        y: full.y,
        width,
        height: full.height,
    };
    f.render_widget(Clear, area);
    let cart = &app.catalog.cart;
    let block = outer_block(true).title(Span::styled(
        format!("Cart ({})", cart.len()),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(2)])
        .split(inner);

    if cart.is_empty() {
        f.render_widget(
            Paragraph::new("Cart is empty")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            rows[0],
        );
    } else {
        let items: Vec<ListItem> = cart
            .iter()
            .map(|item| {
                let kind = match item.kind() {
                    CartKind::Username => "username",
                    CartKind::Badge => "badge",
                };
                ListItem::new(Line::from(vec![
                    Span::raw(item.display_name()),
                    Span::styled(format!("  {kind}"), Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        format!("  {}", format_price(item.price())),
                        Style::default().fg(Color::Green),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
        let mut state = list_state(app.cart_selected, cart.len());
        f.render_stateful_widget(list, rows[0], &mut state);
    }

    let footer = vec![
        Line::from(vec![
            Span::styled("Total ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_price(cart.total()),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            fit_text_variants(rows[1].width, &["Enter buy · d remove · Esc close", "Enter/d/Esc"]),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(Paragraph::new(footer), rows[1]);
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let scale = |len: u16, pct: u16| (u32::from(len) * u32::from(pct.min(100)) / 100) as u16;
    let width = scale(area.width, percent_x);
    let height = scale(area.height, percent_y);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn list_state(selected: usize, len: usize) -> ratatui::widgets::ListState {
    let mut state = ratatui::widgets::ListState::default();
    if len > 0 {
        state.select(Some(selected.min(len - 1)));
    }
    state
}

fn outer_block(focused: bool) -> Block<'static> {
    let mut blk = Block::default().borders(Borders::ALL);
    if focused {
        blk = blk
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(Color::Cyan));
    }
    blk
}

fn fit_text_variants(max_width: u16, variants: &[&str]) -> String {
    let w = max_width as usize;
    for v in variants.iter() {
        if v.chars().count() <= w {
            return (*v).to_string();
        }
    }
    let s = variants.last().copied().unwrap_or("");
    trim_to_width(s, w)
}

fn trim_to_width(s: &str, w: usize) -> String {
    if s.chars().count() <= w {
        return s.to_string();
    }
    if w == 0 {
        return String::new();
    }
    if w <= 3 {
        return ".".repeat(w);
    }
    let mut out: String = s.chars().take(w - 3).collect();
    out.push_str("...");
    out
}

fn compose_search_title(width: u16, sort_label: &str) -> String {
    let full = format!("Search (/ to edit, s to sort: {sort_label})");
    let short = format!("Search · {sort_label}");
    fit_text_variants(width.saturating_sub(2), &[&full, &short, "Search"])
}

fn compose_detail_title(width: u16, title: &str) -> String {
    trim_to_width(title, width.saturating_sub(2) as usize)
}

fn compose_help(width: u16, app: &AppState) -> String {
    let variants: &[&str] = if app.editing_search {
        &["Type to filter · Enter/Esc done", "Enter/Esc done"]
    } else {
        &[
            "Up/Down move · Enter details · a add · c cart · Tab switch · s sort · / search · r reload · q quit",
            "Enter · a · c · Tab · s · / · r · q",
        ]
    };
    fit_text_variants(width, variants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{format::DEFAULT_LOCALE, CatalogSnapshot};
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    fn render(app: &AppState) -> String {
        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal.draw(|f| draw_ui(f, app)).expect("draw");
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<Vec<_>>()
            .join("")
    }

    #[test]
    fn text_fitting_picks_the_widest_variant_that_fits() {
        assert_eq!(fit_text_variants(10, &["much too long", "short"]), "short");
        assert_eq!(fit_text_variants(4, &["much too long", "short"]), "s...");
        assert_eq!(trim_to_width("абвгдеж", 5), "аб...");
        assert_eq!(trim_to_width("ok", 0), "");
    }

    #[test]
    fn centered_rect_handles_very_wide_terminals() {
        let rect = |x, y, width, height| Rect { x, y, width, height };
        assert_eq!(centered_rect(rect(0, 0, 1000, 400), 80, 80), rect(100, 40, 800, 320));
        let widest = centered_rect(rect(0, 0, u16::MAX, u16::MAX), 80, 80);
        assert_eq!((widest.width, widest.height), (52_428, 52_428));
        assert_eq!(widest.x, 6_553);
    }

    #[test]
    fn loading_and_empty_states_render() {
        let mut app = AppState::new(DEFAULT_LOCALE, String::new());
        assert!(render(&app).contains("Loading..."));

        app.apply_snapshot(CatalogSnapshot {
            listings: Some(Vec::new()),
            badges: Some(Vec::new()),
            trending: Some(Vec::new()),
        });
        let screen = render(&app);
        assert!(screen.contains("Nothing found"));
        assert!(screen.contains("No active listings"));
    }

    #[test]
    fn sold_out_badges_are_marked() {
        let mut app = AppState::new(DEFAULT_LOCALE, String::new());
        app.catalog.tab = Tab::Badges;
        app.apply_snapshot(CatalogSnapshot {
            listings: Some(Vec::new()),
            badges: Some(
                serde_json::from_value(json!([
                    {"id": 1, "name": "Gold", "price": 300, "copies_sold": 5, "max_copies": 5}
                ]))
                .expect("badges"),
            ),
            trending: Some(Vec::new()),
        });
        let screen = render(&app);
        assert!(screen.contains("Gold"));
        assert!(screen.contains("sold 5 of 5 (100%)"));
        assert!(screen.contains("SOLD OUT"));
    }
}
