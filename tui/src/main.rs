use std::{env, fs::OpenOptions, io, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Locale;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use gateway::{HttpCatalogSource, DEFAULT_UPSTREAM};
use market_core::{
    format::{parse_locale, DEFAULT_LOCALE},
    load_catalog, load_history, CatalogSnapshot, HistoryData, HistoryRequest,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod nav;
mod ui;

use app::{Action, AppState};
use nav::SystemBrowser;

const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_LOG_PATH: &str = "market-tui.log";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

enum AppEvent {
    Catalog(CatalogSnapshot),
    History {
        generation: u64,
        result: Result<Option<HistoryData>>,
    },
}

struct Settings {
    proxy_url: String,
    locale: Locale,
    image_base: String,
    log_path: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Settings {
    fn from_env() -> Self {
        let locale = env::var("MARKET_LOCALE")
            .ok()
            .map(|name| parse_locale(&name))
            .unwrap_or(DEFAULT_LOCALE);
        Self {
            proxy_url: env_or("MARKET_PROXY_URL", DEFAULT_PROXY_URL),
            locale,
            image_base: env_or("MARKET_IMAGE_BASE", DEFAULT_UPSTREAM),
            log_path: env_or("MARKET_LOG", DEFAULT_LOG_PATH),
        }
    }
}

fn init_logging(path: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn spawn_catalog_load(source: Arc<HttpCatalogSource>, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let snapshot = load_catalog(source.as_ref()).await;
        let _ = tx.send(AppEvent::Catalog(snapshot));
    });
}

fn spawn_history_fetch(
    source: Arc<HttpCatalogSource>,
    tx: UnboundedSender<AppEvent>,
    request: HistoryRequest,
) {
    tokio::spawn(async move {
        let result = load_history(source.as_ref(), &request.username).await;
        let _ = tx.send(AppEvent::History {
            generation: request.generation,
            result,
        });
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // locale warnings go to the log file
    init_logging(&env_or("MARKET_LOG", DEFAULT_LOG_PATH))?;
    let settings = Settings::from_env();
    info!(target: "tui", proxy = %settings.proxy_url, log = %settings.log_path, "storefront starting");

    let source = Arc::new(HttpCatalogSource::new(&settings.proxy_url, REQUEST_TIMEOUT)?);
    let (tx, rx) = mpsc::unbounded_channel::<AppEvent>();
    spawn_catalog_load(Arc::clone(&source), tx.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app = AppState::new(settings.locale, settings.image_base);
    let result = run(&mut terminal, app, source, tx, rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    if let Err(err) = &result {
        warn!(target: "tui", ?err, "storefront exited with error");
    }
    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: AppState,
    source: Arc<HttpCatalogSource>,
    tx: UnboundedSender<AppEvent>,
    mut rx: mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let browser = SystemBrowser;
    let mut keys = EventStream::new();

    loop {
        terminal.draw(|f| ui::draw_ui(f, &app))?;

        tokio::select! {
            Some(ev) = rx.recv() => match ev {
                AppEvent::Catalog(snapshot) => {
                    info!(
                        target: "tui",
                        listings = snapshot.listings.as_ref().map(Vec::len),
                        badges = snapshot.badges.as_ref().map(Vec::len),
                        trending = snapshot.trending.as_ref().map(Vec::len),
                        "catalog loaded"
                    );
                    app.apply_snapshot(snapshot);
                }
                AppEvent::History { generation, result } => app.apply_history(generation, result),
            },
            maybe = keys.next() => match maybe {
                Some(Ok(Event::Key(key))) => match app.handle_key(key, &browser) {
                    Action::Quit => break,
                    Action::Reload => spawn_catalog_load(Arc::clone(&source), tx.clone()),
                    Action::FetchHistory(request) => {
                        spawn_history_fetch(Arc::clone(&source), tx.clone(), request)
                    }
                    Action::None => {}
                },
                Some(Ok(_)) => {}
                Some(Err(err)) => warn!(target: "tui", ?err, "terminal event error"),
                None => break,
            },
        }
    }
    info!(target: "tui", "storefront closed");
    Ok(())
}
