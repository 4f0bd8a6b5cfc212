use anyhow::{anyhow, Context, Result};
use market_core::Navigator;
use tracing::info;

/// Hands purchase links to the desktop's default browser.
pub struct SystemBrowser;

impl Navigator for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(anyhow!("empty purchase url"));
        }
        info!(target: "tui", url, "opening purchase page");
        open::that_detached(url).with_context(|| format!("open {url}"))
    }
}
