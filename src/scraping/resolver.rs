//! Interactive social-link resolution.
//!
//! The leaderboard renders each player's X/Twitter link behind an icon whose
//! click either opens a popup or redirects the current tab — the site has
//! shipped both behaviors, so neither can be assumed. Each container runs an
//! independent state machine:
//!
//! `NoIcon` → sentinel. Otherwise click, then:
//! 1. popup wait      — a new browser target appears → capture its URL, close it
//! 2. navigation wait — the current tab's URL changed → capture, restore the board
//! 3. neither         → sentinel
//!
//! Every wait is deadline-bounded; a container that resolves nothing costs
//! its own entry a placeholder, never the pass. The browser itself is a
//! per-pass resource: launched at the top, closed on every exit path.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use aho_corasick::AhoCorasick;
use anyhow::{anyhow, Context, Result};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::BoardConfig;
use crate::core::types::NOT_AVAILABLE;
use crate::scraping::browser_manager::{self, WAIT_POLL_MS};

/// Terminal state of one container's resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// No social icon in this container.
    NoIcon,
    /// The click opened a popup whose destination is a social profile.
    PopupCaptured(String),
    /// The click redirected the current tab to a social profile.
    NavigationCaptured(String),
    /// A destination was captured but its host is not a known social domain.
    OffDomain,
    /// Click landed nowhere observable within the bounded waits.
    Unresolved,
}

impl Resolution {
    fn into_link(self) -> String {
        match self {
            Resolution::PopupCaptured(url) | Resolution::NavigationCaptured(url) => url,
            _ => NOT_AVAILABLE.to_string(),
        }
    }
}

pub struct SocialResolver {
    config: Arc<BoardConfig>,
    social_domains: AhoCorasick,
}

impl SocialResolver {
    pub fn new(config: Arc<BoardConfig>) -> Self {
        // Fragments are plain substrings; Aho-Corasick gives one linear scan
        // over the destination host per classification.
        let social_domains =
            AhoCorasick::new(config.social_domains()).expect("valid social domain patterns");
        Self {
            config,
            social_domains,
        }
    }

    /// Resolve one link per visible player container. Never fails: a
    /// resolver-level failure (no browser, launch error, board never
    /// rendered) degrades to a placeholder-filled list of `expected` length.
    pub async fn resolve(&self, expected: usize) -> Vec<String> {
        match self.try_resolve(expected).await {
            Ok(links) => links,
            Err(e) => {
                warn!(
                    "❌ Interactive resolver unavailable: {:#} — social links degrade to placeholders",
                    e
                );
                vec![NOT_AVAILABLE.to_string(); expected]
            }
        }
    }

    async fn try_resolve(&self, expected: usize) -> Result<Vec<String>> {
        let exe = browser_manager::find_chrome_executable().ok_or_else(|| {
            anyhow!("no browser found — install Brave, Chrome, or Chromium, or set CHROME_EXECUTABLE")
        })?;
        let board_url = self.config.resolve_leaderboard_url();

        info!(
            "🖱️ Interactive pass: {} ({} containers expected, browser: {})",
            board_url, expected, exe
        );

        let config = browser_manager::build_headless_config(&exe, 1920, 1080)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("failed to launch browser ({}): {}", exe, e))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        // Everything past launch runs inside this bracket so the browser is
        // released on every exit path — don't let a close error shadow the
        // resolution error either.
        let result = self.drive(&browser, &board_url).await;

        browser.close().await.ok();
        handle.abort();

        result
    }

    async fn drive(&self, browser: &Browser, board_url: &str) -> Result<Vec<String>> {
        let container_sel = self.config.selectors.player_container();

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to open page: {}", e))?;
        page.goto(board_url)
            .await
            .map_err(|e| anyhow!("navigation to {} failed: {}", board_url, e))?;

        // The container wait gates the whole pass, so it gets the long
        // timeout. Expiring here means the board never rendered.
        browser_manager::wait_for_selector(&page, &container_sel, self.config.container_wait_ms())
            .await
            .context("leaderboard containers never became visible")?;

        // The browser may normalize the URL we navigated to; later
        // navigation checks compare against what the page itself reports.
        let baseline = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| board_url.to_string());

        let count = page
            .find_elements(container_sel.as_str())
            .await
            .map(|els| els.len())
            .unwrap_or(0);
        info!("🖱️ {} player containers visible", count);

        let mut links = Vec::with_capacity(count);
        for index in 0..count {
            let resolution = self
                .resolve_container(browser, &page, board_url, &baseline, index)
                .await;
            debug!("container {}: {:?}", index, resolution);
            links.push(resolution.into_link());
        }
        Ok(links)
    }

    /// One container's state machine. Errors inside cost this entry its
    /// link, nothing more.
    async fn resolve_container(
        &self,
        browser: &Browser,
        page: &Page,
        board_url: &str,
        baseline: &str,
        index: usize,
    ) -> Resolution {
        match self
            .try_container(browser, page, board_url, baseline, index)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                debug!("container {}: resolution failed: {:#}", index, e);
                Resolution::Unresolved
            }
        }
    }

    async fn try_container(
        &self,
        browser: &Browser,
        page: &Page,
        board_url: &str,
        baseline: &str,
        index: usize,
    ) -> Result<Resolution> {
        // Re-query on every iteration: a prior container's same-tab capture
        // re-navigated the page, and element handles don't survive that.
        let containers = page
            .find_elements(self.config.selectors.player_container())
            .await
            .context("container list query failed")?;
        let Some(container) = containers.get(index) else {
            // Live page shrank between passes.
            return Ok(Resolution::Unresolved);
        };

        let icon_sel = self.config.selectors.social_icon_selector();
        let Ok(icon) = container.find_element(icon_sel).await else {
            return Ok(Resolution::NoIcon);
        };

        // Snapshot the open targets so a popup is recognizable as "new".
        let known: HashSet<TargetId> = browser
            .pages()
            .await?
            .iter()
            .map(|p| p.target_id().clone())
            .collect();

        icon.scroll_into_view().await.ok();
        icon.click().await.context("icon click failed")?;

        // Strategy 1: the click opened a popup.
        if let Some(popup) = self.wait_for_popup(browser, &known).await? {
            let destination = self.settle_popup_url(&popup).await;
            popup.close().await.ok();
            return Ok(match destination {
                Some(dest) if self.is_social(&dest) => Resolution::PopupCaptured(dest),
                _ => Resolution::OffDomain,
            });
        }

        // Strategy 2: the same click redirected this tab instead.
        if let Some(dest) = self.wait_for_navigation(page, baseline).await {
            let resolution = if self.is_social(&dest) {
                Resolution::NavigationCaptured(dest)
            } else {
                Resolution::OffDomain
            };
            // Either way the board is gone; bring it back before the next
            // container runs.
            self.restore_board(page, board_url).await?;
            return Ok(resolution);
        }

        Ok(Resolution::Unresolved)
    }

    /// Poll the browser's target set for a page that wasn't open before the
    /// click, bounded by `popup_wait_ms`.
    async fn wait_for_popup(
        &self,
        browser: &Browser,
        known: &HashSet<TargetId>,
    ) -> Result<Option<Page>> {
        let deadline = Duration::from_millis(self.config.popup_wait_ms());
        let start = std::time::Instant::now();

        while start.elapsed() < deadline {
            for candidate in browser.pages().await? {
                if !known.contains(candidate.target_id()) {
                    return Ok(Some(candidate));
                }
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_MS)).await;
        }
        Ok(None)
    }

    /// A popup starts at about:blank while its real destination loads; poll
    /// until a usable URL appears, bounded by `nav_wait_ms`.
    async fn settle_popup_url(&self, popup: &Page) -> Option<String> {
        let deadline = Duration::from_millis(self.config.nav_wait_ms());
        let start = std::time::Instant::now();

        loop {
            if let Ok(Some(url)) = popup.url().await {
                if !url.is_empty() && url != "about:blank" {
                    return Some(url);
                }
            }
            if start.elapsed() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_MS)).await;
        }
    }

    /// Watch the current tab for a URL change caused by the click, bounded
    /// by `nav_wait_ms`.
    async fn wait_for_navigation(&self, page: &Page, baseline: &str) -> Option<String> {
        let deadline = Duration::from_millis(self.config.nav_wait_ms());
        let start = std::time::Instant::now();

        loop {
            if let Ok(Some(url)) = page.url().await {
                if url != baseline {
                    return Some(url);
                }
            }
            if start.elapsed() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_MS)).await;
        }
    }

    /// Re-navigate to the board and wait for the container list, so the next
    /// container starts from a known page state.
    async fn restore_board(&self, page: &Page, board_url: &str) -> Result<()> {
        page.goto(board_url)
            .await
            .context("return navigation failed")?;
        browser_manager::wait_for_selector(
            page,
            &self.config.selectors.player_container(),
            self.config.container_wait_ms(),
        )
        .await
        .context("board did not re-render after return navigation")
    }

    /// Classify a captured destination by host.
    fn is_social(&self, destination: &str) -> bool {
        match Url::parse(destination) {
            Ok(url) => url
                .host_str()
                .map(|host| self.social_domains.is_match(host))
                .unwrap_or(false),
            // Unparseable destinations (rare intermediate states) fall back
            // to a whole-string scan.
            Err(_) => self.social_domains.is_match(destination),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> SocialResolver {
        SocialResolver::new(Arc::new(BoardConfig::default()))
    }

    #[test]
    fn test_social_classification_by_host() {
        let r = resolver();
        assert!(r.is_social("https://x.com/trader"));
        assert!(r.is_social("https://twitter.com/trader"));
        assert!(r.is_social("https://mobile.twitter.com/trader"));
        assert!(!r.is_social("https://kolscan.io/account/abc"));
        // Domain fragment in the query string must not classify.
        assert!(!r.is_social("https://example.com/?ref=x.com"));
    }

    #[test]
    fn test_resolution_link_mapping() {
        assert_eq!(
            Resolution::PopupCaptured("https://x.com/a".into()).into_link(),
            "https://x.com/a"
        );
        assert_eq!(
            Resolution::NavigationCaptured("https://x.com/b".into()).into_link(),
            "https://x.com/b"
        );
        for terminal in [Resolution::NoIcon, Resolution::OffDomain, Resolution::Unresolved] {
            assert_eq!(terminal.into_link(), NOT_AVAILABLE);
        }
    }
}
