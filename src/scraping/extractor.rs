//! Static leaderboard extraction — one plain HTTP GET, no browser.
//!
//! Produces the partial records the interactive resolver later enriches.
//! Field extraction is deliberately forgiving: one broken cell must never
//! cost an entry, and one broken entry must never cost the pass. Only two
//! conditions empty the whole result — the fetch failing and the container
//! selector matching nothing — and they are logged distinctly because they
//! mean different things operationally (site down vs. markup changed).

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::core::config::{BoardConfig, SelectorConfig};
use crate::core::types::LeaderboardEntry;
use crate::scraping::browser_manager;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("leaderboard fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("leaderboard fetch returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("no player containers matched `{0}` — the page structure may have changed")]
    StructureMismatch(String),
}

pub struct StaticExtractor {
    client: Client,
    config: Arc<BoardConfig>,
}

impl StaticExtractor {
    pub fn new(client: Client, config: Arc<BoardConfig>) -> Self {
        Self { client, config }
    }

    /// Run the static pass. Empty on any failure — the caller treats "no
    /// data" uniformly and keeps the previous dataset.
    pub async fn extract(&self) -> Vec<LeaderboardEntry> {
        match self.try_extract().await {
            Ok(entries) => entries,
            Err(e @ ExtractError::StructureMismatch(_)) => {
                warn!("⚠️ {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("❌ {}", e);
                Vec::new()
            }
        }
    }

    async fn try_extract(&self) -> Result<Vec<LeaderboardEntry>, ExtractError> {
        let url = self.config.resolve_leaderboard_url();

        let response = self
            .client
            .get(&url)
            .header("User-Agent", browser_manager::random_user_agent())
            .timeout(Duration::from_secs(self.config.fetch_timeout_secs()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status));
        }

        let html = response.text().await?;
        let entries = parse_leaderboard(&html, &url, &self.config.selectors);
        if entries.is_empty() {
            return Err(ExtractError::StructureMismatch(
                self.config.selectors.player_container(),
            ));
        }

        info!("📊 Static pass: {} entries from {}", entries.len(), url);
        Ok(entries)
    }
}

/// Config selectors compiled once per parse. Selector strings come from the
/// config file, so each one may fail to compile — a broken selector disables
/// its field (the sentinel stays), it never aborts the parse.
struct CompiledSelectors {
    player_container: Option<Selector>,
    rank_labels: Vec<Selector>,
    profile_anchor: Option<Selector>,
    profile_icon: Option<Selector>,
    player_name: Option<Selector>,
    stat_cells: Option<Selector>,
    profit_values: Option<Selector>,
    first_place_marker: String,
    second_place_marker: String,
    third_place_marker: String,
    wallet_marker: String,
}

impl CompiledSelectors {
    fn compile(config: &SelectorConfig) -> Self {
        fn compile_one(raw: String) -> Option<Selector> {
            match Selector::parse(&raw) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    warn!("invalid selector `{}` in config: {:?}", raw, e);
                    None
                }
            }
        }

        Self {
            player_container: compile_one(config.player_container()),
            rank_labels: config
                .rank_labels()
                .into_iter()
                .filter_map(compile_one)
                .collect(),
            profile_anchor: compile_one(config.profile_anchor()),
            profile_icon: compile_one(config.profile_icon()),
            player_name: compile_one(config.player_name()),
            stat_cells: compile_one(config.stat_cells()),
            profit_values: compile_one(config.profit_values()),
            first_place_marker: config.first_place_marker(),
            second_place_marker: config.second_place_marker(),
            third_place_marker: config.third_place_marker(),
            wallet_marker: config.wallet_marker(),
        }
    }
}

/// Parse leaderboard markup into partial entries (social link still at its
/// placeholder). Pure — unit-tested against fixture markup.
pub fn parse_leaderboard(
    html: &str,
    page_url: &str,
    config: &SelectorConfig,
) -> Vec<LeaderboardEntry> {
    let selectors = CompiledSelectors::compile(config);
    let Some(container_sel) = selectors.player_container.as_ref() else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let base_url = Url::parse(page_url).ok();

    document
        .select(container_sel)
        .enumerate()
        .map(|(index, container)| extract_entry(container, index, &selectors, base_url.as_ref()))
        .collect()
}

fn extract_entry(
    container: ElementRef<'_>,
    index: usize,
    selectors: &CompiledSelectors,
    base_url: Option<&Url>,
) -> LeaderboardEntry {
    let mut entry = LeaderboardEntry::placeholder(index);

    entry.rank = derive_rank(container, index, selectors);

    if let Some(anchor_sel) = selectors.profile_anchor.as_ref() {
        if let Some(href) = container
            .select(anchor_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        {
            entry.profile_url = absolutize(href, base_url);
            if let Some(wallet) = wallet_from_href(href, &selectors.wallet_marker) {
                entry.wallet_address = wallet;
            }
        }
    }

    if let Some(icon_sel) = selectors.profile_icon.as_ref() {
        if let Some(src) = container
            .select(icon_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
        {
            entry.profile_icon = absolutize(src, base_url);
        }
    }

    if let Some(name) = selectors
        .player_name
        .as_ref()
        .and_then(|sel| first_text(container, sel))
    {
        entry.name = name;
    }

    if let Some(stats_sel) = selectors.stat_cells.as_ref() {
        let stats: Vec<String> = texts_of(container, stats_sel);
        if let Some(wins) = stats.first() {
            entry.wins = wins.clone();
        }
        if let Some(losses) = stats.get(1) {
            entry.losses = losses.clone();
        }
    }

    if let Some(profit_sel) = selectors.profit_values.as_ref() {
        let profits: Vec<String> = texts_of(container, profit_sel);
        if let Some(sol) = profits.first() {
            entry.sol_number = sol.clone();
        }
        if let Some(dollars) = profits.get(1) {
            entry.dollar_value = dollars.clone();
        }
    }

    entry
}

/// Rank precedence: podium marker class ▸ numeric rank-label text ▸ 1-based
/// position. The marker always wins — during podium animation the label text
/// has been observed lagging a refresh behind.
fn derive_rank(container: ElementRef<'_>, index: usize, selectors: &CompiledSelectors) -> String {
    let classes: Vec<&str> = container.value().classes().collect();
    if classes.iter().any(|c| c.contains(selectors.first_place_marker.as_str())) {
        return "1".to_string();
    }
    if classes.iter().any(|c| c.contains(selectors.second_place_marker.as_str())) {
        return "2".to_string();
    }
    if classes.iter().any(|c| c.contains(selectors.third_place_marker.as_str())) {
        return "3".to_string();
    }

    for label_sel in &selectors.rank_labels {
        if let Some(text) = first_text(container, label_sel) {
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                return text;
            }
        }
    }

    (index + 1).to_string()
}

fn first_text(container: ElementRef<'_>, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn texts_of(container: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    container
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Convert a relative href/src to an absolute URL against the page origin.
fn absolutize(href: &str, base_url: Option<&Url>) -> String {
    match base_url.and_then(|base| base.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

/// Wallet address = the path remainder after the configured marker.
fn wallet_from_href(href: &str, marker: &str) -> Option<String> {
    let start = href.find(marker)? + marker.len();
    let wallet = &href[start..];
    if wallet.is_empty() {
        None
    } else {
        Some(wallet.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NOT_AVAILABLE, UNKNOWN_NAME, ZERO_STAT};

    const PAGE_URL: &str = "https://kolscan.io/leaderboard";

    // Markup in the shape of the live page: hashed class suffixes, podium
    // marker on the winner, label-only rank further down.
    const FIXTURE: &str = r#"
        <html><body>
        <div class="leaderboard_leaderboardUser__8OZpJ leaderboard_firstPlace__x91Kd">
            <span><h1>4</h1></span>
            <a href="/account/7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU">
                <img src="/avatars/alpha.png"/>
                <h1>Alpha</h1>
            </a>
            <div class="remove-mobile"><p>12</p><p>5</p></div>
            <div class="leaderboard_totalProfitNum__HzfFO"><h1>+102.5</h1><h1>($15,230)</h1></div>
            <img src="/icons/Twitter.webp"/>
        </div>
        <div class="leaderboard_leaderboardUser__8OZpJ">
            <span><h1>2</h1></span>
            <a href="/account/9aBcD"><img src="/avatars/beta.png"/><h1>Beta</h1></a>
            <div class="remove-mobile"><p>8</p><p>9</p></div>
            <div class="leaderboard_totalProfitNum__HzfFO"><h1>+44.0</h1><h1>($6,100)</h1></div>
        </div>
        <div class="leaderboard_leaderboardUser__8OZpJ">
            <span><h1>n/a</h1></span>
            <a href="/profile-pending"><h1>Gamma</h1></a>
        </div>
        </body></html>
    "#;

    fn parse_fixture() -> Vec<LeaderboardEntry> {
        parse_leaderboard(FIXTURE, PAGE_URL, &SelectorConfig::default())
    }

    #[test]
    fn test_one_entry_per_container() {
        assert_eq!(parse_fixture().len(), 3);
    }

    #[test]
    fn test_podium_marker_beats_rank_label() {
        let entries = parse_fixture();
        // First container carries the first-place marker class AND a label
        // reading "4" — the marker must win.
        assert_eq!(entries[0].rank, "1");
    }

    #[test]
    fn test_numeric_label_beats_position() {
        let entries = parse_fixture();
        assert_eq!(entries[1].rank, "2");

        // A label disagreeing with the position proves the label wins.
        let html = r#"<div class="leaderboard_leaderboardUser__8OZpJ"><span><h1>7</h1></span></div>"#;
        let entries = parse_leaderboard(html, PAGE_URL, &SelectorConfig::default());
        assert_eq!(entries[0].rank, "7");
    }

    #[test]
    fn test_non_numeric_label_falls_back_to_position() {
        let entries = parse_fixture();
        assert_eq!(entries[2].rank, "3");
    }

    #[test]
    fn test_profile_url_is_absolutized() {
        let entries = parse_fixture();
        assert_eq!(
            entries[0].profile_url,
            "https://kolscan.io/account/7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
        );
        assert_eq!(entries[0].profile_icon, "https://kolscan.io/avatars/alpha.png");
    }

    #[test]
    fn test_wallet_extracted_from_marked_path() {
        let entries = parse_fixture();
        assert_eq!(
            entries[0].wallet_address,
            "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
        );
        // No /account/ segment → placeholder.
        assert_eq!(entries[2].wallet_address, NOT_AVAILABLE);
    }

    #[test]
    fn test_stats_and_profits() {
        let entries = parse_fixture();
        assert_eq!(entries[0].wins, "12");
        assert_eq!(entries[0].losses, "5");
        assert_eq!(entries[0].sol_number, "+102.5");
        assert_eq!(entries[0].dollar_value, "($15,230)");
    }

    #[test]
    fn test_missing_fields_get_documented_defaults() {
        let entries = parse_fixture();
        let sparse = &entries[2];
        assert_eq!(sparse.name, "Gamma");
        assert_eq!(sparse.wins, ZERO_STAT);
        assert_eq!(sparse.losses, ZERO_STAT);
        assert_eq!(sparse.sol_number, NOT_AVAILABLE);
        assert_eq!(sparse.dollar_value, NOT_AVAILABLE);
        assert_eq!(sparse.profile_icon, NOT_AVAILABLE);
    }

    #[test]
    fn test_every_field_always_populated() {
        for entry in parse_fixture() {
            for value in [
                &entry.rank,
                &entry.profile_icon,
                &entry.name,
                &entry.profile_url,
                &entry.wallet_address,
                &entry.wins,
                &entry.losses,
                &entry.sol_number,
                &entry.dollar_value,
                &entry.x_profile_url,
            ] {
                assert!(!value.is_empty());
            }
        }
    }

    #[test]
    fn test_social_link_stays_placeholder_in_static_pass() {
        for entry in parse_fixture() {
            assert_eq!(entry.x_profile_url, NOT_AVAILABLE);
        }
    }

    #[test]
    fn test_missing_name_yields_unknown() {
        let html = r#"<div class="leaderboard_leaderboardUser__8OZpJ"><a href="/account/abc"></a></div>"#;
        let entries = parse_leaderboard(html, PAGE_URL, &SelectorConfig::default());
        assert_eq!(entries[0].name, UNKNOWN_NAME);
    }

    #[test]
    fn test_empty_markup_yields_no_entries() {
        assert!(parse_leaderboard("<html></html>", PAGE_URL, &SelectorConfig::default()).is_empty());
    }

    #[test]
    fn test_invalid_configured_selector_does_not_panic() {
        let config = SelectorConfig {
            player_name: Some(":::".to_string()),
            ..Default::default()
        };
        let entries = parse_leaderboard(FIXTURE, PAGE_URL, &config);
        // Broken selector disables the field, everything else still works.
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, UNKNOWN_NAME);
        assert_eq!(entries[0].rank, "1");
    }
}
