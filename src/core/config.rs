// ---------------------------------------------------------------------------
// BoardConfig — file-based config loader (kolboard.json) with env-var fallback
// ---------------------------------------------------------------------------
//
// The upstream page is a live Next.js build: its class names carry hashed
// suffixes and have already shipped in more than one variant. Every selector,
// marker fragment, and timeout is therefore configuration with a working
// default, never a hardcoded assumption — a markup change is a config edit,
// not a rebuild.

use serde::Deserialize;

pub const ENV_CONFIG_PATH: &str = "KOLBOARD_CONFIG";
pub const ENV_LEADERBOARD_URL: &str = "KOLBOARD_LEADERBOARD_URL";
pub const ENV_WEBHOOK_URL: &str = "KOLBOARD_WEBHOOK_URL";
pub const ENV_INTERVAL_SECS: &str = "KOLBOARD_INTERVAL_SECS";

/// Selector sub-config (mirrors the `selectors` key in kolboard.json).
///
/// All fields are optional; the defaults match the page variant the service
/// was last verified against.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct SelectorConfig {
    /// One element per ranked player.
    pub player_container: Option<String>,
    /// Ordered candidates for the textual rank label; the first whose text
    /// is numeric wins.
    pub rank_labels: Option<Vec<String>>,
    /// Class-name fragments marking the podium places.
    pub first_place_marker: Option<String>,
    pub second_place_marker: Option<String>,
    pub third_place_marker: Option<String>,
    /// Anchor carrying the player's profile href.
    pub profile_anchor: Option<String>,
    pub profile_icon: Option<String>,
    pub player_name: Option<String>,
    /// Win/loss cells, in document order.
    pub stat_cells: Option<String>,
    /// Container holding the two profit figures as adjacent headings.
    pub profit_values: Option<String>,
    /// `src` substrings identifying the social icon image.
    pub social_icon_patterns: Option<Vec<String>>,
    /// Path segment preceding the wallet address in the profile href.
    pub wallet_marker: Option<String>,
}

impl SelectorConfig {
    pub fn player_container(&self) -> String {
        self.player_container
            .clone()
            .unwrap_or_else(|| "div[class*='leaderboard_leaderboardUser']".to_string())
    }

    pub fn rank_labels(&self) -> Vec<String> {
        self.rank_labels
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec!["span h1".to_string(), ".leaderboard_rank".to_string()])
    }

    pub fn first_place_marker(&self) -> String {
        self.first_place_marker
            .clone()
            .unwrap_or_else(|| "leaderboard_firstPlace".to_string())
    }

    pub fn second_place_marker(&self) -> String {
        self.second_place_marker
            .clone()
            .unwrap_or_else(|| "leaderboard_secondPlace".to_string())
    }

    pub fn third_place_marker(&self) -> String {
        self.third_place_marker
            .clone()
            .unwrap_or_else(|| "leaderboard_thirdPlace".to_string())
    }

    pub fn profile_anchor(&self) -> String {
        self.profile_anchor.clone().unwrap_or_else(|| "a".to_string())
    }

    pub fn profile_icon(&self) -> String {
        self.profile_icon.clone().unwrap_or_else(|| "a img".to_string())
    }

    pub fn player_name(&self) -> String {
        self.player_name.clone().unwrap_or_else(|| "a h1".to_string())
    }

    pub fn stat_cells(&self) -> String {
        self.stat_cells
            .clone()
            .unwrap_or_else(|| ".remove-mobile p".to_string())
    }

    pub fn profit_values(&self) -> String {
        self.profit_values
            .clone()
            .unwrap_or_else(|| "[class*='leaderboard_totalProfitNum'] h1".to_string())
    }

    pub fn social_icon_patterns(&self) -> Vec<String> {
        self.social_icon_patterns
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec!["Twitter.webp".to_string(), "twitter.png".to_string()])
    }

    /// CSS selector matching any configured icon pattern, e.g.
    /// `img[src*='Twitter.webp'], img[src*='twitter.png']`.
    pub fn social_icon_selector(&self) -> String {
        self.social_icon_patterns()
            .iter()
            .map(|p| format!("img[src*='{}']", p))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn wallet_marker(&self) -> String {
        self.wallet_marker
            .clone()
            .unwrap_or_else(|| "/account/".to_string())
    }
}

/// Top-level config loaded from `kolboard.json`.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct BoardConfig {
    /// The leaderboard page URL (also the origin profile hrefs join against).
    pub leaderboard_url: Option<String>,
    /// Outbound delivery endpoint. Absent → dispatch is skipped.
    pub webhook_url: Option<String>,
    /// Seconds between scheduled passes.
    pub interval_secs: Option<u64>,
    /// Static fetch timeout.
    pub fetch_timeout_secs: Option<u64>,
    /// Webhook POST timeout.
    pub dispatch_timeout_secs: Option<u64>,
    /// How long the resolver waits for the container list to appear. This
    /// gates the whole interactive pass, so it is the long one.
    pub container_wait_ms: Option<u64>,
    /// Bounded wait for a popup after the icon click.
    pub popup_wait_ms: Option<u64>,
    /// Bounded wait for same-tab navigation after the popup wait expires.
    pub nav_wait_ms: Option<u64>,
    /// Host fragments that classify a destination as a social profile.
    pub social_domains: Option<Vec<String>>,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl BoardConfig {
    /// Leaderboard URL: JSON field → `KOLBOARD_LEADERBOARD_URL` env var → default.
    pub fn resolve_leaderboard_url(&self) -> String {
        if let Some(u) = &self.leaderboard_url {
            if !u.trim().is_empty() {
                return u.clone();
            }
        }
        std::env::var(ENV_LEADERBOARD_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://kolscan.io/leaderboard".to_string())
    }

    /// Webhook URL: JSON field → `KOLBOARD_WEBHOOK_URL` env var → `None`.
    ///
    /// An explicit empty string in the config file disables dispatch.
    pub fn resolve_webhook_url(&self) -> Option<String> {
        if let Some(u) = &self.webhook_url {
            let u = u.trim();
            return if u.is_empty() { None } else { Some(u.to_string()) };
        }
        std::env::var(ENV_WEBHOOK_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Pass interval: JSON field → `KOLBOARD_INTERVAL_SECS` env var → 6 hours.
    pub fn resolve_interval_secs(&self) -> u64 {
        if let Some(n) = self.interval_secs {
            return n.max(1);
        }
        std::env::var(ENV_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(|n: u64| n.max(1))
            .unwrap_or(6 * 60 * 60)
    }

    pub fn fetch_timeout_secs(&self) -> u64 {
        self.fetch_timeout_secs.unwrap_or(10)
    }

    pub fn dispatch_timeout_secs(&self) -> u64 {
        self.dispatch_timeout_secs.unwrap_or(10)
    }

    pub fn container_wait_ms(&self) -> u64 {
        self.container_wait_ms.unwrap_or(15_000)
    }

    pub fn popup_wait_ms(&self) -> u64 {
        self.popup_wait_ms.unwrap_or(4_000)
    }

    pub fn nav_wait_ms(&self) -> u64 {
        self.nav_wait_ms.unwrap_or(4_000)
    }

    pub fn social_domains(&self) -> Vec<String> {
        self.social_domains
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec!["twitter.com".to_string(), "x.com".to_string()])
    }
}

/// Load `kolboard.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `KOLBOARD_CONFIG` env var path
/// 2. `./kolboard.json` (process cwd)
/// 3. `../kolboard.json` (one level up, when running from a subdirectory)
///
/// Missing file → `BoardConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `BoardConfig::default()`.
pub fn load_board_config() -> BoardConfig {
    let candidates: Vec<std::path::PathBuf> = {
        let mut v = vec![
            std::path::PathBuf::from("kolboard.json"),
            std::path::PathBuf::from("../kolboard.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.insert(0, std::path::PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<BoardConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("kolboard.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "kolboard.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return BoardConfig::default();
                }
            },
            Err(_) => continue, // file not found at this path — try next
        }
    }

    BoardConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_defaults() {
        let cfg = BoardConfig::default();
        assert_eq!(
            cfg.selectors.player_container(),
            "div[class*='leaderboard_leaderboardUser']"
        );
        assert_eq!(cfg.selectors.rank_labels().len(), 2);
        assert_eq!(cfg.selectors.wallet_marker(), "/account/");
        assert_eq!(
            cfg.selectors.social_icon_selector(),
            "img[src*='Twitter.webp'], img[src*='twitter.png']"
        );
    }

    #[test]
    fn test_timeout_defaults_are_bounded() {
        let cfg = BoardConfig::default();
        assert_eq!(cfg.fetch_timeout_secs(), 10);
        assert_eq!(cfg.container_wait_ms(), 15_000);
        assert_eq!(cfg.popup_wait_ms(), 4_000);
        assert_eq!(cfg.nav_wait_ms(), 4_000);
        // The container wait gates the whole resolver and must dominate the
        // per-strategy waits.
        assert!(cfg.container_wait_ms() > cfg.popup_wait_ms());
    }

    #[test]
    fn test_json_overrides() {
        let cfg: BoardConfig = serde_json::from_str(
            r#"{
                "leaderboard_url": "https://example.com/board",
                "webhook_url": "",
                "interval_secs": 300,
                "selectors": {
                    "player_container": ".row",
                    "rank_labels": [".rank"],
                    "social_icon_patterns": ["x-logo.svg"]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.resolve_leaderboard_url(), "https://example.com/board");
        // Explicit empty string disables dispatch regardless of env.
        assert_eq!(cfg.resolve_webhook_url(), None);
        assert_eq!(cfg.resolve_interval_secs(), 300);
        assert_eq!(cfg.selectors.player_container(), ".row");
        assert_eq!(
            cfg.selectors.social_icon_selector(),
            "img[src*='x-logo.svg']"
        );
    }

    #[test]
    fn test_interval_never_zero() {
        let cfg: BoardConfig = serde_json::from_str(r#"{"interval_secs": 0}"#).unwrap();
        assert_eq!(cfg.resolve_interval_secs(), 1);
    }
}
