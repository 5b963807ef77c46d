use serde::{Deserialize, Serialize};

/// Placeholder for any field the page did not yield.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder display name when the name element is missing.
pub const UNKNOWN_NAME: &str = "Unknown";
/// Placeholder win/loss figure when the stat cells are missing.
pub const ZERO_STAT: &str = "0";

/// One player's leaderboard record at a point in time.
///
/// Every field is always populated — either with an extracted value or its
/// documented placeholder. Figures stay as the page's display strings
/// (`"+123.4"`, `"($12,345)"`); the downstream consumer formats them, we
/// don't interpret them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: String,
    pub profile_icon: String,
    pub name: String,
    pub profile_url: String,
    pub wallet_address: String,
    pub wins: String,
    pub losses: String,
    pub sol_number: String,
    pub dollar_value: String,
    /// Resolved X/Twitter profile URL, `"N/A"` until the interactive pass
    /// fills it in.
    #[serde(default = "default_not_available")]
    pub x_profile_url: String,
}

fn default_not_available() -> String {
    NOT_AVAILABLE.to_string()
}

impl LeaderboardEntry {
    /// A record with every field at its placeholder, used as the base the
    /// extractor fills in field-by-field.
    pub fn placeholder(position: usize) -> Self {
        Self {
            rank: (position + 1).to_string(),
            profile_icon: NOT_AVAILABLE.to_string(),
            name: UNKNOWN_NAME.to_string(),
            profile_url: NOT_AVAILABLE.to_string(),
            wallet_address: NOT_AVAILABLE.to_string(),
            wins: ZERO_STAT.to_string(),
            losses: ZERO_STAT.to_string(),
            sol_number: NOT_AVAILABLE.to_string(),
            dollar_value: NOT_AVAILABLE.to_string(),
            x_profile_url: NOT_AVAILABLE.to_string(),
        }
    }
}

/// The process-wide current dataset. Replaced wholesale by each successful
/// pipeline pass; readers always see one complete generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub data: Vec<LeaderboardEntry>,
    /// RFC 3339 timestamp of the pass that produced this snapshot.
    #[serde(default)]
    pub scraped_at: Option<String>,
}

/// Outcome of one pipeline pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// A fresh snapshot with this many entries replaced the previous one.
    Completed { entries: usize },
    /// The static pass yielded nothing; the previous snapshot was kept.
    NoData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub data: Vec<LeaderboardEntry>,
    #[serde(default)]
    pub scraped_at: Option<String>,
}
