//! One pipeline pass, end to end: static extraction, interactive resolution,
//! positional merge, atomic snapshot replace, webhook hand-off.
//!
//! The two extraction passes run independently against a live page, so their
//! lengths can disagree; the merge is index-based with defined truncation and
//! padding, never content correlation. Exactly one pass runs at a time — the
//! scheduler and the on-demand trigger both funnel through the state's pass
//! lock, and a trigger arriving mid-pass waits its turn.

pub mod scheduler;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::types::{DatasetSnapshot, LeaderboardEntry, PassOutcome, NOT_AVAILABLE};
use crate::core::AppState;

/// Source of partial leaderboard records (the static pass). Empty means
/// "no data this pass" — the distinction between fetch failure and markup
/// mismatch is the source's to log, not the runner's to handle.
#[async_trait]
pub trait EntrySource: Send + Sync {
    async fn extract(&self) -> Vec<LeaderboardEntry>;
}

#[async_trait]
impl EntrySource for crate::scraping::extractor::StaticExtractor {
    async fn extract(&self) -> Vec<LeaderboardEntry> {
        crate::scraping::extractor::StaticExtractor::extract(self).await
    }
}

/// Resolver of one social link per player container (the interactive pass).
/// Infallible by contract: total failure comes back as `expected`
/// placeholders.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, expected: usize) -> Vec<String>;
}

#[async_trait]
impl LinkResolver for crate::scraping::resolver::SocialResolver {
    async fn resolve(&self, expected: usize) -> Vec<String> {
        crate::scraping::resolver::SocialResolver::resolve(self, expected).await
    }
}

/// Align resolved links with entries by position. The entry list alone
/// drives the record count: missing links become placeholders, excess links
/// are dropped.
pub fn merge_social_links(
    mut entries: Vec<LeaderboardEntry>,
    links: Vec<String>,
) -> Vec<LeaderboardEntry> {
    if entries.len() != links.len() {
        debug!(
            "merge: {} entries vs {} links — padding/truncating to entries",
            entries.len(),
            links.len()
        );
    }

    let mut links = links.into_iter();
    for entry in entries.iter_mut() {
        entry.x_profile_url = links.next().unwrap_or_else(|| NOT_AVAILABLE.to_string());
    }
    entries
}

/// Run one full pipeline pass.
///
/// Serialized on the state's pass lock. An empty static pass aborts without
/// touching the previous snapshot; a dead resolver degrades to placeholder
/// links; a failed dispatch is logged and nothing else. None of these kill
/// the caller.
pub async fn run_pass(state: &Arc<AppState>) -> PassOutcome {
    let _guard = state.pass_lock.lock().await;

    info!("🔄 Pipeline pass starting");

    let entries = state.entry_source.extract().await;
    if entries.is_empty() {
        warn!("⚠️ Static pass yielded no entries — keeping previous dataset");
        return PassOutcome::NoData;
    }

    let links = state.link_resolver.resolve(entries.len()).await;
    let merged = merge_social_links(entries, links);

    let snapshot = DatasetSnapshot {
        data: merged,
        scraped_at: Some(Utc::now().to_rfc3339()),
    };
    let count = snapshot.data.len();

    // Readers see the previous complete snapshot right up to this swap.
    state.replace(snapshot);
    info!("✅ Pipeline pass complete: {} entries", count);

    let current = state.current();
    match state.dispatch.deliver(&current.data).await {
        Ok(()) => {}
        Err(e) => warn!("❌ Dispatch failed (dataset unaffected): {:#}", e),
    }

    PassOutcome::Completed { entries: count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{LeaderboardEntry, NOT_AVAILABLE};

    fn entries(n: usize) -> Vec<LeaderboardEntry> {
        (0..n).map(LeaderboardEntry::placeholder).collect()
    }

    #[test]
    fn test_merge_equal_lengths() {
        let merged = merge_social_links(
            entries(2),
            vec!["https://x.com/a".to_string(), "https://x.com/b".to_string()],
        );
        assert_eq!(merged[0].x_profile_url, "https://x.com/a");
        assert_eq!(merged[1].x_profile_url, "https://x.com/b");
    }

    #[test]
    fn test_merge_pads_short_link_list() {
        let merged = merge_social_links(entries(3), vec!["https://x.com/a".to_string()]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].x_profile_url, "https://x.com/a");
        assert_eq!(merged[1].x_profile_url, NOT_AVAILABLE);
        assert_eq!(merged[2].x_profile_url, NOT_AVAILABLE);
    }

    #[test]
    fn test_merge_drops_excess_links() {
        let merged = merge_social_links(
            entries(1),
            vec![
                "https://x.com/a".to_string(),
                "https://x.com/ghost".to_string(),
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].x_profile_url, "https://x.com/a");
    }

    #[test]
    fn test_merge_empty_both_ways() {
        assert!(merge_social_links(entries(0), vec!["x".to_string()]).is_empty());
        let merged = merge_social_links(entries(2), Vec::new());
        assert!(merged.iter().all(|e| e.x_profile_url == NOT_AVAILABLE));
    }
}
