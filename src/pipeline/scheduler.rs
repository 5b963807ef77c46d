//! Fixed-interval pipeline trigger.
//!
//! First fire is one full interval after startup; a pass that overruns its
//! interval causes the missed ticks to be skipped, not bunched. Pass
//! failures are the pass's problem — the loop itself never exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::types::PassOutcome;
use crate::core::AppState;

pub fn start(state: Arc<AppState>) -> JoinHandle<()> {
    let interval_secs = state.config.resolve_interval_secs();

    tokio::spawn(async move {
        let period = Duration::from_secs(interval_secs);
        let start_at = Instant::now() + period;
        let mut interval = tokio::time::interval_at(start_at, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("⏰ Scheduler: one pass every {}s", interval_secs);

        loop {
            interval.tick().await;
            debug!("scheduler tick");
            match crate::pipeline::run_pass(&state).await {
                PassOutcome::Completed { entries } => {
                    debug!("scheduled pass replaced dataset ({} entries)", entries);
                }
                PassOutcome::NoData => {
                    debug!("scheduled pass yielded no data");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BoardConfig;
    use crate::core::types::LeaderboardEntry;
    use crate::pipeline::{EntrySource, LinkResolver};
    use crate::webhook::DispatchSink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource(Arc<AtomicUsize>);

    #[async_trait]
    impl EntrySource for CountingSource {
        async fn extract(&self) -> Vec<LeaderboardEntry> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Vec::new() // NoData — keeps each scheduled pass short
        }
    }

    struct NeverResolver;

    #[async_trait]
    impl LinkResolver for NeverResolver {
        async fn resolve(&self, _expected: usize) -> Vec<String> {
            Vec::new()
        }
    }

    struct NeverSink;

    #[async_trait]
    impl DispatchSink for NeverSink {
        async fn deliver(&self, _entries: &[LeaderboardEntry]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_state(passes: Arc<AtomicUsize>, interval_secs: u64) -> Arc<AppState> {
        let config = BoardConfig {
            interval_secs: Some(interval_secs),
            ..Default::default()
        };
        Arc::new(
            AppState::new(reqwest::Client::new(), config)
                .with_entry_source(Arc::new(CountingSource(passes)))
                .with_link_resolver(Arc::new(NeverResolver))
                .with_dispatch(Arc::new(NeverSink)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_fires_at_interval() {
        let passes = Arc::new(AtomicUsize::new(0));
        let _handle = start(test_state(passes.clone(), 10));

        // Ensure the spawned task is polled once so it registers its timer.
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(9)).await;
        tokio::task::yield_now().await;
        assert_eq!(passes.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }
}
