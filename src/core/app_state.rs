use std::sync::Arc;

use crate::core::config::BoardConfig;
use crate::core::types::DatasetSnapshot;

pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<BoardConfig>,

    // The current dataset. Writes swap the Arc; readers clone it and keep a
    // consistent snapshot for as long as they hold it.
    dataset: std::sync::RwLock<Arc<DatasetSnapshot>>,

    // Serializes pipeline passes: the scheduler and the on-demand trigger
    // both funnel through this lock, so the single browser session is never
    // driven by two passes at once. A concurrent trigger waits its turn.
    pub pass_lock: tokio::sync::Mutex<()>,

    // Pipeline collaborators behind seams so tests can substitute stubs.
    pub entry_source: Arc<dyn crate::pipeline::EntrySource>,
    pub link_resolver: Arc<dyn crate::pipeline::LinkResolver>,
    pub dispatch: Arc<dyn crate::webhook::DispatchSink>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("entries", &self.current().data.len())
            .field("dispatch_enabled", &self.dispatch.enabled())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client, config: BoardConfig) -> Self {
        let config = Arc::new(config);
        let entry_source: Arc<dyn crate::pipeline::EntrySource> = Arc::new(
            crate::scraping::extractor::StaticExtractor::new(http_client.clone(), config.clone()),
        );
        let link_resolver: Arc<dyn crate::pipeline::LinkResolver> =
            Arc::new(crate::scraping::resolver::SocialResolver::new(config.clone()));
        let dispatch = crate::webhook::sink_from_config(http_client.clone(), &config);

        Self {
            http_client,
            config,
            dataset: std::sync::RwLock::new(Arc::new(DatasetSnapshot::default())),
            pass_lock: tokio::sync::Mutex::new(()),
            entry_source,
            link_resolver,
            dispatch,
        }
    }

    pub fn with_entry_source(mut self, source: Arc<dyn crate::pipeline::EntrySource>) -> Self {
        self.entry_source = source;
        self
    }

    pub fn with_link_resolver(mut self, resolver: Arc<dyn crate::pipeline::LinkResolver>) -> Self {
        self.link_resolver = resolver;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Arc<dyn crate::webhook::DispatchSink>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// The current snapshot. Acquires and immediately releases the read
    /// lock — safe to use before `await` points.
    pub fn current(&self) -> Arc<DatasetSnapshot> {
        self.dataset.read().unwrap().clone()
    }

    /// Atomically replace the current snapshot. Only the pipeline runner
    /// calls this, under the pass lock.
    pub fn replace(&self, snapshot: DatasetSnapshot) {
        *self.dataset.write().unwrap() = Arc::new(snapshot);
    }
}
