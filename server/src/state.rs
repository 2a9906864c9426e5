use std::sync::Arc;

use grimoire_ingest::Upstream;

use crate::config::Config;
use crate::search::{Meili, SearchError, SearchIndexStore};
use crate::store::Store;
use crate::update::{trigger_channel, UpdateOrchestrator, UpdateTrigger};

pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub search: Arc<SearchIndexStore>,
    pub trigger: UpdateTrigger,
}

impl AppState {
    /// Wires the store, the search client, and the ingestion pipeline
    /// together. The orchestrator is handed back separately so the caller
    /// can run the initial load before accepting traffic.
    pub fn new(config: Config) -> Result<(Arc<Self>, UpdateOrchestrator), SearchError> {
        let store = Arc::new(Store::new());
        let meili = Meili::new(&config.meili_url, config.meili_key.as_deref())?;
        let search = Arc::new(SearchIndexStore::new(Arc::new(meili)));
        let pipeline = Arc::new(Upstream::new(config.upstream_url.clone()));
        let (trigger, triggers) = trigger_channel();

        let orchestrator =
            UpdateOrchestrator::new(store.clone(), search.clone(), pipeline, triggers);

        let state = Arc::new(Self {
            config,
            store,
            search,
            trigger,
        });

        Ok((state, orchestrator))
    }
}
