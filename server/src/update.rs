//! Background catalog refresh.
//!
//! One orchestrator owns the whole cycle: fetch the upstream snapshot, build
//! the inactive generation (tables and search indexes), flip the live flag,
//! then reclaim the generation that just went stale. Triggers funnel through
//! a single-slot channel, so bursts coalesce and at most one cycle is ever
//! in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use grimoire_ingest::{FetchError, Pipeline};
use grimoire_model::{EntityKind, Generation, Language, Snapshot, TableName};

use crate::search::{SearchError, SearchIndexStore};
use crate::store::{BuildError, Store, StoreError};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("build: {0}")]
    Build(#[from] BuildError),

    #[error("index build for {uid}: {source}")]
    SearchBuild {
        uid: String,
        #[source]
        source: SearchError,
    },

    #[error("store invariant violated: {0}")]
    Store(#[from] StoreError),

    #[error("cleanup of stale generation {generation}: {source}")]
    Cleanup {
        generation: Generation,
        #[source]
        source: SearchError,
    },
}

impl UpdateError {
    /// Fetch and build failures abort the cycle and leave the live
    /// generation serving. Anything touching an already-swapped state is
    /// unrecoverable in place; a restart re-ingests into a clean slate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpdateError::Store(_) | UpdateError::Cleanup { .. })
    }
}

/// Handle for requesting a refresh. Safe to call from anywhere, any number
/// of times: the slot holds at most one pending request.
#[derive(Clone)]
pub struct UpdateTrigger {
    tx: mpsc::Sender<()>,
}

impl UpdateTrigger {
    /// Returns false if a refresh was already pending (the request
    /// coalesced into it).
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

pub fn trigger_channel() -> (UpdateTrigger, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (UpdateTrigger { tx }, rx)
}

/// The single writer. Consumes triggers strictly serially and drives one
/// fetch-build-swap-cleanup cycle per trigger.
pub struct UpdateOrchestrator {
    store: Arc<Store>,
    search: Arc<SearchIndexStore>,
    pipeline: Arc<dyn Pipeline>,
    triggers: mpsc::Receiver<()>,
    /// False until a cycle has superseded a built generation; the very
    /// first swap leaves behind an empty slot with nothing to reclaim.
    primed: bool,
}

impl UpdateOrchestrator {
    pub fn new(
        store: Arc<Store>,
        search: Arc<SearchIndexStore>,
        pipeline: Arc<dyn Pipeline>,
        triggers: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            store,
            search,
            pipeline,
            triggers,
            primed: false,
        }
    }

    /// Initial load at startup. Unlike a steady-state cycle there is no
    /// previous generation to keep serving, so any failure is fatal.
    pub async fn bootstrap(&mut self) -> Result<(), UpdateError> {
        self.run_cycle().await
    }

    /// Trigger loop. Cancellation is only observed between cycles: a cycle
    /// that has already swapped always gets to finish its cleanup.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), UpdateError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("update loop stopped");
                    return Ok(());
                }
                received = self.triggers.recv() => {
                    if received.is_none() {
                        return Ok(());
                    }
                    match self.run_cycle().await {
                        Ok(()) => {}
                        Err(err) if err.is_fatal() => {
                            error!("unrecoverable update failure: {err}");
                            return Err(err);
                        }
                        Err(err) => warn!("update cycle aborted: {err}"),
                    }
                }
            }
        }
    }

    async fn run_cycle(&mut self) -> Result<(), UpdateError> {
        let started = Instant::now();
        let target = self.store.live().other();
        info!(%target, "starting catalog refresh");

        // Fetching. A failure here has touched nothing.
        let snapshot = self.pipeline.fetch().await?;
        if snapshot.is_empty() {
            // an empty pull is an upstream outage, not a catalog wipe
            return Err(FetchError::Invalid("upstream returned an empty catalog".to_owned()).into());
        }

        // Building the inactive generation.
        if let Err(err) = self.build(target, &snapshot).await {
            self.unwind(target).await?;
            return Err(err);
        }

        // Swapping: the one atomic cutover. Cannot fail.
        let stale = self.store.live();
        self.store.swap_to(target);
        info!(live = %target, "cutover complete");

        // Cleaning up the superseded generation.
        if self.primed {
            self.cleanup(stale).await?;
        } else {
            self.primed = true;
        }

        info!(
            records = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog refresh finished"
        );
        Ok(())
    }

    async fn build(&self, target: Generation, snapshot: &Snapshot) -> Result<(), UpdateError> {
        for table in TableName::ALL {
            let rows = self
                .store
                .load_into(target, table, snapshot.table(table).to_vec())?;
            debug!(%table, %target, rows, "table loaded");
        }

        for entity in EntityKind::ALL {
            for lang in Language::ALL {
                let docs = snapshot.search_docs(entity, lang);
                self.search
                    .build_into(target, entity, lang, &docs)
                    .await
                    .map_err(|source| UpdateError::SearchBuild {
                        uid: SearchIndexStore::index_uid(target, entity, lang),
                        source,
                    })?;
            }
        }

        Ok(())
    }

    /// A failed build must leave the target generation as empty as it
    /// started, so the next cycle does not trip over leftovers. Index
    /// deletions are best effort here: an orphaned index is a leak, not a
    /// correctness hazard.
    async fn unwind(&self, target: Generation) -> Result<(), UpdateError> {
        for table in TableName::ALL {
            self.store.clear(target, table)?;
        }
        for entity in EntityKind::ALL {
            for lang in Language::ALL {
                if let Err(err) = self.search.delete(target, entity, lang).await {
                    debug!("no index to unwind: {err}");
                }
            }
        }
        Ok(())
    }

    async fn cleanup(&self, stale: Generation) -> Result<(), UpdateError> {
        for table in TableName::ALL {
            let removed = self.store.clear(stale, table)?;
            debug!(%table, %stale, removed, "stale table cleared");
        }
        for entity in EntityKind::ALL {
            for lang in Language::ALL {
                self.search
                    .delete(stale, entity, lang)
                    .await
                    .map_err(|source| UpdateError::Cleanup {
                        generation: stale,
                        source,
                    })?;
            }
        }
        info!(%stale, "stale generation reclaimed");
        Ok(())
    }
}

/// Periodic trigger source. The first tick fires immediately and is
/// swallowed, since startup already runs a full load.
pub fn spawn_periodic(
    trigger: UpdateTrigger,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticks.tick() => {
                    if !trigger.request() {
                        debug!("refresh already pending, tick coalesced");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::search::testing::MemorySearch;
    use grimoire_model::{BonusType, Item, LocalizedText, Record, RecordKey};

    struct ScriptedPipeline {
        fetches: Mutex<VecDeque<Result<Snapshot, FetchError>>>,
    }

    impl ScriptedPipeline {
        fn new(fetches: Vec<Result<Snapshot, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                fetches: Mutex::new(fetches.into()),
            })
        }
    }

    #[async_trait]
    impl Pipeline for ScriptedPipeline {
        async fn fetch(&self) -> Result<Snapshot, FetchError> {
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted fetch left")
        }
    }

    fn item(id: i64, name: &str) -> Record {
        Record::Item(Item {
            ankama_id: id,
            name: LocalizedText::uniform(name),
            description: LocalizedText::default(),
            category: "weapons".to_owned(),
            level: 10,
        })
    }

    fn snapshot(items: Vec<Record>) -> Snapshot {
        Snapshot {
            items,
            ..Snapshot::default()
        }
    }

    fn orchestrator(
        fetches: Vec<Result<Snapshot, FetchError>>,
        backend: Arc<MemorySearch>,
    ) -> (UpdateOrchestrator, Arc<Store>, UpdateTrigger) {
        let store = Arc::new(Store::new());
        let search = Arc::new(SearchIndexStore::new(backend));
        let (trigger, triggers) = trigger_channel();
        let orchestrator = UpdateOrchestrator::new(
            store.clone(),
            search,
            ScriptedPipeline::new(fetches),
            triggers,
        );
        (orchestrator, store, trigger)
    }

    fn live_item_name(store: &Store, id: i64) -> Option<String> {
        match store.get(TableName::Items, RecordKey::Id(id)) {
            Some(Record::Item(item)) => Some(item.name.en),
            _ => None,
        }
    }

    #[tokio::test]
    async fn successful_cycle_swaps_and_reclaims_the_stale_generation() {
        let backend = MemorySearch::new();
        let (mut orchestrator, store, _trigger) = orchestrator(
            vec![
                Ok(snapshot(vec![item(42, "Sword")])),
                Ok(snapshot(vec![item(42, "Sword+1")])),
            ],
            backend.clone(),
        );

        orchestrator.bootstrap().await.unwrap();
        assert_eq!(live_item_name(&store, 42).as_deref(), Some("Sword"));

        let first_live = store.live();
        orchestrator.run_cycle().await.unwrap();

        assert_eq!(live_item_name(&store, 42).as_deref(), Some("Sword+1"));
        assert_eq!(store.row_count(first_live), 0);

        // every surviving index belongs to the new live generation
        let prefix = format!("{}-", store.live().prefix());
        let uids = backend.uids();
        assert_eq!(uids.len(), EntityKind::ALL.len() * Language::ALL.len());
        assert!(uids.iter().all(|uid| uid.starts_with(&prefix)));
    }

    #[tokio::test]
    async fn fetch_failure_leaves_the_live_generation_untouched() {
        let backend = MemorySearch::new();
        let (mut orchestrator, store, _trigger) = orchestrator(
            vec![
                Ok(snapshot(vec![item(42, "Sword")])),
                Err(FetchError::Invalid("upstream offline".to_owned())),
            ],
            backend.clone(),
        );

        orchestrator.bootstrap().await.unwrap();
        let before = store.get(TableName::Items, RecordKey::Id(42));
        let uids_before = backend.uids();

        let err = orchestrator.run_cycle().await.unwrap_err();
        assert!(matches!(err, UpdateError::Fetch(_)));
        assert!(!err.is_fatal());

        assert_eq!(store.get(TableName::Items, RecordKey::Id(42)), before);
        assert_eq!(store.row_count(store.live().other()), 0);
        assert_eq!(backend.uids(), uids_before);
    }

    #[tokio::test]
    async fn empty_snapshot_aborts_the_cycle() {
        let backend = MemorySearch::new();
        let (mut orchestrator, store, _trigger) = orchestrator(
            vec![
                Ok(snapshot(vec![item(42, "Sword")])),
                Ok(Snapshot::default()),
            ],
            backend.clone(),
        );

        orchestrator.bootstrap().await.unwrap();
        let live = store.live();

        let err = orchestrator.run_cycle().await.unwrap_err();
        assert!(matches!(err, UpdateError::Fetch(FetchError::Invalid(_))));
        assert!(!err.is_fatal());

        assert_eq!(store.live(), live);
        assert_eq!(live_item_name(&store, 42).as_deref(), Some("Sword"));
    }

    #[tokio::test]
    async fn bonus_catalog_is_loaded_and_indexed() {
        let backend = MemorySearch::new();
        let bonus = Record::Bonus(BonusType {
            id: 5,
            slug: "experience".to_owned(),
            name: LocalizedText::uniform("Experience"),
        });
        let (mut orchestrator, store, _trigger) = orchestrator(
            vec![Ok(Snapshot {
                bonuses: vec![bonus],
                ..Snapshot::default()
            })],
            backend.clone(),
        );

        orchestrator.bootstrap().await.unwrap();

        assert!(store.get(TableName::Bonuses, RecordKey::Id(5)).is_some());
        let uid = SearchIndexStore::index_uid(store.live(), EntityKind::Bonuses, Language::En);
        assert!(backend.uids().contains(&uid));
    }

    #[tokio::test]
    async fn build_failure_unwinds_the_partial_generation() {
        let backend = MemorySearch::new();
        let (mut orchestrator, store, _trigger) = orchestrator(
            vec![
                Ok(snapshot(vec![item(42, "Sword")])),
                // duplicate primary key poisons the build
                Ok(snapshot(vec![item(7, "Axe"), item(7, "Axe Copy")])),
            ],
            backend.clone(),
        );

        orchestrator.bootstrap().await.unwrap();
        let live = store.live();

        let err = orchestrator.run_cycle().await.unwrap_err();
        assert!(matches!(err, UpdateError::Build(BuildError::DuplicateKey { .. })));
        assert!(!err.is_fatal());

        assert_eq!(store.live(), live);
        assert_eq!(live_item_name(&store, 42).as_deref(), Some("Sword"));
        assert_eq!(store.row_count(live.other()), 0);

        let prefix = format!("{}-", live.prefix());
        assert!(backend.uids().iter().all(|uid| uid.starts_with(&prefix)));
    }

    #[tokio::test]
    async fn cleanup_failure_is_fatal() {
        let backend = MemorySearch::new();
        let (mut orchestrator, _store, _trigger) = orchestrator(
            vec![
                Ok(snapshot(vec![item(1, "Sword")])),
                Ok(snapshot(vec![item(1, "Sword")])),
            ],
            backend.clone(),
        );

        orchestrator.bootstrap().await.unwrap();
        backend.fail_deletes();

        let err = orchestrator.run_cycle().await.unwrap_err();
        assert!(matches!(err, UpdateError::Cleanup { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn trigger_bursts_coalesce_into_one_pending_request() {
        let (trigger, mut triggers) = trigger_channel();

        assert!(trigger.request());
        assert!(!trigger.request());
        assert!(!trigger.request());

        triggers.recv().await.unwrap();
        // slot is free again: exactly one more cycle will run
        assert!(trigger.request());
        triggers.recv().await.unwrap();
        assert!(triggers.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_loop_exits_cleanly_on_cancellation() {
        let backend = MemorySearch::new();
        let (orchestrator, _store, _trigger) = orchestrator(vec![], backend);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(orchestrator.run(cancel.clone()));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
