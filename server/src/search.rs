//! Dual-generation search indexes.
//!
//! One index exists per (generation, entity, language) triple; the
//! generation prefix baked into the uid is what makes cutover safe: readers
//! pick the uid from the live flag, so no index is ever mutated while being
//! queried. Every index mutation is awaited on the backend's own task
//! completion before the updater moves on.

use std::sync::Arc;

use async_trait::async_trait;
use meilisearch_sdk::client::Client;
use meilisearch_sdk::settings::{MinWordSizeForTypos, Settings, TypoToleranceSettings};
use thiserror::Error;
use tracing::debug;

use grimoire_model::{EntityKind, Generation, Language, SearchDoc};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend: {0}")]
    Backend(String),

    #[error("search task failed for index {0}")]
    TaskFailed(String),

    #[error("index {0} not found")]
    IndexNotFound(String),
}

impl From<meilisearch_sdk::errors::Error> for SearchError {
    fn from(err: meilisearch_sdk::errors::Error) -> Self {
        SearchError::Backend(err.to_string())
    }
}

/// The backing full-text engine. Index builds and deletions are asynchronous
/// on the backend, so implementations must wait for task completion before
/// returning.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn create_index(&self, uid: &str, docs: &[SearchDoc]) -> Result<(), SearchError>;
    async fn delete_index(&self, uid: &str) -> Result<(), SearchError>;
    async fn query(&self, uid: &str, text: &str, limit: usize)
        -> Result<Vec<SearchDoc>, SearchError>;
}

/// Meilisearch-backed implementation.
pub struct Meili {
    client: Client,
}

impl Meili {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(url, api_key)?,
        })
    }

    fn settings() -> Settings {
        Settings::new()
            .with_ranking_rules(["words", "typo", "proximity", "exactness", "attribute"])
            .with_searchable_attributes(["name"])
            .with_typo_tolerance(TypoToleranceSettings {
                enabled: Some(true),
                disable_on_attributes: None,
                disable_on_words: None,
                min_word_size_for_typos: Some(MinWordSizeForTypos {
                    one_typo: Some(5),
                    two_typos: Some(9),
                }),
            })
    }
}

#[async_trait]
impl SearchService for Meili {
    async fn create_index(&self, uid: &str, docs: &[SearchDoc]) -> Result<(), SearchError> {
        let task = self
            .client
            .create_index(uid, Some("id"))
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        if task.is_failure() {
            return Err(SearchError::TaskFailed(uid.to_owned()));
        }

        let index = self.client.index(uid);

        let task = index
            .set_settings(&Self::settings())
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        if task.is_failure() {
            return Err(SearchError::TaskFailed(uid.to_owned()));
        }

        let task = index
            .add_or_update(docs, Some("id"))
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        if task.is_failure() {
            return Err(SearchError::TaskFailed(uid.to_owned()));
        }

        Ok(())
    }

    async fn delete_index(&self, uid: &str) -> Result<(), SearchError> {
        let task = self
            .client
            .delete_index(uid)
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        if task.is_failure() {
            return Err(SearchError::TaskFailed(uid.to_owned()));
        }
        Ok(())
    }

    async fn query(
        &self,
        uid: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<SearchDoc>, SearchError> {
        let results = self
            .client
            .index(uid)
            .search()
            .with_query(text)
            .with_limit(limit)
            .execute::<SearchDoc>()
            .await?;
        Ok(results.hits.into_iter().map(|hit| hit.result).collect())
    }
}

/// Generation-aware wrapper the updater and the read path share.
pub struct SearchIndexStore {
    service: Arc<dyn SearchService>,
}

impl SearchIndexStore {
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self { service }
    }

    pub fn index_uid(generation: Generation, entity: EntityKind, lang: Language) -> String {
        format!("{}-{}-{}", generation.prefix(), entity, lang)
    }

    /// Create and populate the index for one (entity, language) pair of a
    /// generation under construction.
    pub async fn build_into(
        &self,
        generation: Generation,
        entity: EntityKind,
        lang: Language,
        docs: &[SearchDoc],
    ) -> Result<(), SearchError> {
        let uid = Self::index_uid(generation, entity, lang);
        self.service.create_index(&uid, docs).await?;
        debug!(%uid, docs = docs.len(), "search index built");
        Ok(())
    }

    /// Delete a stale generation's index, awaiting the backend task.
    pub async fn delete(
        &self,
        generation: Generation,
        entity: EntityKind,
        lang: Language,
    ) -> Result<(), SearchError> {
        let uid = Self::index_uid(generation, entity, lang);
        self.service.delete_index(&uid).await
    }

    /// Free-text query against one live index.
    pub async fn search(
        &self,
        generation: Generation,
        entity: EntityKind,
        lang: Language,
        text: &str,
        limit: usize,
    ) -> Result<Vec<SearchDoc>, SearchError> {
        let uid = Self::index_uid(generation, entity, lang);
        self.service.query(&uid, text, limit).await
    }
}
