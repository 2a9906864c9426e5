//! Upstream catalog ingestion.
//!
//! Pulls the raw JSON catalog dumps, cleans up game-text markup, and turns
//! them into the typed records the store loads. The updater only depends on
//! the [`Pipeline`] trait, so tests can substitute a canned snapshot.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use grimoire_model::{
    AlmanaxDay, BonusType, Ingredient, Item, Mount, Record, Recipe, Set, Snapshot,
};

pub mod models;
pub mod utils;

use models::{RawAlmanax, RawBonusType, RawItem, RawMount, RawRecipe, RawSet};
use utils::strip_localized;

/// Upstream data unavailable or malformed. The live generation is never
/// affected by one of these; the cycle simply aborts.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed upstream payload: {0}")]
    Invalid(String),
}

/// Produces one complete catalog snapshot per call.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

/// HTTP-backed pipeline reading JSON dumps from a base url.
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
}

impl Upstream {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, FetchError> {
        let url = format!("{}/{file}", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Pipeline for Upstream {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let items: Vec<RawItem> = self.get_json("items.json").await?;
        let sets: Vec<RawSet> = self.get_json("sets.json").await?;
        let mounts: Vec<RawMount> = self.get_json("mounts.json").await?;
        let recipes: Vec<RawRecipe> = self.get_json("recipes.json").await?;
        let almanax: Vec<RawAlmanax> = self.get_json("almanax.json").await?;
        let bonuses: Vec<RawBonusType> = self.get_json("almanax_bonuses.json").await?;

        let snapshot = build_snapshot(items, sets, mounts, recipes, almanax, bonuses)?;
        info!(records = snapshot.len(), "fetched upstream catalog");
        Ok(snapshot)
    }
}

fn build_snapshot(
    items: Vec<RawItem>,
    sets: Vec<RawSet>,
    mounts: Vec<RawMount>,
    recipes: Vec<RawRecipe>,
    almanax: Vec<RawAlmanax>,
    bonuses: Vec<RawBonusType>,
) -> Result<Snapshot, FetchError> {
    Ok(Snapshot {
        items: items.into_iter().map(convert_item).collect(),
        sets: sets.into_iter().map(convert_set).collect(),
        mounts: mounts.into_iter().map(convert_mount).collect(),
        recipes: recipes.into_iter().map(convert_recipe).collect(),
        almanax: almanax
            .into_iter()
            .map(convert_almanax)
            .collect::<Result<_, _>>()?,
        bonuses: bonuses.into_iter().map(convert_bonus).collect(),
    })
}

fn convert_item(raw: RawItem) -> Record {
    Record::Item(Item {
        ankama_id: raw.ankama_id,
        name: raw.name.into(),
        description: strip_localized(raw.description.map(Into::into).unwrap_or_default()),
        category: raw.category,
        level: raw.level,
    })
}

fn convert_set(raw: RawSet) -> Record {
    Record::Set(Set {
        ankama_id: raw.ankama_id,
        name: raw.name.into(),
        level: raw.level,
        item_ids: raw.item_ids,
    })
}

fn convert_mount(raw: RawMount) -> Record {
    Record::Mount(Mount {
        ankama_id: raw.ankama_id,
        name: raw.name.into(),
        family: raw.family,
    })
}

fn convert_recipe(raw: RawRecipe) -> Record {
    Record::Recipe(Recipe {
        result_id: raw.result_id,
        ingredients: raw
            .ingredients
            .into_iter()
            .map(|i| Ingredient {
                item_id: i.item_id,
                quantity: i.quantity,
            })
            .collect(),
    })
}

fn convert_bonus(raw: RawBonusType) -> Record {
    Record::Bonus(BonusType {
        id: raw.id,
        slug: raw.slug,
        name: raw.name.into(),
    })
}

fn convert_almanax(raw: RawAlmanax) -> Result<Record, FetchError> {
    let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d")
        .map_err(|_| FetchError::Invalid(format!("bad almanax date {:?}", raw.date)))?;

    Ok(Record::Almanax(AlmanaxDay {
        date,
        bonus_type: raw.bonus_type,
        description: strip_localized(raw.description.into()),
        tribute_item_id: raw.tribute.item_ankama_id,
        tribute_item_name: raw.tribute.item_name.into(),
        tribute_quantity: raw.tribute.quantity,
        reward_kamas: raw.reward_kamas,
        xp_ratio: raw.xp_ratio,
        optimal_level: raw.optimal_level,
        duration: raw.duration,
    }))
}
