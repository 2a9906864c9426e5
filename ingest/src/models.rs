//! Wire shapes of the upstream catalog dumps.

use serde::Deserialize;

use grimoire_model::LocalizedText;

#[derive(Deserialize)]
pub struct RawLocalized {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub fr: String,
    #[serde(default)]
    pub es: String,
    #[serde(default)]
    pub de: String,
    #[serde(default)]
    pub pt: String,
}

impl From<RawLocalized> for LocalizedText {
    fn from(raw: RawLocalized) -> Self {
        LocalizedText {
            en: raw.en,
            fr: raw.fr,
            es: raw.es,
            de: raw.de,
            pt: raw.pt,
        }
    }
}

#[derive(Deserialize)]
pub struct RawItem {
    pub ankama_id: i64,
    pub name: RawLocalized,
    #[serde(default)]
    pub description: Option<RawLocalized>,
    pub category: String,
    #[serde(default)]
    pub level: i32,
}

#[derive(Deserialize)]
pub struct RawSet {
    pub ankama_id: i64,
    pub name: RawLocalized,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub item_ids: Vec<i64>,
}

#[derive(Deserialize)]
pub struct RawMount {
    pub ankama_id: i64,
    pub name: RawLocalized,
    pub family: String,
}

#[derive(Deserialize)]
pub struct RawIngredient {
    pub item_id: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct RawRecipe {
    pub result_id: i64,
    pub ingredients: Vec<RawIngredient>,
}

#[derive(Deserialize)]
pub struct RawBonusType {
    pub id: i64,
    pub slug: String,
    pub name: RawLocalized,
}

#[derive(Deserialize)]
pub struct RawTribute {
    pub item_ankama_id: i64,
    pub item_name: RawLocalized,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct RawAlmanax {
    pub date: String,
    pub bonus_type: String,
    pub description: RawLocalized,
    pub tribute: RawTribute,
    #[serde(default)]
    pub reward_kamas: i64,
    #[serde(default = "default_ratio")]
    pub xp_ratio: f64,
    #[serde(default)]
    pub optimal_level: i32,
    #[serde(default = "default_ratio")]
    pub duration: f64,
}

fn default_ratio() -> f64 {
    1.0
}
