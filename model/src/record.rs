//! Typed catalog records and the snapshot shape the ingestion pipeline
//! hands to the updater.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{EntityKind, Language, TableName};

/// Per-language text for a single field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub fr: String,
    pub es: String,
    pub de: String,
    pub pt: String,
}

impl LocalizedText {
    pub fn get(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.en,
            Language::Fr => &self.fr,
            Language::Es => &self.es,
            Language::De => &self.de,
            Language::Pt => &self.pt,
        }
    }

    /// Same text in every language. Mostly useful in tests and fixtures.
    pub fn uniform(text: &str) -> Self {
        Self {
            en: text.to_owned(),
            fr: text.to_owned(),
            es: text.to_owned(),
            de: text.to_owned(),
            pt: text.to_owned(),
        }
    }
}

/// Primary key of a record. Catalog entities are keyed by their upstream
/// numeric id, almanax rows by their calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKey {
    Id(i64),
    Date(NaiveDate),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{id}"),
            RecordKey::Date(date) => write!(f, "{date}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub ankama_id: i64,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub category: String,
    pub level: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub ankama_id: i64,
    pub name: LocalizedText,
    pub level: i32,
    pub item_ids: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    pub ankama_id: i64,
    pub name: LocalizedText,
    pub family: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item_id: i64,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub result_id: i64,
    pub ingredients: Vec<Ingredient>,
}

/// One day of the almanax calendar: the bonus in effect and the item
/// tribute the offering asks for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlmanaxDay {
    pub date: NaiveDate,
    pub bonus_type: String,
    pub description: LocalizedText,
    pub tribute_item_id: i64,
    pub tribute_item_name: LocalizedText,
    pub tribute_quantity: u32,
    pub reward_kamas: i64,
    pub xp_ratio: f64,
    pub optimal_level: i32,
    pub duration: f64,
}

/// One almanax bonus kind, e.g. "experience" or "drop". The slug is the
/// stable upstream identifier, the name is what callers display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BonusType {
    pub id: i64,
    pub slug: String,
    pub name: LocalizedText,
}

/// A row of any table, resolved to its concrete shape at load time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Item(Item),
    Set(Set),
    Mount(Mount),
    Recipe(Recipe),
    Almanax(AlmanaxDay),
    Bonus(BonusType),
}

impl Record {
    /// The table this record belongs in.
    pub fn table(&self) -> TableName {
        match self {
            Record::Item(_) => TableName::Items,
            Record::Set(_) => TableName::Sets,
            Record::Mount(_) => TableName::Mounts,
            Record::Recipe(_) => TableName::Recipes,
            Record::Almanax(_) => TableName::Almanax,
            Record::Bonus(_) => TableName::Bonuses,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            Record::Item(item) => RecordKey::Id(item.ankama_id),
            Record::Set(set) => RecordKey::Id(set.ankama_id),
            Record::Mount(mount) => RecordKey::Id(mount.ankama_id),
            Record::Recipe(recipe) => RecordKey::Id(recipe.result_id),
            Record::Almanax(day) => RecordKey::Date(day.date),
            Record::Bonus(bonus) => RecordKey::Id(bonus.id),
        }
    }

    /// Secondary index key, for the tables that carry one.
    pub fn category(&self) -> Option<&str> {
        match self {
            Record::Item(item) => Some(&item.category),
            Record::Mount(mount) => Some(&mount.family),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&LocalizedText> {
        match self {
            Record::Item(item) => Some(&item.name),
            Record::Set(set) => Some(&set.name),
            Record::Mount(mount) => Some(&mount.name),
            Record::Bonus(bonus) => Some(&bonus.name),
            _ => None,
        }
    }
}

/// Document pushed into a search index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchDoc {
    pub id: i64,
    pub name: String,
}

/// One complete catalog pull, ready to be loaded into a generation.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub items: Vec<Record>,
    pub sets: Vec<Record>,
    pub mounts: Vec<Record>,
    pub recipes: Vec<Record>,
    pub almanax: Vec<Record>,
    pub bonuses: Vec<Record>,
}

impl Snapshot {
    pub fn table(&self, table: TableName) -> &[Record] {
        match table {
            TableName::Items => &self.items,
            TableName::Sets => &self.sets,
            TableName::Mounts => &self.mounts,
            TableName::Recipes => &self.recipes,
            TableName::Almanax => &self.almanax,
            TableName::Bonuses => &self.bonuses,
        }
    }

    pub fn len(&self) -> usize {
        TableName::ALL.iter().map(|t| self.table(*t).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search documents for one (entity, language) index.
    pub fn search_docs(&self, entity: EntityKind, lang: Language) -> Vec<SearchDoc> {
        let records = match entity {
            EntityKind::Items => &self.items,
            EntityKind::Sets => &self.sets,
            EntityKind::Mounts => &self.mounts,
            EntityKind::Bonuses => &self.bonuses,
        };

        records
            .iter()
            .filter_map(|record| {
                let RecordKey::Id(id) = record.key() else {
                    return None;
                };
                let name = record.name()?.get(lang);
                Some(SearchDoc {
                    id,
                    name: name.to_owned(),
                })
            })
            .collect()
    }
}
