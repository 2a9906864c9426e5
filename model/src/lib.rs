//! Shared catalog definitions.
//!
//! Everything that crosses a crate boundary lives here: the generation tag,
//! table and entity naming, supported languages, and the typed records the
//! ingestion pipeline produces and the store serves.

use std::fmt;

pub mod record;

pub use record::{
    AlmanaxDay, BonusType, Ingredient, Item, LocalizedText, Mount, Record, RecordKey, Recipe,
    SearchDoc, Set, Snapshot,
};

/// One complete, independently addressable copy of the dataset.
///
/// Exactly one generation is live at any instant. The other one is either
/// idle or being rebuilt by the updater.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Generation {
    A,
    B,
}

impl Generation {
    pub const fn other(self) -> Self {
        match self {
            Generation::A => Generation::B,
            Generation::B => Generation::A,
        }
    }

    /// Stable lowercase prefix baked into search index uids.
    pub const fn prefix(self) -> &'static str {
        match self {
            Generation::A => "a",
            Generation::B => "b",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Generation::A => 0,
            Generation::B => 1,
        }
    }

    pub const fn from_index(index: u8) -> Self {
        match index {
            0 => Generation::A,
            _ => Generation::B,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Languages the catalog is localized into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Fr,
    Es,
    De,
    Pt,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::En,
        Language::Fr,
        Language::Es,
        Language::De,
        Language::Pt,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::De => "de",
            Language::Pt => "pt",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            "es" => Some(Language::Es),
            "de" => Some(Language::De),
            "pt" => Some(Language::Pt),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Entity types that get a full-text search index per language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Items,
    Sets,
    Mounts,
    Bonuses,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Items,
        EntityKind::Sets,
        EntityKind::Mounts,
        EntityKind::Bonuses,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Items => "items",
            EntityKind::Sets => "sets",
            EntityKind::Mounts => "mounts",
            EntityKind::Bonuses => "bonuses",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tables the store holds. The schema is fixed at process start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableName {
    Items,
    Sets,
    Mounts,
    Recipes,
    Almanax,
    Bonuses,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::Items,
        TableName::Sets,
        TableName::Mounts,
        TableName::Recipes,
        TableName::Almanax,
        TableName::Bonuses,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TableName::Items => "items",
            TableName::Sets => "sets",
            TableName::Mounts => "mounts",
            TableName::Recipes => "recipes",
            TableName::Almanax => "almanax",
            TableName::Bonuses => "bonuses",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            TableName::Items => 0,
            TableName::Sets => 1,
            TableName::Mounts => 2,
            TableName::Recipes => 3,
            TableName::Almanax => 4,
            TableName::Bonuses => 5,
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
