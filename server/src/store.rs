//! Dual-generation in-memory table store.
//!
//! The store holds two complete copies of every table, one per
//! [`Generation`]. Readers always resolve against the live generation; the
//! updater only ever writes to the other one and flips the live flag once a
//! build is complete. Each generation sits behind its own lock, so a build
//! never takes a lock a reader of the live generation can hold.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use chrono::NaiveDate;
use thiserror::Error;

use grimoire_model::{Generation, Record, RecordKey, TableName};

/// A record could not be loaded into a generation under construction.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("duplicate key {key} in {table}@{generation}")]
    DuplicateKey {
        generation: Generation,
        table: TableName,
        key: RecordKey,
    },

    #[error("record of kind {found} does not belong in table {table}")]
    WrongRecordKind { table: TableName, found: TableName },

    #[error("refusing to load into live generation {0}")]
    LiveGeneration(Generation),
}

/// Invariant violation on the maintenance surface. Always fatal: only the
/// updater calls these paths, and it never legitimately touches the live
/// generation.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("refusing to clear live generation {0}")]
    LiveGeneration(Generation),
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<RecordKey, Record>,
    by_category: HashMap<String, Vec<RecordKey>>,
}

#[derive(Default)]
struct GenerationTables {
    tables: [Table; 6],
}

impl GenerationTables {
    fn table(&self, name: TableName) -> &Table {
        &self.tables[name.index()]
    }

    fn table_mut(&mut self, name: TableName) -> &mut Table {
        &mut self.tables[name.index()]
    }

    fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

/// Both generations plus the live flag, constructed once at startup and
/// shared by the updater and the read path.
pub struct Store {
    live: AtomicU8,
    slots: [RwLock<GenerationTables>; 2],
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            live: AtomicU8::new(Generation::A.index() as u8),
            slots: [
                RwLock::new(GenerationTables::default()),
                RwLock::new(GenerationTables::default()),
            ],
        }
    }

    pub fn live(&self) -> Generation {
        Generation::from_index(self.live.load(Ordering::SeqCst))
    }

    /// The cutover point. A single atomic write, visible to every reader at
    /// once; reads in flight keep the generation they resolved at entry.
    pub fn swap_to(&self, generation: Generation) {
        self.live.store(generation.index() as u8, Ordering::SeqCst);
    }

    fn slot(&self, generation: Generation) -> RwLockReadGuard<'_, GenerationTables> {
        self.slots[generation.index()]
            .read()
            .expect("store lock poisoned")
    }

    /// Point lookup against the live generation.
    pub fn get(&self, table: TableName, key: RecordKey) -> Option<Record> {
        self.slot(self.live()).table(table).rows.get(&key).cloned()
    }

    /// Ordered window over a table of the live generation, with the total
    /// row count for pagination.
    pub fn list(&self, table: TableName, offset: usize, limit: usize) -> (Vec<Record>, usize) {
        let slot = self.slot(self.live());
        let rows = &slot.table(table).rows;
        let page = rows.values().skip(offset).take(limit).cloned().collect();
        (page, rows.len())
    }

    /// Secondary-index scan against the live generation.
    pub fn by_category(&self, table: TableName, category: &str) -> Vec<Record> {
        let slot = self.slot(self.live());
        let table = slot.table(table);
        let Some(keys) = table.by_category.get(category) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|key| table.rows.get(key).cloned())
            .collect()
    }

    /// Date-range scan over the almanax table of the live generation,
    /// inclusive on both ends.
    pub fn almanax_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<Record> {
        self.slot(self.live())
            .table(TableName::Almanax)
            .rows
            .range(RecordKey::Date(from)..=RecordKey::Date(to))
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn row_count(&self, generation: Generation) -> usize {
        self.slot(generation).row_count()
    }

    /// Bulk-load records into a table of the generation under construction.
    /// On error the table may hold a partial load; the updater clears it.
    pub fn load_into(
        &self,
        generation: Generation,
        table: TableName,
        records: Vec<Record>,
    ) -> Result<usize, BuildError> {
        if generation == self.live() {
            return Err(BuildError::LiveGeneration(generation));
        }

        let mut slot = self.slots[generation.index()]
            .write()
            .expect("store lock poisoned");
        let target = slot.table_mut(table);

        let loaded = records.len();
        for record in records {
            if record.table() != table {
                return Err(BuildError::WrongRecordKind {
                    table,
                    found: record.table(),
                });
            }

            let key = record.key();
            if let Some(category) = record.category() {
                target
                    .by_category
                    .entry(category.to_owned())
                    .or_default()
                    .push(key);
            }
            if target.rows.insert(key, record).is_some() {
                return Err(BuildError::DuplicateKey {
                    generation,
                    table,
                    key,
                });
            }
        }

        Ok(loaded)
    }

    /// Drop every row of a table in a non-live generation. Returns the
    /// number of rows removed.
    pub fn clear(&self, generation: Generation, table: TableName) -> Result<usize, StoreError> {
        if generation == self.live() {
            return Err(StoreError::LiveGeneration(generation));
        }

        let mut slot = self.slots[generation.index()]
            .write()
            .expect("store lock poisoned");
        let removed = slot.table(table).rows.len();
        *slot.table_mut(table) = Table::default();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_model::{AlmanaxDay, Item, LocalizedText};

    fn item(id: i64, name: &str, category: &str) -> Record {
        Record::Item(Item {
            ankama_id: id,
            name: LocalizedText::uniform(name),
            description: LocalizedText::default(),
            category: category.to_owned(),
            level: 10,
        })
    }

    fn almanax(date: &str) -> Record {
        Record::Almanax(AlmanaxDay {
            date: date.parse().unwrap(),
            bonus_type: "xp".to_owned(),
            description: LocalizedText::default(),
            tribute_item_id: 1,
            tribute_item_name: LocalizedText::default(),
            tribute_quantity: 1,
            reward_kamas: 100,
            xp_ratio: 1.0,
            optimal_level: 50,
            duration: 1.0,
        })
    }

    fn item_name(record: &Record) -> &str {
        match record {
            Record::Item(item) => &item.name.en,
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn reads_resolve_against_the_live_generation_only() {
        let store = Store::new();
        let building = store.live().other();

        store
            .load_into(building, TableName::Items, vec![item(42, "Sword", "weapons")])
            .unwrap();

        // nothing visible until the swap
        assert_eq!(store.get(TableName::Items, RecordKey::Id(42)), None);
        assert!(store.by_category(TableName::Items, "weapons").is_empty());

        store.swap_to(building);
        let record = store.get(TableName::Items, RecordKey::Id(42)).unwrap();
        assert_eq!(item_name(&record), "Sword");
        assert_eq!(store.by_category(TableName::Items, "weapons").len(), 1);
    }

    #[test]
    fn refresh_replaces_dataset_after_swap() {
        let store = Store::new();

        let first = store.live().other();
        store
            .load_into(first, TableName::Items, vec![item(42, "Sword", "weapons")])
            .unwrap();
        store.swap_to(first);

        let second = store.live().other();
        store
            .load_into(second, TableName::Items, vec![item(42, "Sword+1", "weapons")])
            .unwrap();
        store.swap_to(second);
        store.clear(first, TableName::Items).unwrap();

        let record = store.get(TableName::Items, RecordKey::Id(42)).unwrap();
        assert_eq!(item_name(&record), "Sword+1");
        assert_eq!(store.row_count(first), 0);
    }

    #[test]
    fn duplicate_primary_keys_are_rejected() {
        let store = Store::new();
        let building = store.live().other();

        let err = store
            .load_into(
                building,
                TableName::Items,
                vec![item(1, "Sword", "weapons"), item(1, "Copy", "weapons")],
            )
            .unwrap_err();

        assert!(matches!(err, BuildError::DuplicateKey { key: RecordKey::Id(1), .. }));
    }

    #[test]
    fn records_of_the_wrong_kind_are_rejected() {
        let store = Store::new();
        let building = store.live().other();

        let err = store
            .load_into(building, TableName::Sets, vec![item(1, "Sword", "weapons")])
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::WrongRecordKind {
                table: TableName::Sets,
                found: TableName::Items,
            }
        );
    }

    #[test]
    fn writes_to_the_live_generation_are_refused() {
        let store = Store::new();
        let live = store.live();

        assert_eq!(
            store.load_into(live, TableName::Items, vec![]),
            Err(BuildError::LiveGeneration(live))
        );
        assert_eq!(
            store.clear(live, TableName::Items),
            Err(StoreError::LiveGeneration(live))
        );
    }

    #[test]
    fn partial_load_is_fully_cleared() {
        let store = Store::new();
        let building = store.live().other();

        store
            .load_into(
                building,
                TableName::Items,
                vec![item(1, "Sword", "weapons"), item(1, "Copy", "weapons")],
            )
            .unwrap_err();
        assert!(store.row_count(building) > 0);

        store.clear(building, TableName::Items).unwrap();
        assert_eq!(store.row_count(building), 0);
    }

    #[test]
    fn almanax_range_is_inclusive_and_ordered() {
        let store = Store::new();
        let building = store.live().other();

        store
            .load_into(
                building,
                TableName::Almanax,
                vec![
                    almanax("2024-03-03"),
                    almanax("2024-03-01"),
                    almanax("2024-03-02"),
                    almanax("2024-03-05"),
                ],
            )
            .unwrap();
        store.swap_to(building);

        let range = store.almanax_range(
            "2024-03-01".parse().unwrap(),
            "2024-03-03".parse().unwrap(),
        );
        let dates: Vec<RecordKey> = range.iter().map(Record::key).collect();
        assert_eq!(
            dates,
            vec![
                RecordKey::Date("2024-03-01".parse().unwrap()),
                RecordKey::Date("2024-03-02".parse().unwrap()),
                RecordKey::Date("2024-03-03".parse().unwrap()),
            ]
        );
    }

    #[test]
    fn list_pages_in_key_order() {
        let store = Store::new();
        let building = store.live().other();

        let records = (1..=5).map(|id| item(id, "x", "weapons")).collect();
        store.load_into(building, TableName::Items, records).unwrap();
        store.swap_to(building);

        let (page, total) = store.list(TableName::Items, 2, 2);
        assert_eq!(total, 5);
        assert_eq!(
            page.iter().map(Record::key).collect::<Vec<_>>(),
            vec![RecordKey::Id(3), RecordKey::Id(4)]
        );
    }

    #[test]
    fn building_the_idle_generation_never_disturbs_readers() {
        let store = Store::new();
        let first = store.live().other();
        store
            .load_into(first, TableName::Items, vec![item(42, "Sword", "weapons")])
            .unwrap();
        store.swap_to(first);

        let before = store.get(TableName::Items, RecordKey::Id(42));

        // a build of the other generation in progress
        let building = store.live().other();
        store
            .load_into(building, TableName::Items, vec![item(42, "Sword+1", "weapons")])
            .unwrap();

        assert_eq!(store.get(TableName::Items, RecordKey::Id(42)), before);
    }

    #[test]
    fn concurrent_readers_see_one_generation_per_read() {
        let store = Store::new();

        let old = store.live().other();
        let rows = (1..=64).map(|id| item(id, "old", "weapons")).collect();
        store.load_into(old, TableName::Items, rows).unwrap();
        store.swap_to(old);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let (page, total) = store.list(TableName::Items, 0, 64);
                        assert_eq!(total, 64);
                        let first = item_name(&page[0]).to_owned();
                        // every row of a single read comes from one dataset
                        for record in &page {
                            assert_eq!(item_name(record), first);
                        }
                    }
                });
            }

            let new = store.live().other();
            let rows = (1..=64).map(|id| item(id, "new", "weapons")).collect();
            store.load_into(new, TableName::Items, rows).unwrap();
            store.swap_to(new);
        });

        let record = store.get(TableName::Items, RecordKey::Id(1)).unwrap();
        assert_eq!(item_name(&record), "new");
    }
}
