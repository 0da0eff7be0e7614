//! Shared fixtures for store tests.

#![allow(dead_code)]

use tvg_model::{FieldDef, FieldMap, SchemaRegistry, Staging, TableSchema};
use tvg_store::StagingStore;

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new([
        TableSchema::new(
            "voters",
            vec![
                FieldDef::number("id"),
                FieldDef::text("name"),
                FieldDef::text("district"),
            ],
            vec!["id".into()],
        )
        .unwrap(),
        TableSchema::new(
            "reps",
            vec![
                FieldDef::number("id"),
                FieldDef::text("name"),
                FieldDef::bool("active"),
            ],
            vec!["id".into()],
        )
        .unwrap(),
    ])
    .unwrap()
}

/// In-memory store with `voters` and `reps` seeded.
pub fn seeded_store() -> StagingStore {
    let store = StagingStore::open_in_memory().unwrap();
    store
        .execute_batch(
            "
            CREATE TABLE voters (id INTEGER PRIMARY KEY, name TEXT, district TEXT);
            CREATE TABLE reps (id INTEGER PRIMARY KEY, name TEXT, active INTEGER);

            INSERT INTO voters (id, name, district) VALUES (1, 'Chen', 'A');
            INSERT INTO voters (id, name, district) VALUES (2, 'Lin', 'B');
            INSERT INTO voters (id, name, district) VALUES (3, 'Wang', 'B');

            INSERT INTO reps (id, name, active) VALUES (5, 'Huang', 1);
            ",
        )
        .unwrap();
    store
}

pub fn voter(search_by: FieldMap, fields: FieldMap) -> Staging {
    Staging::new("voters", search_by, fields)
}
