//! Shared fixtures for model tests.

#![allow(dead_code)]

use tvg_model::{FieldDef, SchemaRegistry, TableSchema};

/// `voters {id, name, district}` keyed by `id`, and
/// `reps {id, name, party, active}` keyed by `id`.
pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new([voters(), reps(), terms()]).unwrap()
}

pub fn voters() -> TableSchema {
    TableSchema::new(
        "voters",
        vec![
            FieldDef::number("id"),
            FieldDef::text("name"),
            FieldDef::text("district"),
        ],
        vec!["id".into()],
    )
    .unwrap()
}

pub fn reps() -> TableSchema {
    TableSchema::new(
        "reps",
        vec![
            FieldDef::number("id"),
            FieldDef::text("name"),
            FieldDef::text("party"),
            FieldDef::bool("active"),
            FieldDef::number("voter_id"),
        ],
        vec!["id".into()],
    )
    .unwrap()
}

/// Composite key: `(rep_id, session)`.
pub fn terms() -> TableSchema {
    TableSchema::new(
        "terms",
        vec![
            FieldDef::number("rep_id"),
            FieldDef::number("session"),
            FieldDef::text("role"),
            FieldDef::number("rep"),
        ],
        vec!["rep_id".into(), "session".into()],
    )
    .unwrap()
}
