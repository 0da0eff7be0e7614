//! SQLite staging store for the voting guide backend.
//!
//! Staged records wait in the `staging_data` table until a reviewer submits
//! them. Submitting a batch validates every record against the
//! [`SchemaRegistry`](tvg_model::SchemaRegistry), runs each record's compiled
//! search against its target table in the same database, and classifies the
//! record as create / update / conflict through a
//! [`Reconciler`](tvg_model::Reconciler).
//!
//! # Architecture
//!
//! - Batches are stored as JSON text alongside RFC 3339 timestamps
//! - Compiled `$N` queries are bound positionally; integral numbers bind as INTEGER
//! - Row values are decoded through the column kinds declared in the registry
//! - Access to the connection is serialized by a mutex

mod error;
mod sql;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{StagingData, StagingStore};
