//! Persistent store for staged records awaiting review.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use tvg_model::{
    CompiledQuery, FieldMap, QueryCompiler, Reconciler, SchemaRegistry, SchemaValidator, Staging,
    StagingRequest, StagingResult,
};

use crate::error::{StoreError, StoreResult};
use crate::sql;

/// One row of `staging_data`: a batch of staged records submitted together.
///
/// `records` is kept as raw JSON until the batch is submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingData {
    pub id: i64,
    pub records: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StagingData {
    /// Decodes `records` into staging records.
    pub fn staging_records(&self) -> StoreResult<Vec<Staging>> {
        Ok(serde_json::from_value(self.records.clone())?)
    }

    /// Decodes `records` into raw requests, leaving value checks to the
    /// caller.
    pub fn requests(&self) -> StoreResult<Vec<StagingRequest>> {
        Ok(serde_json::from_value(self.records.clone())?)
    }
}

/// Staging store backed by SQLite.
///
/// The target tables named by the schema registry live in the same
/// database; submitting a batch reads them to classify each record.
pub struct StagingStore {
    conn: Arc<Mutex<Connection>>,
}

impl StagingStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating the staging table if needed.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS staging_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                records TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Runs raw SQL against the underlying database. Used to prepare target
    /// tables.
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    /// Stages a batch of records and returns its id.
    ///
    /// Records whose values would not survive the JSON round trip are
    /// refused, so every stored batch can be decoded again at submit.
    pub fn insert(&self, records: &[Staging]) -> StoreResult<i64> {
        for (index, staging) in records.iter().enumerate() {
            staging
                .check_values()
                .map_err(|source| StoreError::Validation { index, source })?;
        }

        let json = serde_json::to_string(records)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO staging_data (records, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![json, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, records = records.len(), "Staged records");
        Ok(id)
    }

    /// Lists staged batches, newest first.
    pub fn list(&self, offset: usize, limit: usize) -> StoreResult<Vec<StagingData>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, records, created_at, updated_at
             FROM staging_data
             ORDER BY id DESC
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, records, created_at, updated_at) = row?;
            result.push(decode_row(id, &records, &created_at, &updated_at)?);
        }
        Ok(result)
    }

    pub fn get(&self, id: i64) -> StoreResult<StagingData> {
        let conn = self.conn()?;
        load_row(&conn, id)
    }

    /// Returns the total number of staged batches.
    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM staging_data", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Removes a staged batch and returns the reconciliation of each of its
    /// records, in order.
    ///
    /// Every record is decoded against the registry first; if any is
    /// invalid nothing is removed and the error names its index. Reconciled
    /// records are not written to their target tables.
    pub fn submit(
        &self,
        id: i64,
        registry: &SchemaRegistry,
        reconciler: &dyn Reconciler,
    ) -> StoreResult<Vec<StagingResult>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let data = load_row(&tx, id)?;

        let validator = SchemaValidator::new(registry);
        let records = data
            .requests()?
            .into_iter()
            .enumerate()
            .map(|(index, req)| {
                validator
                    .decode(req)
                    .map_err(|source| StoreError::Validation { index, source })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let compiler = QueryCompiler::new(registry);
        let mut results = Vec::with_capacity(records.len());
        for staging in &records {
            let matches = find_matches(&tx, &compiler, staging)?;
            let result = reconciler.reconcile(staging, &matches);
            debug!(
                table = %staging.table,
                matches = matches.len(),
                status = ?result.status,
                "Reconciled staging record"
            );
            results.push(result);
        }

        tx.execute("DELETE FROM staging_data WHERE id = ?1", params![id])?;
        tx.commit()?;

        info!(id, records = results.len(), "Submitted staging data");
        Ok(results)
    }

    /// Runs a compiled query and returns one map per row, keyed by the
    /// projected columns.
    pub fn find(&self, query: &CompiledQuery) -> StoreResult<Vec<FieldMap>> {
        let conn = self.conn()?;
        sql::query_rows(&conn, query)
    }
}

fn load_row(conn: &Connection, id: i64) -> StoreResult<StagingData> {
    let row = conn
        .query_row(
            "SELECT records, created_at, updated_at FROM staging_data WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let (records, created_at, updated_at) = row.ok_or(StoreError::NotFound(id))?;
    decode_row(id, &records, &created_at, &updated_at)
}

fn decode_row(id: i64, records: &str, created_at: &str, updated_at: &str) -> StoreResult<StagingData> {
    Ok(StagingData {
        id,
        records: serde_json::from_str(records)?,
        created_at: parse_timestamp(created_at)?,
        updated_at: parse_timestamp(updated_at)?,
    })
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp {raw:?}: {e}")))
}

/// Finds the rows matched by a record's search, each restricted to the
/// record's scalar fields.
fn find_matches(
    conn: &Connection,
    compiler: &QueryCompiler<'_>,
    staging: &Staging,
) -> StoreResult<Vec<FieldMap>> {
    let keys = sql::query_rows(conn, &compiler.compile_staging(staging)?)?;

    let columns: Vec<&str> = staging
        .fields
        .iter()
        .filter(|(_, v)| v.is_scalar())
        .map(|(k, _)| k.as_str())
        .collect();
    if columns.is_empty() {
        return Ok(keys.iter().map(|_| FieldMap::new()).collect());
    }

    let mut matches = Vec::with_capacity(keys.len());
    for key in &keys {
        if key.is_empty() {
            matches.push(FieldMap::new());
            continue;
        }
        let query = compiler.compile_projection(&staging.table, &columns, key)?;
        // The key was just read from this table, so the row is still there.
        matches.extend(sql::query_rows(conn, &query)?.into_iter().next());
    }
    Ok(matches)
}
