//! Binding compiled queries to SQLite and decoding their rows.

use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use tvg_model::{ColumnKind, ColumnVar, CompiledQuery, FieldMap, FieldValue};

use crate::error::{StoreError, StoreResult};

/// Largest magnitude below which every integral f64 is exact.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Converts a query argument into an SQLite value.
///
/// Integral numbers bind as INTEGER so they compare equal to integer keys.
pub(crate) fn to_sql(value: &FieldValue) -> StoreResult<SqlValue> {
    match value {
        FieldValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
            Ok(SqlValue::Integer(*n as i64))
        }
        FieldValue::Number(n) => Ok(SqlValue::Real(*n)),
        FieldValue::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        FieldValue::String(s) => Ok(SqlValue::Text(s.clone())),
        FieldValue::Nested(n) => Err(StoreError::InvalidData(format!(
            "nested search {n} cannot be bound as an argument"
        ))),
    }
}

/// Decodes one column according to its declared kind. NULL decodes to
/// `None`.
pub(crate) fn from_sql(raw: ValueRef<'_>, var: &ColumnVar) -> StoreResult<Option<FieldValue>> {
    let mismatch = |found: &str| {
        StoreError::InvalidData(format!(
            "column {} declared {:?} holds {found}",
            var.column, var.kind
        ))
    };

    let value = match (raw, var.kind) {
        (ValueRef::Null, _) => return Ok(None),
        (ValueRef::Integer(i), ColumnKind::Number) => FieldValue::Number(i as f64),
        (ValueRef::Real(f), ColumnKind::Number) => FieldValue::Number(f),
        (ValueRef::Integer(i), ColumnKind::Bool) => FieldValue::Bool(i != 0),
        (ValueRef::Integer(i), ColumnKind::Text) => FieldValue::String(i.to_string()),
        (ValueRef::Real(f), ColumnKind::Text) => FieldValue::String(f.to_string()),
        (ValueRef::Text(bytes), ColumnKind::Text) => FieldValue::String(
            std::str::from_utf8(bytes)
                .map_err(|e| StoreError::InvalidData(format!("column {}: {e}", var.column)))?
                .to_owned(),
        ),
        (ValueRef::Real(_), ColumnKind::Bool) => return Err(mismatch("REAL")),
        (ValueRef::Text(_), _) => return Err(mismatch("TEXT")),
        (ValueRef::Blob(_), _) => return Err(mismatch("BLOB")),
    };
    Ok(Some(value))
}

/// Runs a compiled query, binding `args` positionally, and decodes every row
/// through `vars`.
pub(crate) fn query_rows(conn: &Connection, query: &CompiledQuery) -> StoreResult<Vec<FieldMap>> {
    let params = query.args.iter().map(to_sql).collect::<StoreResult<Vec<_>>>()?;

    let mut stmt = conn.prepare(&query.query)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = FieldMap::new();
        for (idx, var) in query.vars.iter().enumerate() {
            if let Some(value) = from_sql(row.get_ref(idx)?, var)? {
                map.insert(var.column.clone(), value);
            }
        }
        out.push(map);
    }
    Ok(out)
}
