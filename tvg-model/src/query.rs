//! Compiles searches into parameterized `SELECT` statements.
//!
//! Predicates are emitted in ascending key order as `<key> = $<i>`, and the
//! `i`-th argument binds `$i`. Table and column names are taken from the
//! registry, never from caller-supplied strings, and values only travel as
//! arguments.

use serde::Serialize;
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::schema::{ColumnVar, SchemaRegistry, TableSchema};
use crate::staging::Staging;
use crate::value::{FieldMap, FieldValue, NestedSearch};

/// A compiled search.
///
/// For [`QueryCompiler::compile`] the projected columns are the table's
/// primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Projected column names, in order.
    pub columns: Vec<String>,
    /// Bind variables parallel to `columns`, for reading rows back.
    pub vars: Vec<ColumnVar>,
    /// Query text with `$N` placeholders.
    pub query: String,
    /// Arguments; `args[i - 1]` binds `$i`.
    pub args: Vec<FieldValue>,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Compiles `search_by` into a query selecting the primary key of
    /// `table`.
    ///
    /// An empty search compiles to a query without a `WHERE` clause.
    pub fn compile(&self, table: &str, search_by: &FieldMap) -> QueryResult<CompiledQuery> {
        let schema = self.table(table)?;
        let columns: Vec<&str> = schema.pk_names().iter().map(String::as_str).collect();
        build(schema, &columns, search_by)
    }

    /// Same as [`compile`](Self::compile) with an explicit projection.
    pub fn compile_projection(
        &self,
        table: &str,
        columns: &[&str],
        search_by: &FieldMap,
    ) -> QueryResult<CompiledQuery> {
        let schema = self.table(table)?;
        if let Some(unknown) = columns.iter().find(|c| !schema.is_field(**c)) {
            return Err(QueryError::UnknownColumn {
                table: table.to_owned(),
                column: (*unknown).to_owned(),
            });
        }
        build(schema, columns, search_by)
    }

    pub fn compile_staging(&self, staging: &Staging) -> QueryResult<CompiledQuery> {
        self.compile(&staging.table, &staging.search_by)
    }

    pub fn compile_nested(&self, nested: &NestedSearch) -> QueryResult<CompiledQuery> {
        self.compile(&nested.table, &nested.search_by)
    }

    fn table(&self, name: &str) -> QueryResult<&'a TableSchema> {
        self.registry
            .get(name)
            .ok_or_else(|| QueryError::UnknownTable(name.to_owned()))
    }
}

fn build(schema: &TableSchema, columns: &[&str], search_by: &FieldMap) -> QueryResult<CompiledQuery> {
    let mut predicates = Vec::with_capacity(search_by.len());
    let mut args = Vec::with_capacity(search_by.len());

    // FieldMap iterates in key order, which fixes placeholder numbering.
    for (i, (key, value)) in search_by.iter().enumerate() {
        if !schema.is_field(key) {
            return Err(QueryError::UnknownColumn {
                table: schema.name().to_owned(),
                column: key.clone(),
            });
        }
        if !value.is_scalar() {
            return Err(QueryError::NonScalarArgument(key.clone()));
        }
        predicates.push(format!("{key} = ${}", i + 1));
        args.push(value.clone());
    }

    let mut query = format!("SELECT {} FROM {}", columns.join(", "), schema.name());
    if !predicates.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&predicates.join(" AND "));
    }

    debug!(table = schema.name(), args = args.len(), query = %query, "Compiled search query");

    Ok(CompiledQuery {
        columns: columns.iter().map(|c| (*c).to_owned()).collect(),
        vars: schema.column_vars(columns.iter().copied()),
        query,
        args,
    })
}
