use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

/// Storage kind of a table column.
///
/// Only used to decode persisted rows; staged values are not checked against
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Number,
    Bool,
    Text,
}

/// A declared field of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl FieldDef {
    fn simple(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Shorthand for a numeric column.
    pub fn number(name: &str) -> Self {
        Self::simple(name, ColumnKind::Number)
    }

    /// Shorthand for a boolean column.
    pub fn bool(name: &str) -> Self {
        Self::simple(name, ColumnKind::Bool)
    }

    /// Shorthand for a text column.
    pub fn text(name: &str) -> Self {
        Self::simple(name, ColumnKind::Text)
    }
}

/// A positional bind variable for a selected column.
///
/// `position` is 1-based and matches the column's index in the projection,
/// so row values can be read back in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnVar {
    pub position: usize,
    pub column: String,
    pub kind: ColumnKind,
}

impl ColumnVar {
    /// `$<position>`.
    pub fn placeholder(&self) -> String {
        format!("${}", self.position)
    }
}

/// Static declaration of a table's fields and primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableConfig", into = "TableConfig")]
pub struct TableSchema {
    name: String,
    fields: Vec<FieldDef>,
    primary_key: Vec<String>,
}

/// Wire shape of a table in the registry config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableConfig {
    name: String,
    fields: Vec<FieldDef>,
    primary_key: Vec<String>,
}

impl TryFrom<TableConfig> for TableSchema {
    type Error = SchemaError;

    fn try_from(cfg: TableConfig) -> SchemaResult<Self> {
        TableSchema::new(cfg.name, cfg.fields, cfg.primary_key)
    }
}

impl From<TableSchema> for TableConfig {
    fn from(t: TableSchema) -> Self {
        Self {
            name: t.name,
            fields: t.fields,
            primary_key: t.primary_key,
        }
    }
}

impl TableSchema {
    /// Builds a table, checking that names are identifiers, fields are
    /// unique, and the primary key is a non-empty subset of the fields.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<FieldDef>,
        primary_key: Vec<String>,
    ) -> SchemaResult<Self> {
        let name = name.into();
        check_identifier(&name)?;

        let mut seen = BTreeSet::new();
        for field in &fields {
            check_identifier(&field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    table: name,
                    field: field.name.clone(),
                });
            }
        }

        if primary_key.is_empty() {
            return Err(SchemaError::MissingPrimaryKey(name));
        }
        for pk in &primary_key {
            if !seen.contains(pk.as_str()) {
                return Err(SchemaError::PrimaryKeyNotField {
                    table: name,
                    field: pk.clone(),
                });
            }
        }

        Ok(Self {
            name,
            fields,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declared order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Primary key field names in declared order.
    pub fn pk_names(&self) -> &[String] {
        &self.primary_key
    }

    /// Bind variables parallel to [`pk_names`](Self::pk_names).
    pub fn pk_vars(&self) -> Vec<ColumnVar> {
        self.column_vars(self.primary_key.iter().map(String::as_str))
    }

    /// Bind variables for an arbitrary projection. Unknown columns are
    /// skipped; callers check membership first.
    pub(crate) fn column_vars<'a>(&self, columns: impl Iterator<Item = &'a str>) -> Vec<ColumnVar> {
        columns
            .filter_map(|c| self.field(c))
            .enumerate()
            .map(|(i, f)| ColumnVar {
                position: i + 1,
                column: f.name.clone(),
                kind: f.kind,
            })
            .collect()
    }
}

/// Read-only set of known tables.
///
/// Built once at startup and shared by reference; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RegistryConfig", into = "RegistryConfig")]
pub struct SchemaRegistry {
    tables: BTreeMap<String, TableSchema>,
}

/// Registry config document: `{ "tables": [ ... ] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryConfig {
    tables: Vec<TableSchema>,
}

impl TryFrom<RegistryConfig> for SchemaRegistry {
    type Error = SchemaError;

    fn try_from(cfg: RegistryConfig) -> SchemaResult<Self> {
        SchemaRegistry::new(cfg.tables)
    }
}

impl From<SchemaRegistry> for RegistryConfig {
    fn from(r: SchemaRegistry) -> Self {
        Self {
            tables: r.tables.into_values().collect(),
        }
    }
}

impl SchemaRegistry {
    pub fn new(tables: impl IntoIterator<Item = TableSchema>) -> SchemaResult<Self> {
        let mut map = BTreeMap::new();
        for table in tables {
            let name = table.name.clone();
            if map.insert(name.clone(), table).is_some() {
                return Err(SchemaError::DuplicateTable(name));
            }
        }
        tracing::debug!(tables = map.len(), "Schema registry built");
        Ok(Self { tables: map })
    }

    /// Parses a registry from its JSON config document.
    pub fn from_json_str(json: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let registry = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), tables = registry.len(), "Loaded schema registry");
        Ok(registry)
    }

    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(table)
    }

    /// Whether `table` names a known table.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn is_field(&self, table: &str, field: &str) -> bool {
        self.get(table).is_some_and(|t| t.is_field(field))
    }

    pub fn pk_names(&self, table: &str) -> Option<&[String]> {
        self.get(table).map(TableSchema::pk_names)
    }

    pub fn pk_vars(&self, table: &str) -> Option<Vec<ColumnVar>> {
        self.get(table).map(TableSchema::pk_vars)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Table and column names are spliced into query text, so they are limited
/// to `[A-Za-z_][A-Za-z0-9_]*`.
fn check_identifier(name: &str) -> SchemaResult<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_owned()))
    }
}
