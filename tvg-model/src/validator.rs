//! Validation of staging records against the schema registry.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. the table is known
//! 2. every `searchBy` key is a declared field holding a scalar
//! 3. `fields` is not empty
//! 4. every `fields` key is a declared field
//! 5. the first nested search found in `fields` is valid
//!
//! Step 5 decides the outcome on its own: once a nested search is reached,
//! its result is returned and the remaining fields are not inspected. Keys are
//! visited in ascending order, so "first" is always the lexicographically
//! smallest key holding a nested search.
//!
//! [`SchemaValidator::decode`] runs the same steps on a raw request, so a
//! JSON value the model cannot hold (`null`, an array, a malformed nested
//! object) is reported at the step that reaches it. Fields after the deciding
//! nested search are not checked there either.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ValidationError, ValidationResult};
use crate::schema::{SchemaRegistry, TableSchema};
use crate::staging::{Staging, StagingRequest};
use crate::value::{
    FieldMap, FieldValue, NestedSearch, decode_field_value, decode_search_value, sorted_entries,
};

/// Validates staging records and nested searches.
///
/// Holds no state besides the registry reference, so one validator can be
/// shared across threads.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(&self, staging: &Staging) -> ValidationResult<()> {
        let result = self.check_staging(staging);
        if let Err(e) = &result {
            debug!(table = %staging.table, kind = e.kind(), error = %e, "Staging record rejected");
        }
        result
    }

    /// Decodes and validates a raw request in one pass.
    pub fn decode(&self, req: StagingRequest) -> ValidationResult<Staging> {
        let result = self.decode_request(&req);
        if let Err(e) = &result {
            debug!(table = %req.table, kind = e.kind(), error = %e, "Staging request rejected");
        }
        result
    }

    pub fn validate_nested(&self, nested: &NestedSearch) -> ValidationResult<()> {
        let table = self.table(&nested.table)?;
        check_search_by(table, &nested.search_by)
    }

    fn check_staging(&self, staging: &Staging) -> ValidationResult<()> {
        let table = self.table(&staging.table)?;
        check_search_by(table, &staging.search_by)?;

        if staging.fields.is_empty() {
            return Err(ValidationError::EmptyFields);
        }

        for (key, value) in &staging.fields {
            if !table.is_field(key) {
                return Err(ValidationError::InvalidFieldKey(key.clone()));
            }

            match value {
                FieldValue::Nested(nested) => {
                    return self.validate_nested(nested).map_err(|source| {
                        ValidationError::Nested {
                            field: key.clone(),
                            source: Box::new(source),
                        }
                    });
                }
                FieldValue::Number(n) if !n.is_finite() => {
                    return Err(ValidationError::InvalidFieldValueType {
                        key: key.clone(),
                        value: value.to_string(),
                    });
                }
                FieldValue::Number(_) | FieldValue::Bool(_) | FieldValue::String(_) => {}
            }
        }

        Ok(())
    }

    fn decode_request(&self, req: &StagingRequest) -> ValidationResult<Staging> {
        let table = self.table(&req.table)?;
        let search_by = decode_search_by(table, &req.search_by)?;

        if req.fields.is_empty() {
            return Err(ValidationError::EmptyFields);
        }

        let mut fields = FieldMap::new();
        let mut entries = sorted_entries(&req.fields).into_iter();
        for (key, value) in entries.by_ref() {
            if !table.is_field(key) {
                return Err(ValidationError::InvalidFieldKey(key.clone()));
            }

            if let Value::Object(obj) = value {
                fields.insert(key.clone(), self.decode_nested(key, obj)?);
                break;
            }
            fields.insert(key.clone(), decode_field_value(key, value)?);
        }
        fields.extend_unchecked(entries);

        Ok(Staging::from_parts(
            req.table.clone(),
            search_by,
            fields,
            req.created_at,
        ))
    }

    fn decode_nested(&self, key: &str, obj: &Map<String, Value>) -> ValidationResult<NestedSearch> {
        let (table, raw) = NestedSearch::parse_shape(key, obj)?;
        let in_scope = |source: ValidationError| ValidationError::Nested {
            field: key.to_owned(),
            source: Box::new(source),
        };

        let schema = self.table(table).map_err(in_scope)?;
        let search_by = decode_search_by(schema, raw).map_err(in_scope)?;
        Ok(NestedSearch::new(table, search_by))
    }

    fn table(&self, name: &str) -> ValidationResult<&'a TableSchema> {
        self.registry
            .get(name)
            .ok_or_else(|| ValidationError::InvalidTable(name.to_owned()))
    }
}

fn check_search_by(table: &TableSchema, search_by: &FieldMap) -> ValidationResult<()> {
    for (key, value) in search_by {
        if !table.is_field(key) {
            return Err(ValidationError::InvalidSearchKey(key.clone()));
        }

        let finite_scalar = match value {
            FieldValue::Number(n) => n.is_finite(),
            FieldValue::Bool(_) | FieldValue::String(_) => true,
            FieldValue::Nested(_) => false,
        };
        if !finite_scalar {
            return Err(ValidationError::InvalidSearchValueType {
                key: key.clone(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Key check before value check, one key at a time in ascending order.
fn decode_search_by(table: &TableSchema, raw: &Map<String, Value>) -> ValidationResult<FieldMap> {
    let mut search_by = FieldMap::new();
    for (key, value) in sorted_entries(raw) {
        if !table.is_field(key) {
            return Err(ValidationError::InvalidSearchKey(key.clone()));
        }
        search_by.insert(key.clone(), decode_search_value(key, value)?);
    }
    Ok(search_by)
}
