use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationResult};
use crate::schema::SchemaRegistry;
use crate::value::{FieldMap, FieldValue};

/// A candidate row awaiting review.
///
/// `search_by` locates an existing row of `table`; `fields` carries the
/// values to stage, where a value may be a [`NestedSearch`](crate::NestedSearch)
/// referring to a row of another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StagingRequest")]
pub struct Staging {
    pub table: String,
    pub search_by: FieldMap,
    pub fields: FieldMap,
    created_at: DateTime<Utc>,
}

impl Staging {
    pub fn new(table: impl Into<String>, search_by: FieldMap, fields: FieldMap) -> Self {
        Self {
            table: table.into(),
            search_by,
            fields,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn from_parts(
        table: String,
        search_by: FieldMap,
        fields: FieldMap,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            table,
            search_by,
            fields,
            created_at: created_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Checks that the record survives its JSON form unchanged: searches
    /// (top-level and nested) hold scalars only, and every number is finite.
    ///
    /// Unlike validation this looks at every field, including those after
    /// the first nested search.
    pub fn check_values(&self) -> ValidationResult<()> {
        check_search_values(&self.search_by)?;
        for (key, value) in &self.fields {
            match value {
                FieldValue::Nested(nested) => {
                    check_search_values(&nested.search_by).map_err(|source| {
                        ValidationError::Nested {
                            field: key.clone(),
                            source: Box::new(source),
                        }
                    })?;
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

    /// Joins the display form of each primary key value with `-`, in the
    /// table's declared key order.
    ///
    /// # Panics
    ///
    /// Panics if the table is unknown or a primary key field is missing from
    /// `fields`. Both mean the record skipped validation.
    pub fn key_string(&self, registry: &SchemaRegistry) -> String {
        let Some(pk_names) = registry.pk_names(&self.table) else {
            panic!("Staging::key_string: unknown table {}", self.table);
        };

        pk_names
            .iter()
            .map(|pk| match self.fields.get(pk) {
                Some(value) => value.to_string(),
                None => panic!("Staging::key_string: missing pk {pk}"),
            })
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Raw request body for a staging record, as received.
///
/// Values are untyped JSON until converted into a [`Staging`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingRequest {
    pub table: String,
    #[serde(default)]
    pub search_by: Map<String, Value>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<StagingRequest> for Staging {
    type Error = ValidationError;

    /// Rejects JSON kinds the value model cannot hold: `null`, arrays, and
    /// objects that are not nested-search descriptors.
    ///
    /// This conversion knows no registry. Use
    /// [`SchemaValidator::decode`](crate::SchemaValidator::decode) for
    /// incoming requests so errors come out in check order.
    fn try_from(req: StagingRequest) -> Result<Self, Self::Error> {
        Ok(Self::from_parts(
            req.table,
            FieldMap::decode_search(&req.search_by)?,
            FieldMap::decode_fields(&req.fields)?,
            req.created_at,
        ))
    }
}

fn check_search_values(search_by: &FieldMap) -> ValidationResult<()> {
    for (key, value) in search_by {
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
