use serde::Serialize;

use crate::value::FieldValue;

/// How a staged record relates to persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    /// No persisted row matches the search.
    Create,
    /// Exactly one persisted row matches.
    Update,
    /// The search matches several rows; no single target can be picked.
    Conflict,
}

/// Outcome of reconciling one staged record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingResult {
    pub fields: Vec<StagingResultField>,
    pub status: StagingStatus,
}

impl StagingResult {
    pub fn new(status: StagingStatus, fields: Vec<StagingResultField>) -> Self {
        Self { fields, status }
    }

    /// Entries whose compare value reports a change.
    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| match f {
            StagingResultField::Compare { field, value } if value.changed => Some(field.as_str()),
            _ => None,
        })
    }
}

/// One entry of a [`StagingResult`].
///
/// Serializes as `{"type": "compare" | "value", "field": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StagingResultField {
    Compare { field: String, value: FieldCompare },
    Value { field: String, value: FieldValue },
}

impl StagingResultField {
    pub fn field(&self) -> &str {
        match self {
            Self::Compare { field, .. } | Self::Value { field, .. } => field,
        }
    }
}

/// Old and new value of a field on an existing row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCompare {
    pub changed: bool,
    /// `None` when the persisted column is NULL.
    pub old: Option<FieldValue>,
    pub new: FieldValue,
}

impl FieldCompare {
    pub fn new(old: Option<FieldValue>, new: FieldValue) -> Self {
        Self {
            changed: old.as_ref() != Some(&new),
            old,
            new,
        }
    }
}
