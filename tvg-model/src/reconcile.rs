use crate::result::{FieldCompare, StagingResult, StagingResultField, StagingStatus};
use crate::staging::Staging;
use crate::value::{FieldMap, FieldValue};

/// Classifies a staged record against the persisted rows its search matched.
///
/// `matches` holds one map per matched row, restricted to the scalar columns
/// present in `staging.fields`. The default implementation is usually
/// enough; override it for table-specific merge rules.
pub trait Reconciler: Send + Sync {
    fn reconcile(&self, staging: &Staging, matches: &[FieldMap]) -> StagingResult {
        match matches {
            [] => StagingResult::new(StagingStatus::Create, value_entries(&staging.fields)),
            [existing] => StagingResult::new(
                StagingStatus::Update,
                compare_entries(&staging.fields, existing),
            ),
            _ => StagingResult::new(StagingStatus::Conflict, value_entries(&staging.fields)),
        }
    }
}

/// Reconciler with the stock create / update / conflict rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReconciler;

impl Reconciler for DefaultReconciler {}

fn value_entries(fields: &FieldMap) -> Vec<StagingResultField> {
    fields
        .iter()
        .map(|(field, value)| StagingResultField::Value {
            field: field.clone(),
            value: value.clone(),
        })
        .collect()
}

fn compare_entries(fields: &FieldMap, existing: &FieldMap) -> Vec<StagingResultField> {
    fields
        .iter()
        .map(|(field, value)| match value {
            // Nested searches resolve to another table's row; there is no
            // column value to compare against.
            FieldValue::Nested(_) => StagingResultField::Value {
                field: field.clone(),
                value: value.clone(),
            },
            _ => StagingResultField::Compare {
                field: field.clone(),
                value: FieldCompare::new(existing.get(field).cloned(), value.clone()),
            },
        })
        .collect()
}
