mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use tvg_model::{
    ErrorCategory, FieldMap, FieldValue, NestedSearch, SchemaValidator, Staging, StagingRequest,
    ValidationError,
};

fn staging(table: &str, search_by: FieldMap, fields: FieldMap) -> Staging {
    Staging::new(table, search_by, fields)
}

fn rep_search(id: f64) -> NestedSearch {
    NestedSearch::new("reps", FieldMap::new().with("id", id))
}

// ── Accepting ────────────────────────────────────────────────────

#[test]
fn voters_scenario_validates() {
    let r = common::registry();
    let s = staging(
        "voters",
        FieldMap::new().with("district", "A"),
        FieldMap::new().with("name", "X").with("id", 1.0),
    );
    assert_eq!(SchemaValidator::new(&r).validate(&s), Ok(()));
    assert_eq!(s.key_string(&r), "1");
}

#[test]
fn empty_search_by_is_allowed() {
    let r = common::registry();
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("name", "X"));
    assert!(SchemaValidator::new(&r).validate(&s).is_ok());
}

#[test]
fn all_scalar_kinds_accepted() {
    let r = common::registry();
    let s = staging(
        "reps",
        FieldMap::new().with("active", true).with("id", 2.0).with("name", "Lin"),
        FieldMap::new().with("active", false).with("party", "P").with("id", 2.0),
    );
    assert!(SchemaValidator::new(&r).validate(&s).is_ok());
}

#[test]
fn nested_search_validates_recursively() {
    let r = common::registry();
    let s: Staging = serde_json::from_value(json!({
        "table": "voters",
        "searchBy": {"id": 1},
        "fields": {"name": {"table": "reps", "searchBy": {"id": 5}}}
    }))
    .unwrap();
    assert!(SchemaValidator::new(&r).validate(&s).is_ok());
}

#[test]
fn nested_search_may_target_same_table() {
    let r = common::registry();
    let nested = NestedSearch::new("voters", FieldMap::new().with("district", "B"));
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("name", nested));
    assert!(SchemaValidator::new(&r).validate(&s).is_ok());
}

#[test]
fn validate_nested_directly() {
    let r = common::registry();
    let v = SchemaValidator::new(&r);
    assert!(v.validate_nested(&rep_search(5.0)).is_ok());
    assert!(v.validate_nested(&NestedSearch::new("reps", FieldMap::new())).is_ok());
}

// ── Rejections, in check order ───────────────────────────────────

#[test]
fn unknown_table_rejected() {
    let r = common::registry();
    let s = staging("parties", FieldMap::new(), FieldMap::new().with("name", "X"));
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err, ValidationError::InvalidTable("parties".into()));
    assert_eq!(err.kind(), "invalid-table");
    assert_eq!(err.category(), ErrorCategory::Schema);
}

#[test]
fn undeclared_search_key_rejected() {
    let r = common::registry();
    let s = staging(
        "voters",
        FieldMap::new().with("party", "P"),
        FieldMap::new().with("name", "X"),
    );
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err, ValidationError::InvalidSearchKey("party".into()));
    assert_eq!(err.category(), ErrorCategory::Field);
}

#[test]
fn nested_value_in_search_by_rejected() {
    let r = common::registry();
    let s = staging(
        "voters",
        FieldMap::new().with("id", rep_search(5.0)),
        FieldMap::new().with("name", "X"),
    );
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err.kind(), "invalid-search-value-type");
    assert_eq!(err.category(), ErrorCategory::Type);
    assert!(err.to_string().contains("reps(id=5)"));
}

#[test]
fn empty_fields_rejected() {
    let r = common::registry();
    let s = staging("voters", FieldMap::new().with("district", "A"), FieldMap::new());
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err, ValidationError::EmptyFields);
    assert_eq!(err.kind(), "empty-fields");
}

#[test]
fn search_key_checked_before_empty_fields() {
    let r = common::registry();
    let s = staging("voters", FieldMap::new().with("bogus", 1.0), FieldMap::new());
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err.kind(), "invalid-search-key");
}

#[test]
fn undeclared_field_key_rejected() {
    let r = common::registry();
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("party", "P"));
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err, ValidationError::InvalidFieldKey("party".into()));
    assert_eq!(err.kind(), "invalid-field-key");
}

#[test]
fn nested_with_unknown_table_rejected() {
    let r = common::registry();
    let nested = NestedSearch::new("parties", FieldMap::new().with("id", 1.0));
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("name", nested));
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(
        err,
        ValidationError::Nested {
            field: "name".into(),
            source: Box::new(ValidationError::InvalidTable("parties".into())),
        }
    );
    assert_eq!(err.kind(), "invalid-table");
    assert_eq!(err.innermost(), &ValidationError::InvalidTable("parties".into()));
}

#[test]
fn nested_with_undeclared_search_key_rejected() {
    let r = common::registry();
    let nested = NestedSearch::new("reps", FieldMap::new().with("district", "A"));
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("name", nested));
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err.kind(), "invalid-search-key");
}

#[test]
fn doubly_nested_search_rejected() {
    let r = common::registry();
    let inner = rep_search(1.0);
    let outer = NestedSearch::new("reps", FieldMap::new().with("id", inner));
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("name", outer));
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err.kind(), "invalid-search-value-type");
}

#[test]
fn malformed_nested_shape_rejected_on_decode() {
    let res: Result<Staging, _> = serde_json::from_value(json!({
        "table": "voters",
        "fields": {"rep": {"table": "reps"}}
    }));
    assert!(res.unwrap_err().to_string().contains("invalid nested searchBy for rep"));
}

// ── First nested search decides ──────────────────────────────────

#[test]
fn valid_nested_short_circuits_remaining_fields() {
    let r = common::registry();
    // "district" sorts before "name", so the bad key after it is never reached.
    let s = staging(
        "voters",
        FieldMap::new(),
        FieldMap::new()
            .with("district", rep_search(1.0))
            .with("unknown_field", "x"),
    );
    assert!(SchemaValidator::new(&r).validate(&s).is_ok());
}

#[test]
fn field_before_nested_still_checked() {
    let r = common::registry();
    let s = staging(
        "voters",
        FieldMap::new(),
        FieldMap::new().with("aaa", "x").with("name", rep_search(1.0)),
    );
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err, ValidationError::InvalidFieldKey("aaa".into()));
}

#[test]
fn first_nested_in_key_order_wins() {
    let r = common::registry();
    let bad = NestedSearch::new("parties", FieldMap::new());
    let good = rep_search(1.0);

    let s = staging(
        "voters",
        FieldMap::new(),
        FieldMap::new().with("name", bad.clone()).with("district", good.clone()),
    );
    assert!(SchemaValidator::new(&r).validate(&s).is_ok());

    let s = staging(
        "voters",
        FieldMap::new(),
        FieldMap::new().with("district", bad).with("name", good),
    );
    assert_eq!(SchemaValidator::new(&r).validate(&s).unwrap_err().kind(), "invalid-table");
}

// ── Key derivation ───────────────────────────────────────────────

#[test]
fn key_string_joins_composite_key_in_declared_order() {
    let r = common::registry();
    let s = staging(
        "terms",
        FieldMap::new(),
        FieldMap::new()
            .with("session", 11.0)
            .with("role", "chair")
            .with("rep_id", 42.0),
    );
    assert_eq!(s.key_string(&r), "42-11");
}

#[test]
fn key_string_formats_non_numeric_values() {
    let r = common::registry();
    let s = staging("reps", FieldMap::new(), FieldMap::new().with("id", "r-7"));
    assert_eq!(s.key_string(&r), "r-7");

    let s = staging("reps", FieldMap::new(), FieldMap::new().with("id", 2.5));
    assert_eq!(s.key_string(&r), "2.5");
}

#[test]
fn key_string_never_uses_exponent_form() {
    let r = common::registry();
    let s = staging("reps", FieldMap::new(), FieldMap::new().with("id", 1234567.0));
    assert_eq!(s.key_string(&r), "1234567");

    let s = staging("reps", FieldMap::new(), FieldMap::new().with("id", 1e21));
    assert_eq!(s.key_string(&r), "1000000000000000000000");
}

#[test]
#[should_panic(expected = "missing pk")]
fn key_string_panics_without_primary_key() {
    let r = common::registry();
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("name", "X"));
    let _ = s.key_string(&r);
}

#[test]
#[should_panic(expected = "unknown table")]
fn key_string_panics_on_unknown_table() {
    let r = common::registry();
    let s = staging("parties", FieldMap::new(), FieldMap::new().with("id", 1.0));
    let _ = s.key_string(&r);
}

// ── Sharing ──────────────────────────────────────────────────────

#[test]
fn validator_is_shareable_across_threads() {
    let r = std::sync::Arc::new(common::registry());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let r = r.clone();
            std::thread::spawn(move || {
                let s = staging(
                    "voters",
                    FieldMap::new().with("district", "A"),
                    FieldMap::new().with("id", f64::from(i)),
                );
                SchemaValidator::new(&r).validate(&s).is_ok()
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }
}

// ── Non-finite numbers ───────────────────────────────────────────

#[test]
fn nan_field_rejected() {
    let r = common::registry();
    let s = staging("voters", FieldMap::new(), FieldMap::new().with("id", f64::NAN));
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidFieldValueType {
            key: "id".into(),
            value: "NaN".into()
        }
    );
}

#[test]
fn infinite_search_value_rejected() {
    let r = common::registry();
    let s = staging(
        "voters",
        FieldMap::new().with("id", f64::INFINITY),
        FieldMap::new().with("name", "x"),
    );
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert_eq!(err.kind(), "invalid-search-value-type");
}

#[test]
fn non_finite_in_nested_search_rejected() {
    let r = common::registry();
    let s = staging(
        "voters",
        FieldMap::new(),
        FieldMap::new().with("name", rep_search(f64::NEG_INFINITY)),
    );
    let err = SchemaValidator::new(&r).validate(&s).unwrap_err();
    assert!(matches!(err, ValidationError::Nested { ref field, .. } if field == "name"));
    assert_eq!(err.kind(), "invalid-search-value-type");
}

// ── Decoding requests ────────────────────────────────────────────

fn decode(body: serde_json::Value) -> Result<Staging, ValidationError> {
    let r = common::registry();
    let req: StagingRequest = serde_json::from_value(body).unwrap();
    SchemaValidator::new(&r).decode(req)
}

#[test]
fn decode_accepts_valid_request() {
    let s = decode(json!({
        "table": "voters",
        "searchBy": {"district": "A"},
        "fields": {"id": 1, "name": {"table": "reps", "searchBy": {"id": 5}}}
    }))
    .unwrap();
    assert_eq!(s.table, "voters");
    assert_eq!(s.search_by, FieldMap::new().with("district", "A"));
    assert_eq!(
        s.fields,
        FieldMap::new().with("id", 1.0).with("name", rep_search(5.0))
    );
}

#[test]
fn decode_keeps_created_at() {
    let s = decode(json!({
        "table": "voters",
        "fields": {"id": 1},
        "createdAt": "2024-01-02T03:04:05Z"
    }))
    .unwrap();
    assert_eq!(s.created_at().to_rfc3339(), "2024-01-02T03:04:05+00:00");
}

#[test]
fn decode_reports_unknown_table_before_values() {
    let err = decode(json!({"table": "nope", "searchBy": {}, "fields": {"x": null}})).unwrap_err();
    assert_eq!(err, ValidationError::InvalidTable("nope".into()));
}

#[test]
fn decode_reports_search_key_before_its_value() {
    let err = decode(json!({
        "table": "voters",
        "searchBy": {"aaa": null, "district": "A"},
        "fields": {"name": "x"}
    }))
    .unwrap_err();
    assert_eq!(err, ValidationError::InvalidSearchKey("aaa".into()));

    let err = decode(json!({
        "table": "voters",
        "searchBy": {"district": [1], "zzz": 1},
        "fields": {"name": "x"}
    }))
    .unwrap_err();
    assert_eq!(err.kind(), "invalid-search-value-type");
}

#[test]
fn decode_reports_search_errors_before_empty_fields() {
    let err = decode(json!({"table": "voters", "searchBy": {"id": null}, "fields": {}})).unwrap_err();
    assert_eq!(err.kind(), "invalid-search-value-type");

    let err = decode(json!({"table": "voters", "searchBy": {"id": 1}})).unwrap_err();
    assert_eq!(err, ValidationError::EmptyFields);
}

#[test]
fn decode_reports_field_key_before_its_value() {
    let err = decode(json!({"table": "voters", "fields": {"party": null}})).unwrap_err();
    assert_eq!(err, ValidationError::InvalidFieldKey("party".into()));

    let err = decode(json!({"table": "voters", "fields": {"name": null}})).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Type);
}

#[test]
fn decode_stops_after_first_nested_search() {
    let s = decode(json!({
        "table": "voters",
        "fields": {
            "district": {"table": "reps", "searchBy": {"id": 5}},
            "name": null,
            "zzz": "kept"
        }
    }))
    .unwrap();
    assert_eq!(s.fields.get("district"), Some(&FieldValue::from(rep_search(5.0))));
    assert!(!s.fields.contains_key("name"));
    assert_eq!(s.fields.get("zzz"), Some(&FieldValue::from("kept")));
}

#[test]
fn decode_checks_fields_before_first_nested() {
    let err = decode(json!({
        "table": "voters",
        "fields": {"id": null, "name": {"table": "reps", "searchBy": {"id": 5}}}
    }))
    .unwrap_err();
    assert_eq!(err.kind(), "invalid-field-value-type");
}

#[test]
fn decode_nested_reports_table_before_values() {
    let err = decode(json!({
        "table": "voters",
        "fields": {"name": {"table": "parties", "searchBy": {"id": null}}}
    }))
    .unwrap_err();
    assert!(matches!(err, ValidationError::Nested { ref field, .. } if field == "name"));
    assert_eq!(err.innermost(), &ValidationError::InvalidTable("parties".into()));
}

#[test]
fn decode_nested_reports_key_before_value() {
    let err = decode(json!({
        "table": "voters",
        "fields": {"name": {"table": "reps", "searchBy": {"bogus": null}}}
    }))
    .unwrap_err();
    assert_eq!(err.innermost(), &ValidationError::InvalidSearchKey("bogus".into()));
}

#[test]
fn decode_nested_shape_error_names_field() {
    let err = decode(json!({"table": "voters", "fields": {"name": {"table": "reps"}}})).unwrap_err();
    assert_eq!(err.kind(), "invalid-nested-search-shape");
}
