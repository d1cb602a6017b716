//! Output Validation Tests
//!
//! The CLI prints exactly one JSON envelope per invocation. These tests pin
//! the envelope layout, the stable error codes, and the JSON shape of the
//! values commands put in `data`.
//!
//! Uses `insta` inline snapshots to detect unintended output changes.

use dbcompat::{
    CompatError, ErrorEnvelope, ErrorInfo, Metadata, ParameterRemapper, PlaceholderStyle,
    SuccessEnvelope,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Envelope Structure Tests
// ============================================================================

#[test]
fn test_success_envelope_structure() {
    let envelope = SuccessEnvelope::new(
        "mysql",
        "query",
        serde_json::json!({"rows": []}),
        Metadata::with_rows(42, 0),
    );

    let json_value = serde_json::to_value(&envelope).expect("Should serialize");
    let mut keys: Vec<&str> = json_value.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();

    assert_eq!(keys, vec!["command", "data", "engine", "meta", "ok"]);
    assert_eq!(json_value["ok"], true);
    assert_eq!(json_value["meta"]["execution_ms"], 42);
    assert_eq!(json_value["meta"]["rows_returned"], 0);
}

#[test]
fn test_error_envelope_has_no_data() {
    let err = CompatError::catalog_access("shop.users", "Table 'shop.users' doesn't exist");
    let envelope = ErrorEnvelope::from_error("mysql", "describe", &err);

    let json_value = serde_json::to_value(&envelope).expect("Should serialize");
    assert_eq!(json_value["ok"], false);
    assert!(json_value.get("data").is_none());
    assert_eq!(json_value["error"]["code"], "CATALOG_ACCESS_FAILED");
}

// ============================================================================
// Error Code Consistency Tests
// ============================================================================

#[test]
fn test_all_error_codes_are_consistent() {
    let errors = vec![
        CompatError::catalog_access("t", "x"),
        CompatError::MalformedPlaceholder { token: "$99999999999".into(), offset: 0 },
        CompatError::UnboundParameter { placeholder: 2, supplied: 1 },
        CompatError::EncodingCorruption { offset: 4 },
        CompatError::connection_failed("x"),
        CompatError::query_failed("x"),
        CompatError::invalid_input("x"),
        CompatError::engine_error("mysql", "x"),
        CompatError::config_error("x"),
    ];

    let codes: Vec<&str> = errors.iter().map(CompatError::error_code).collect();
    assert_eq!(
        codes,
        vec![
            "CATALOG_ACCESS_FAILED",
            "MALFORMED_PLACEHOLDER",
            "UNBOUND_PARAMETER",
            "ENCODING_CORRUPTION",
            "CONNECTION_FAILED",
            "QUERY_FAILED",
            "INVALID_INPUT",
            "ENGINE_ERROR",
            "CONFIG_ERROR",
        ]
    );
}

// ============================================================================
// Snapshot Tests (using insta)
// ============================================================================

#[test]
fn test_remap_envelope_snapshot() {
    let prepared = ParameterRemapper::new(PlaceholderStyle::Numbered)
        .prepare("INSERT INTO t VALUES($2,$1)")
        .unwrap();

    let envelope = SuccessEnvelope::new("", "remap", prepared, Metadata::new(0));
    let json_str = serde_json::to_string(&envelope).expect("Should serialize");

    insta::assert_snapshot!(json_str, @r#"{"ok":true,"engine":"","command":"remap","data":{"sql":"INSERT INTO t VALUES(?,?)","placeholders":[2,1]},"meta":{"execution_ms":0}}"#);
}

#[test]
fn test_error_envelope_snapshot() {
    let err = CompatError::UnboundParameter { placeholder: 3, supplied: 2 };
    let envelope = ErrorEnvelope::new("postgres", "query", ErrorInfo::from(&err));

    let json_str = serde_json::to_string(&envelope).expect("Should serialize");
    insta::assert_snapshot!(json_str, @r#"{"ok":false,"engine":"postgres","command":"query","error":{"code":"UNBOUND_PARAMETER","message":"Unbound parameter $3: 2 parameter(s) supplied"}}"#);
}

#[cfg(feature = "sqlite")]
#[test]
fn test_describe_output_snapshot() {
    use dbcompat::clock::ManualClock;
    use dbcompat::{ConnectionConfig, Link, TableMetadataCache};
    use std::sync::Arc;

    let path = std::env::temp_dir().join(format!("dbcompat_describe_{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut link = Link::connect(
        &ConnectionConfig::sqlite(path.clone()),
        TableMetadataCache::default(),
        Arc::new(ManualClock::new(0)),
    )
    .expect("Failed to connect");
    link.query("CREATE TABLE tags (id INTEGER PRIMARY KEY, label VARCHAR(16) NOT NULL)", &[])
        .unwrap();

    let table = link.table_metadata(None, None, "tags").unwrap();
    let json_str = serde_json::to_string(&*table).expect("Should serialize");

    insta::assert_snapshot!(json_str, @r#"{"catalog":null,"schema":null,"name":"tags","columns":[{"table":"tags","name":"id","column_type":"integer","type_name":"INTEGER","length":0,"not_null":false,"unsigned":false,"zero_fill":false,"primary_key":true,"index":false,"unique":false},{"table":"tags","name":"label","column_type":"varchar","type_name":"VARCHAR(16)","length":16,"not_null":true,"unsigned":false,"zero_fill":false,"primary_key":false,"index":false,"unique":false}],"created_at":0,"max_idle":10000}"#);

    drop(link);
    let _ = std::fs::remove_file(&path);
}
