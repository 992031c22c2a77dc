use metaform_meta::prelude::*;
use metaform_meta::path::{identifier, lookup};
use proptest::prelude::*;
use serde_json::{json, Value};

const EMPLOYEE_CATALOG: &str = r#"{
  "entities": [
    {
      "name": "Department",
      "endpoint": "/departments",
      "fields": [{ "name": "title", "kind": "text", "required": true }]
    },
    {
      "name": "Employee",
      "apiEndpoint": "/employees",
      "sections": ["Personal", "Work"],
      "fields": [
        { "name": "firstName", "kind": "text", "required": true, "section": "Personal" },
        { "name": "lastName", "kind": "text", "section": "Personal",
          "table": { "header": "Name", "accessor": "{firstName} {lastName}" } },
        { "name": "hiredOn", "kind": "date", "section": "Work" },
        { "name": "salary", "kind": "number", "section": "Work",
          "validation": { "min": 0 } },
        { "name": "departments", "kind": "referenceList", "section": "Work",
          "reference": { "endpoint": "/departments", "label": "title", "target": "Department" },
          "table": { "header": "Departments" } },
        { "name": "address", "kind": "nestedObject",
          "fields": [
            { "name": "city", "kind": "text", "required": true },
            { "name": "zip", "kind": "text", "validation": { "pattern": "^[0-9]{5}$" } }
          ] }
      ]
    }
  ]
}"#;

#[test]
fn employee_catalog_loads() {
    let catalog = Catalog::from_json_str(EMPLOYEE_CATALOG).unwrap();
    assert_eq!(catalog.len(), 2);

    let employee = catalog.get("Employee").unwrap();
    assert_eq!(employee.endpoint(), "/employees");

    let sections: Vec<Option<&str>> = employee.grouped_fields().iter().map(|(s, _)| *s).collect();
    assert_eq!(sections, vec![Some("Personal"), Some("Work"), None]);

    let columns: Vec<&str> = employee.columns().map(|(_, d)| d.header.as_str()).collect();
    assert_eq!(columns, vec!["Name", "Departments"]);
}

#[test]
fn table_cells_from_catalog_columns() {
    let catalog = Catalog::from_json_str(EMPLOYEE_CATALOG).unwrap();
    let employee = catalog.get("Employee").unwrap();
    let row = json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "departments": [{"id": 1, "title": "Research"}, {"id": 2, "title": "Ops"}]
    });

    let cells: Vec<String> = employee.columns().map(|(_, d)| d.cell(&row)).collect();
    assert_eq!(cells, vec!["Ada Lovelace".to_string(), "Research, Ops".to_string()]);
}

#[test]
fn nested_defaults_and_validation() {
    let catalog = Catalog::from_json_str(EMPLOYEE_CATALOG).unwrap();
    let employee = catalog.get("Employee").unwrap();

    let defaults = Value::Object(employee.default_values());
    assert_eq!(defaults["address"], json!({"city": null, "zip": null}));
    assert_eq!(defaults["departments"], json!([]));

    let address = employee.field("address").unwrap();
    let errors = address.validate(&json!({"city": "Paris", "zip": "7500"})).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors.get("address.zip").is_some());
}

#[test]
fn malformed_document_is_parse_error() {
    assert!(matches!(
        Catalog::from_json_str("{ not json"),
        Err(MetadataError::Parse(_))
    ));
    assert!(matches!(
        Catalog::from_yaml_str("entities: [ {name: A} ]"),
        Err(MetadataError::Parse(_))
    ));
}

#[test]
fn unsupported_extension_is_rejected() {
    let path = std::env::temp_dir().join(format!("metaform-catalog-{}.txt", std::process::id()));
    std::fs::write(&path, "entities: []").unwrap();
    let result = Catalog::load(&path);
    std::fs::remove_file(&path).ok();
    assert!(matches!(result, Err(MetadataError::UnsupportedFormat(ext)) if ext == "txt"));
}

#[test]
fn missing_file_is_io_error() {
    assert!(matches!(
        Catalog::load("/nonexistent/metaform/catalog.yaml"),
        Err(MetadataError::Io { .. })
    ));
}

proptest! {
    #[test]
    fn prop_required_text_rejects_only_blank(text in "[ a-z]{0,12}") {
        let field = FieldDescriptor::text("name").required();
        let result = field.validate(&Value::String(text.clone()));
        prop_assert_eq!(result.is_err(), text.trim().is_empty());
    }

    #[test]
    fn prop_length_bounds(text in "[a-z]{0,20}", min in 0usize..10, extra in 0usize..10) {
        let max = min + extra;
        let field = FieldDescriptor::text("code")
            .validation(Validation::new().min_length(min).max_length(max));
        let len = text.chars().count();
        let ok = field.validate(&Value::String(text)).is_ok();
        prop_assert_eq!(ok, len == 0 || (len >= min && len <= max));
    }

    #[test]
    fn prop_numeric_ids_normalize(n in 0u64..1_000_000) {
        prop_assert_eq!(identifier(&json!(n)), identifier(&json!(n.to_string())));
    }

    #[test]
    fn prop_lookup_finds_nested_keys(key in "[a-z]{1,8}", value in "[a-zA-Z0-9 ]{0,16}") {
        let record = json!({"outer": {key.clone(): value.clone()}});
        let path = format!("outer.{key}");
        prop_assert_eq!(lookup(&record, &path), Some(&Value::String(value)));
    }
}
