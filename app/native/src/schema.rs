//! JSON Schema generation for the configuration file.

use crate::config::CasementConfig;

/// Generates a JSON Schema for the Casement configuration.
#[must_use]
pub fn generate_schema() -> schemars::Schema {
    let mut schema = schemars::schema_for!(CasementConfig);

    if let Some(obj) = schema.as_object_mut() {
        obj.insert(
            "$id".to_string(),
            serde_json::json!(
                "https://raw.githubusercontent.com/casement-wm/casement/main/casement.schema.json"
            ),
        );
    }

    schema
}

/// Returns the schema as a pretty-printed JSON string.
#[must_use]
pub fn print_schema() -> String {
    serde_json::to_string_pretty(&generate_schema()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_schema_produces_valid_json() {
        let schema_json = print_schema();
        let parsed: serde_json::Value = serde_json::from_str(&schema_json).unwrap();
        assert!(parsed.get("$id").is_some());
    }

    #[test]
    fn test_schema_lists_screens_property() {
        let schema_json = print_schema();
        assert!(schema_json.contains("\"screens\""));
        assert!(schema_json.contains("\"systemBars\""));
    }
}
