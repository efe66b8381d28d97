//! JSON Schema parameter definitions and input validation.

use serde::{Deserialize, Serialize};

/// JSON Schema describing a tool's expected input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// JSON Schema object describing the input.
    pub schema: serde_json::Value,
}

impl ToolSchema {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// Create an empty schema (no parameters).
    pub fn empty() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> SchemaBuilder {
        SchemaBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }

    /// Validate an input value against this schema.
    ///
    /// Performs top-level validation: schema type check, required field
    /// presence, and property type verification. Returns `Ok(())` when valid,
    /// `Err(message)` describing the first violation found.
    pub fn validate(&self, input: &serde_json::Value) -> Result<(), String> {
        let schema = &self.schema;

        if let Some(schema_type) = schema.get("type").and_then(|v| v.as_str()) {
            if schema_type == "object" && !input.is_object() {
                return Err(format!(
                    "expected object input, got {}",
                    json_type_name(input)
                ));
            }
        }

        if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
            let obj = match input.as_object() {
                Some(obj) => obj,
                None => return Ok(()),
            };
            for field in required {
                if let Some(name) = field.as_str() {
                    if !obj.contains_key(name) {
                        return Err(format!("missing required field '{name}'"));
                    }
                }
            }
        }

        if let (Some(properties), Some(obj)) = (
            schema.get("properties").and_then(|v| v.as_object()),
            input.as_object(),
        ) {
            for (key, value) in obj {
                if let Some(prop_schema) = properties.get(key) {
                    if let Some(expected_type) = prop_schema.get("type").and_then(|v| v.as_str()) {
                        if !value_matches_type(value, expected_type) {
                            return Err(format!(
                                "field '{}' expected type '{}', got {}",
                                key,
                                expected_type,
                                json_type_name(value)
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Builder for constructing tool input schemas.
pub struct SchemaBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Add a string property.
    pub fn string(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            serde_json::json!({
                "type": "string",
                "description": description.into(),
            }),
        );
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add a number property.
    pub fn number(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            serde_json::json!({
                "type": "number",
                "description": description.into(),
            }),
        );
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add an integer property.
    pub fn integer(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            serde_json::json!({
                "type": "integer",
                "description": description.into(),
            }),
        );
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add a boolean property.
    pub fn boolean(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            serde_json::json!({
                "type": "boolean",
                "description": description.into(),
            }),
        );
        if required {
            self.required.push(name);
        }
        self
    }

    /// Finish building the schema.
    pub fn build(self) -> ToolSchema {
        ToolSchema {
            schema: serde_json::json!({
                "type": "object",
                "properties": serde_json::Value::Object(self.properties),
                "required": self.required,
            }),
        }
    }
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_object_input_when_schema_expects_object() {
        let schema = ToolSchema::from_schema(json!({ "type": "object", "properties": {}, "required": [] }));
        let input = json!("not an object");

        let result = schema.validate(&input);

        assert!(result.is_err());
        assert!(result.unwrap_err().contains("expected object"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = ToolSchema::from_schema(json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"],
        }));
        let input = json!({});

        let result = schema.validate(&input);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .contains("missing required field 'path'"));
    }

    #[test]
    fn accepts_valid_input_with_all_required_fields() {
        let schema = ToolSchema::from_schema(json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"],
        }));
        let input = json!({ "path": "test.txt" });

        assert!(schema.validate(&input).is_ok());
    }

    #[test]
    fn rejects_field_with_wrong_type() {
        let schema = ToolSchema::from_schema(json!({
            "type": "object",
            "properties": { "count": { "type": "integer" } },
            "required": ["count"],
        }));
        let input = json!({ "count": "not a number" });

        let err = schema.validate(&input).unwrap_err();
        assert!(err.contains("field 'count'"));
        assert!(err.contains("expected type 'integer'"));
    }

    #[test]
    fn accepts_extra_fields_not_in_schema_properties() {
        let schema = ToolSchema::from_schema(json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"],
        }));
        let input = json!({ "path": "test.txt", "extra": true });

        assert!(schema.validate(&input).is_ok());
    }

    #[test]
    fn accepts_any_input_when_schema_is_empty_object() {
        let schema = ToolSchema::from_schema(json!({}));
        let input = json!({ "anything": 42 });

        assert!(schema.validate(&input).is_ok());
    }

    #[test]
    fn builder_collects_properties_and_required() {
        let schema = ToolSchema::object()
            .string("path", "File path", true)
            .boolean("verbose", "Verbose output", false)
            .build();

        assert!(schema.validate(&json!({ "path": "a.txt" })).is_ok());
        assert!(schema.validate(&json!({})).is_err());
        assert!(schema
            .validate(&json!({ "path": "a.txt", "verbose": "yes" }))
            .is_err());
    }
}
