//! Represents an MCP tool

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::types::{Content, Cursor, ProgressToken};

/// List of commands for Tools
pub mod commands {
    pub const LIST: &str = "tools/list";
    pub const LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const CALL: &str = "tools/call";
}

/// JSON schema property categories supported by tool input schemas.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    /// A string property
    String,
    /// A numeric property
    Number,
    /// A boolean property
    Boolean,
    /// An array property
    Array,
    /// An object property
    #[default]
    Object,
}

/// Represents a tool that the server is capable of calling.
/// Part of the [`ListToolsResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// The name of the tool.
    pub name: String,

    /// A human-readable description of the tool.
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// A JSON Schema object defining the expected parameters for the tool.
    ///
    /// > Note: always of type `object`.
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolSchema,
}

/// The input schema of a [`Tool`]: an object schema whose `required` list
/// aggregates the properties flagged required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Schema object type
    ///
    /// > Note: always "object"
    #[serde(rename = "type", default)]
    pub r#type: PropertyType,

    /// Declared properties by name
    #[serde(default)]
    pub properties: HashMap<String, SchemaProperty>,

    /// Names of required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// A single property of a [`ToolSchema`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaProperty {
    /// Property type
    #[serde(rename = "type", default)]
    pub r#type: PropertyType,

    /// A human-readable description of the property
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// Default value applied when the caller omits the property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Element schema for array properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,

    #[serde(skip)]
    required: bool,
}

impl Default for ToolSchema {
    #[inline]
    fn default() -> Self {
        Self {
            r#type: PropertyType::Object,
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }
}

impl ToolSchema {
    /// Creates a new empty object schema
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a property. A property flagged required is also
    /// aggregated into the schema's `required` list.
    pub fn add_property(mut self, name: &str, property: SchemaProperty) -> Self {
        if property.required && !self.required.iter().any(|n| n == name) {
            self.required.push(name.into());
        }
        self.properties.insert(name.into(), property);
        self
    }
}

impl SchemaProperty {
    fn of_type(r#type: PropertyType) -> Self {
        Self {
            r#type,
            descr: None,
            default: None,
            items: None,
            required: false,
        }
    }

    /// Creates a string property
    #[inline]
    pub fn string() -> Self {
        Self::of_type(PropertyType::String)
    }

    /// Creates a number property
    #[inline]
    pub fn number() -> Self {
        Self::of_type(PropertyType::Number)
    }

    /// Creates a boolean property
    #[inline]
    pub fn boolean() -> Self {
        Self::of_type(PropertyType::Boolean)
    }

    /// Creates an array property with the given element schema
    #[inline]
    pub fn array(items: SchemaProperty) -> Self {
        let mut property = Self::of_type(PropertyType::Array);
        property.items = Some(Box::new(items));
        property
    }

    /// Creates an object property
    #[inline]
    pub fn object() -> Self {
        Self::of_type(PropertyType::Object)
    }

    /// Sets the description
    pub fn with_descr(mut self, descr: &str) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Sets the default value
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Flags the property as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl Tool {
    /// Creates a new [`Tool`] with an empty input schema
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            descr: None,
            input_schema: ToolSchema::new(),
        }
    }

    /// Sets the description
    pub fn with_descr(mut self, descr: &str) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Configures the input schema
    pub fn with_schema<F>(mut self, config: F) -> Self
    where
        F: FnOnce(ToolSchema) -> ToolSchema
    {
        self.input_schema = config(self.input_schema);
        self
    }
}

/// Metadata attached to request params under `_meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestParamsMeta {
    /// Token the caller wants echoed on progress notifications
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
}

/// Sent from the client to request a list of tools the server has.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListToolsRequestParams {
    /// An opaque token representing the current pagination position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// A response to a `tools/list` request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools in registration order
    pub tools: Vec<Tool>,

    /// An opaque token representing the pagination position after the last
    /// returned result; absent when there is no further page.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Used by the client to invoke a tool provided by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequestParams {
    /// Tool name.
    pub name: String,

    /// Optional arguments to pass to the tool.
    #[serde(rename = "arguments", skip_serializing_if = "Option::is_none")]
    pub args: Option<HashMap<String, Value>>,

    /// Metadata related to the request, such as a progress token.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestParamsMeta>,
}

impl CallToolRequestParams {
    /// Creates params for calling `name`
    pub fn new(name: &str) -> Self {
        Self { name: name.into(), args: None, meta: None }
    }

    /// Adds an argument
    pub fn with_arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Returns the arguments, substituting an empty map when absent
    /// so handlers never observe a missing map.
    #[inline]
    pub fn arguments(&self) -> HashMap<String, Value> {
        self.args
            .clone()
            .unwrap_or_default()
    }
}

/// The result of a `tools/call` request.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CallToolResponse {
    /// Content items produced by the tool
    pub content: Vec<Content>,

    /// Set when the tool itself failed; the envelope is still a success
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResponse {
    /// Creates a single-text-item response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: None,
        }
    }
}

impl From<String> for CallToolResponse {
    #[inline]
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for CallToolResponse {
    #[inline]
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<Content> for CallToolResponse {
    #[inline]
    fn from(content: Content) -> Self {
        Self { content: vec![content], is_error: None }
    }
}

impl From<Vec<Content>> for CallToolResponse {
    #[inline]
    fn from(content: Vec<Content>) -> Self {
        Self { content, is_error: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_aggregates_required_properties() {
        let schema = ToolSchema::new()
            .add_property("name", SchemaProperty::string().required())
            .add_property("stages", SchemaProperty::number().with_default(3));

        assert_eq!(schema.required, vec!["name"]);
        assert_eq!(schema.properties.len(), 2);
        assert_eq!(schema.properties["stages"].default, Some(serde_json::json!(3)));
    }

    #[test]
    fn it_serializes_schema_as_object_type() {
        let tool = Tool::new("greet")
            .with_descr("Greets a user")
            .with_schema(|schema| schema
                .add_property("name", SchemaProperty::string().required()));

        let json = serde_json::to_value(&tool).unwrap();

        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["inputSchema"]["properties"]["name"]["type"], "string");
        assert_eq!(json["inputSchema"]["required"][0], "name");
    }

    #[test]
    fn it_survives_schema_round_trip() {
        let tool = Tool::new("calc")
            .with_schema(|schema| schema
                .add_property("values", SchemaProperty::array(SchemaProperty::number())));

        let json = serde_json::to_string(&tool).unwrap();
        let parsed: Tool = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.name, "calc");
        assert_eq!(
            parsed.input_schema.properties["values"].items.as_ref().unwrap().r#type,
            PropertyType::Number);
    }

    #[test]
    fn it_substitutes_empty_arguments_map() {
        let params = CallToolRequestParams::new("greet");

        assert!(params.arguments().is_empty());
    }

    #[test]
    fn it_builds_arguments() {
        let params = CallToolRequestParams::new("greet")
            .with_arg("name", "MCP User");

        assert_eq!(params.arguments()["name"], "MCP User");
    }
}
