//! Descriptor model: the serializable metadata for tools and resources.
//!
//! A descriptor is an immutable value object created once per handler at
//! bootstrap. The only way to change one is to register a new descriptor
//! under the same name, which replaces it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::handler::HandlerRef;

// ---------------------------------------------------------------------------
// ParamType / ParameterDescriptor
// ---------------------------------------------------------------------------

/// JSON-level type of a parameter as advertised to the remote caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema entry for one named parameter slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParameterDescriptor {
    pub fn new(param_type: ParamType, description: impl Into<String>, required: bool) -> Self {
        Self {
            param_type,
            description: description.into(),
            required,
        }
    }

    /// Form used for resource path parameters that match no handler argument.
    pub fn unresolved_path_param() -> Self {
        Self::new(ParamType::String, "", true)
    }
}

// ---------------------------------------------------------------------------
// InputSchema
// ---------------------------------------------------------------------------

/// Object schema describing a tool's input.
///
/// `required` keeps declaration order and only ever names keys that exist
/// in `properties`; `insert` maintains both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    properties: BTreeMap<String, ParameterDescriptor>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a property. Its `required` flag decides membership in
    /// the required list.
    pub fn insert(&mut self, name: impl Into<String>, descriptor: ParameterDescriptor) {
        let name = name.into();
        self.required.retain(|r| r != &name);
        if descriptor.required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, descriptor);
    }

    pub fn with_property(mut self, name: impl Into<String>, descriptor: ParameterDescriptor) -> Self {
        self.insert(name, descriptor);
        self
    }

    pub fn properties(&self) -> &BTreeMap<String, ParameterDescriptor> {
        &self.properties
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.properties.get(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// JSON Schema rendering: `{type: "object", properties, required}`.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, p)| {
                (
                    name.clone(),
                    json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

// ---------------------------------------------------------------------------
// OutputHint
// ---------------------------------------------------------------------------

/// Informational shape of a handler's return value.
///
/// Never validated against actual results and never exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputHint {
    /// Primitive return: a single `result` field of this type.
    Result(ParamType),
    /// Structured return: one field per accessible member.
    Fields(BTreeMap<String, ParamType>),
    /// Structured return without accessible members.
    Opaque,
}

// ---------------------------------------------------------------------------
// CapabilityKind
// ---------------------------------------------------------------------------

/// Which catalog map a capability lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Tool,
    Resource,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool => f.write_str("tool"),
            Self::Resource => f.write_str("resource"),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolDescriptor
// ---------------------------------------------------------------------------

/// Descriptor of an invocable tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Unique, snake_case, non-empty.
    pub name: String,
    pub description: String,
    pub example: Option<String>,
    pub input_schema: InputSchema,
    pub output_hint: Option<OutputHint>,
    /// Dispatch binding. `None` for schema-only (legacy) registrations.
    pub handler: Option<HandlerRef>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("example", &self.example)
            .field("input_schema", &self.input_schema)
            .field("output_hint", &self.output_hint)
            .field("handler", &self.handler.as_ref().map(|h| h.ident.as_str()))
            .finish()
    }
}

impl ToolDescriptor {
    /// Descriptor registered only for schema/documentation purposes.
    pub fn schema_only(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            example: None,
            input_schema,
            output_hint: None,
            handler: None,
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn is_dispatchable(&self) -> bool {
        self.handler.is_some()
    }

    /// Exported form. The output hint is deliberately left out.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("description".into(), Value::String(self.description.clone()));
        if let Some(example) = &self.example {
            obj.insert("example".into(), Value::String(example.clone()));
        }
        obj.insert("inputSchema".into(), self.input_schema.to_json());
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// ResourceDescriptor
// ---------------------------------------------------------------------------

/// Descriptor of a queryable resource addressed by a URI template.
#[derive(Clone)]
pub struct ResourceDescriptor {
    /// Unique within resources.
    pub name: String,
    pub description: String,
    /// e.g. `unity://object/{object_id}`
    pub uri_template: String,
    pub mime_type: String,
    /// One entry per `{token}` in `uri_template`, keyed by the token text.
    pub parameters: BTreeMap<String, ParameterDescriptor>,
    pub example: Option<String>,
    pub output_hint: Option<OutputHint>,
    pub handler: Option<HandlerRef>,
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("uri_template", &self.uri_template)
            .field("mime_type", &self.mime_type)
            .field("parameters", &self.parameters)
            .field("example", &self.example)
            .field("handler", &self.handler.as_ref().map(|h| h.ident.as_str()))
            .finish()
    }
}

impl ResourceDescriptor {
    pub fn is_dispatchable(&self) -> bool {
        self.handler.is_some()
    }

    /// Exported form: `uri` only, never `urlPattern`.
    pub fn to_json(&self) -> Value {
        let parameters: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, p)| {
                (
                    name.clone(),
                    json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                        "required": p.required,
                    }),
                )
            })
            .collect();

        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("description".into(), Value::String(self.description.clone()));
        obj.insert("uri".into(), Value::String(self.uri_template.clone()));
        obj.insert("mimeType".into(), Value::String(self.mime_type.clone()));
        obj.insert("parameters".into(), Value::Object(parameters));
        if let Some(example) = &self.example {
            obj.insert("example".into(), Value::String(example.clone()));
        }
        Value::Object(obj)
    }
}
