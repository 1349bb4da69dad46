//! Manifest data model.
//!
//! Mirrors the on-disk manifest shape exactly; field names are camelCase
//! on the wire (`minLength`, `modelRef`, ...). Parsing and validation live
//! in [`validator`](super::validator); these types stay dumb.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level API manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest schema version. Must be non-empty.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Request name -> definition.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, RequestDef>,
    /// Reusable model name -> definition, referenced via `modelRef`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, ModelDef>,
}

/// One named request the API exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDef {
    /// Required, non-empty human description.
    #[serde(default)]
    pub description: String,
    /// Argument name -> definition.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgumentDef>,
    /// Shape of the success result, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ArgumentDef>,
    /// Error codes this request may produce.
    #[serde(
        rename = "errorCodes",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub error_codes: Vec<i64>,
    /// Per-request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// JSON type tag for arguments, responses and model properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ArgumentType {
    /// The tag as it appears in manifests and violation messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ArgumentType::String => "string",
            ArgumentType::Number => "number",
            ArgumentType::Integer => "integer",
            ArgumentType::Boolean => "boolean",
            ArgumentType::Array => "array",
            ArgumentType::Object => "object",
        }
    }
}

impl std::fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one argument, response shape or model property.
///
/// Constraint fields only make sense for certain types (`pattern` for
/// strings, `minimum` for numerics, ...); unrelated constraints are
/// ignored at runtime, not rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentDef {
    #[serde(rename = "type")]
    pub arg_type: ArgumentType,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Regular expression a string value must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Closed set of permitted values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Name of a model in [`Manifest::models`] supplying the shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    /// Element shape for arrays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ArgumentDef>>,
    /// Property shapes for inline objects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ArgumentDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArgumentDef {
    /// A bare definition of the given type; constraints default to absent.
    pub fn of_type(arg_type: ArgumentType) -> Self {
        Self {
            arg_type,
            required: false,
            default: None,
            pattern: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            enum_values: None,
            model_ref: None,
            items: None,
            properties: BTreeMap::new(),
            description: None,
        }
    }
}

/// Reusable named shape, referenced from arguments via `modelRef`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDef {
    #[serde(rename = "type")]
    pub model_type: ArgumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ArgumentDef>,
    /// Property names that must be present and non-null.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Parent model whose properties and required list are inherited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Element shape when the model is an array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ArgumentDef>>,
}
