//! Raw engine records and front-end descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RemoteObjectId;

/// A context (scope) reported by the engine for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineContext {
    /// Display name, e.g. "Locals".
    pub name: String,
    /// Engine context id, e.g. "0".
    pub id: String,
}

impl EngineContext {
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// How a raw property value is encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyEncoding {
    #[default]
    None,
    Base64,
}

/// A property record as returned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProperty {
    /// Short name within the parent, e.g. `$count` or `3`.
    #[serde(default)]
    pub name: Option<String>,
    /// Full path usable to fetch the property again.
    #[serde(default)]
    pub fullname: Option<String>,
    /// Engine type, e.g. `int`, `string`, `array`, `object`.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub classname: Option<String>,
    /// Whether the property has children.
    #[serde(default)]
    pub children: bool,
    #[serde(default)]
    pub numchildren: Option<u32>,
    /// Page of children included in `properties`.
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub pagesize: Option<u32>,
    #[serde(default)]
    pub encoding: PropertyEncoding,
    #[serde(default)]
    pub value: Option<String>,
    /// Inline children, if the engine sent any.
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

impl RawProperty {
    /// A childless property with a plain (unencoded) value.
    #[must_use]
    pub fn scalar(name: &str, type_name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            fullname: Some(name.to_string()),
            type_name: type_name.to_string(),
            value: Some(value.to_string()),
            ..Self::default()
        }
    }

    /// A collection property with `numchildren` children.
    #[must_use]
    pub fn collection(name: &str, fullname: &str, type_name: &str, numchildren: u32) -> Self {
        Self {
            name: Some(name.to_string()),
            fullname: Some(fullname.to_string()),
            type_name: type_name.to_string(),
            children: numchildren > 0,
            numchildren: Some(numchildren),
            ..Self::default()
        }
    }
}

/// Raw result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Property(RawProperty),
    Properties(Vec<RawProperty>),
    /// Engine-side error, reported when the evaluation threw.
    Error { code: u32, message: String },
}

/// Raw evaluation response from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub result: RawValue,
    pub was_thrown: bool,
}

/// Display classification of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Local,
    Global,
}

/// A scope of a frame, as given to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDescriptor {
    pub name: String,
    pub object_id: RemoteObjectId,
    pub kind: ScopeKind,
}

/// Broad type of a converted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Object,
    String,
    Number,
    Boolean,
    Undefined,
}

/// Refinement of [`ValueType::Object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSubtype {
    Array,
    Null,
    Error,
}

/// A value as given to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteValue {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<ValueSubtype>,
    pub description: String,
    /// Primitive value, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Reference for fetching children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<RemoteObjectId>,
}

impl RemoteValue {
    /// A value with only a type and description.
    #[must_use]
    pub fn described(value_type: ValueType, description: impl Into<String>) -> Self {
        Self {
            value_type,
            subtype: None,
            description: description.into(),
            value: None,
            object_id: None,
        }
    }
}

/// A named property as given to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value: RemoteValue,
}

/// Converted evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedValue {
    pub result: RemoteValue,
    pub was_thrown: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_property_from_engine_json() {
        let raw: RawProperty = serde_json::from_str(
            r#"{"name":"$name","fullname":"$name","type":"string","encoding":"base64","value":"Ym9i"}"#,
        )
        .unwrap();
        assert_eq!(raw.type_name, "string");
        assert_eq!(raw.encoding, PropertyEncoding::Base64);
        assert!(!raw.children);
        assert!(raw.properties.is_empty());
    }

    #[test]
    fn test_raw_value_untagged() {
        let error: RawValue =
            serde_json::from_str(r#"{"code":206,"message":"error evaluating code"}"#).unwrap();
        assert_eq!(
            error,
            RawValue::Error {
                code: 206,
                message: "error evaluating code".to_string()
            }
        );

        let list: RawValue = serde_json::from_str(r#"[{"type":"int","value":"1"}]"#).unwrap();
        assert!(matches!(list, RawValue::Properties(ref props) if props.len() == 1));
    }

    #[test]
    fn test_scope_descriptor_serialization() {
        let scope = ScopeDescriptor {
            name: "Locals".to_string(),
            object_id: RemoteObjectId::new("id"),
            kind: ScopeKind::Local,
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Locals", "objectId": "id", "kind": "local"})
        );
    }
}
