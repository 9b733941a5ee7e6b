//! Default conversion of DBGp property records.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use dbgp_proxy_core::{
    CacheConfig, ContextRef, ObjectId, PageRef, PagedWindow, PropertyConverter, RemoteObjectId,
    types::{
        PropertyDescriptor, PropertyEncoding, RawProperty, RawValue, RemoteValue, ValueSubtype,
        ValueType,
    },
};
use serde_json::Value;

use crate::paging::{ChildRange, split_window};

/// Name given to properties the engine sent without one.
pub const ANONYMOUS_PROPERTY: &str = "Anonymous Property";

/// Converts DBGp property records into front-end values.
///
/// Collections get a child reference in the owner's context: a single page
/// reference when every child fits in one engine page, otherwise a paged
/// window over all children.
#[derive(Debug, Clone, Default)]
pub struct DbgpConverter {
    config: CacheConfig,
}

impl DbgpConverter {
    /// Create a converter.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Convert one property fetched through `owner`.
    #[must_use]
    pub fn convert_property(&self, owner: &ObjectId, raw: &RawProperty) -> PropertyDescriptor {
        PropertyDescriptor {
            name: raw
                .name
                .clone()
                .unwrap_or_else(|| ANONYMOUS_PROPERTY.to_string()),
            value: self.property_value(owner, raw),
        }
    }

    fn property_value(&self, owner: &ObjectId, raw: &RawProperty) -> RemoteValue {
        let text = decoded_value(raw);
        match raw.type_name.as_str() {
            "string" => {
                let text = text.unwrap_or_default();
                RemoteValue {
                    value: Some(Value::String(text.clone())),
                    ..RemoteValue::described(ValueType::String, self.truncate(&text))
                }
            }
            "int" => {
                let text = text.unwrap_or_else(|| "0".to_string());
                let value = text.parse::<i64>().ok().map(Value::from);
                RemoteValue {
                    value,
                    ..RemoteValue::described(ValueType::Number, text)
                }
            }
            "float" => {
                let text = text.unwrap_or_else(|| "0".to_string());
                let value = text
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number);
                RemoteValue {
                    value,
                    ..RemoteValue::described(ValueType::Number, text)
                }
            }
            "bool" => {
                let flag = matches!(text.as_deref(), Some("1" | "true"));
                RemoteValue {
                    value: Some(Value::Bool(flag)),
                    ..RemoteValue::described(ValueType::Boolean, flag.to_string())
                }
            }
            "null" => RemoteValue {
                subtype: Some(ValueSubtype::Null),
                ..RemoteValue::described(ValueType::Object, "null")
            },
            "uninitialized" => RemoteValue::described(ValueType::Undefined, "undefined"),
            "array" => RemoteValue {
                subtype: Some(ValueSubtype::Array),
                object_id: self.child_reference(owner, raw),
                ..RemoteValue::described(
                    ValueType::Object,
                    format!("Array[{}]", raw.numchildren.unwrap_or(0)),
                )
            },
            "object" => RemoteValue {
                object_id: self.child_reference(owner, raw),
                ..RemoteValue::described(
                    ValueType::Object,
                    raw.classname.clone().unwrap_or_else(|| "Object".to_string()),
                )
            },
            "resource" => RemoteValue::described(
                ValueType::Object,
                text.unwrap_or_else(|| "resource".to_string()),
            ),
            other => RemoteValue {
                object_id: self.child_reference(owner, raw),
                ..RemoteValue::described(ValueType::Object, other)
            },
        }
    }

    fn child_reference(&self, owner: &ObjectId, raw: &RawProperty) -> Option<RemoteObjectId> {
        if !raw.children {
            return None;
        }
        // Without a fullname the children cannot be fetched.
        let fullname = raw.fullname.clone()?;
        let page_size = raw
            .pagesize
            .filter(|size| *size > 0)
            .unwrap_or(self.config.default_page_size)
            .max(1);
        let count = raw.numchildren.unwrap_or(0);
        let context = owner.context().clone();

        let id = if count > page_size {
            ObjectId::Paged {
                context,
                window: PagedWindow {
                    fullname,
                    page_size,
                    start_index: 0,
                    count,
                },
            }
        } else {
            ObjectId::SinglePage {
                context,
                page: PageRef { fullname, index: 0 },
            }
        };
        Some(id.encode())
    }

    fn truncate(&self, text: &str) -> String {
        let limit = self.config.max_string_length;
        match text.char_indices().nth(limit) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

impl PropertyConverter for DbgpConverter {
    fn convert_properties(
        &self,
        owner: &ObjectId,
        raw: Vec<RawProperty>,
    ) -> Vec<PropertyDescriptor> {
        raw.iter()
            .map(|property| self.convert_property(owner, property))
            .collect()
    }

    fn paged_properties(
        &self,
        context: &ContextRef,
        window: &PagedWindow,
    ) -> Vec<PropertyDescriptor> {
        split_window(window)
            .into_iter()
            .map(|range| {
                let name = range.label();
                let count = range.count();
                let id = match range {
                    ChildRange::Page { index, .. } => ObjectId::SinglePage {
                        context: context.clone(),
                        page: PageRef {
                            fullname: window.fullname.clone(),
                            index,
                        },
                    },
                    ChildRange::Window(sub) => ObjectId::Paged {
                        context: context.clone(),
                        window: sub,
                    },
                };
                PropertyDescriptor {
                    name,
                    value: RemoteValue {
                        subtype: Some(ValueSubtype::Array),
                        object_id: Some(id.encode()),
                        ..RemoteValue::described(ValueType::Object, format!("Array[{count}]"))
                    },
                }
            })
            .collect()
    }

    fn convert_value(&self, owner: &ObjectId, raw: RawValue) -> RemoteValue {
        match raw {
            RawValue::Property(property) => self.property_value(owner, &property),
            RawValue::Properties(mut properties) if properties.len() == 1 => {
                let property = properties.remove(0);
                self.property_value(owner, &property)
            }
            RawValue::Properties(properties) => RemoteValue {
                subtype: Some(ValueSubtype::Array),
                ..RemoteValue::described(ValueType::Object, format!("Array[{}]", properties.len()))
            },
            RawValue::Error { code, message } => {
                tracing::debug!(code, "evaluation returned an engine error");
                RemoteValue {
                    subtype: Some(ValueSubtype::Error),
                    ..RemoteValue::described(ValueType::Object, message)
                }
            }
        }
    }
}

fn decoded_value(raw: &RawProperty) -> Option<String> {
    let value = raw.value.as_deref()?;
    match raw.encoding {
        PropertyEncoding::None => Some(value.to_string()),
        PropertyEncoding::Base64 => match BASE64.decode(value.trim()) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                tracing::warn!(
                    property = raw.fullname.as_deref().unwrap_or_default(),
                    "undecodable base64 value: {e}"
                );
                Some(value.to_string())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locals() -> ObjectId {
        ObjectId::Context(ContextRef::new(2, 0, "0"))
    }

    fn converter() -> DbgpConverter {
        DbgpConverter::new(CacheConfig::default())
    }

    fn decode(value: &RemoteValue) -> ObjectId {
        ObjectId::decode(value.object_id.as_ref().unwrap()).unwrap()
    }

    #[test]
    fn test_scalars() {
        let props = converter().convert_properties(
            &locals(),
            vec![
                RawProperty::scalar("$count", "int", "42"),
                RawProperty::scalar("$ratio", "float", "0.5"),
                RawProperty::scalar("$ok", "bool", "1"),
                RawProperty::scalar("$nothing", "null", ""),
                RawProperty::scalar("$later", "uninitialized", ""),
            ],
        );

        assert_eq!(props[0].name, "$count");
        assert_eq!(props[0].value.value, Some(Value::from(42)));
        assert_eq!(props[1].value.value, Some(Value::from(0.5)));
        assert_eq!(props[2].value.description, "true");
        assert_eq!(props[3].value.subtype, Some(ValueSubtype::Null));
        assert_eq!(props[4].value.value_type, ValueType::Undefined);
        assert!(props.iter().all(|p| p.value.object_id.is_none()));
    }

    #[test]
    fn test_base64_string() {
        let raw = RawProperty {
            encoding: PropertyEncoding::Base64,
            ..RawProperty::scalar("$name", "string", "aMOpbGxv")
        };
        let prop = converter().convert_property(&locals(), &raw);
        assert_eq!(prop.value.description, "héllo");
        assert_eq!(prop.value.value, Some(Value::from("héllo")));
    }

    #[test]
    fn test_bad_base64_keeps_raw_text() {
        let raw = RawProperty {
            encoding: PropertyEncoding::Base64,
            ..RawProperty::scalar("$name", "string", "%%%")
        };
        assert_eq!(
            converter().convert_property(&locals(), &raw).value.description,
            "%%%"
        );
    }

    #[test]
    fn test_long_string_truncated_in_description_only() {
        let converter = DbgpConverter::new(CacheConfig {
            max_string_length: 4,
            ..CacheConfig::default()
        });
        let raw = RawProperty::scalar("$s", "string", "abcdefg");
        let prop = converter.convert_property(&locals(), &raw);
        assert_eq!(prop.value.description, "abcd...");
        assert_eq!(prop.value.value, Some(Value::from("abcdefg")));
    }

    #[test]
    fn test_small_array_gets_single_page_reference() {
        let raw = RawProperty::collection("$ids", "$ids", "array", 3);
        let value = converter().convert_property(&locals(), &raw).value;
        assert_eq!(value.description, "Array[3]");
        assert_eq!(
            decode(&value),
            ObjectId::SinglePage {
                context: ContextRef::new(2, 0, "0"),
                page: PageRef {
                    fullname: "$ids".to_string(),
                    index: 0,
                },
            }
        );
    }

    #[test]
    fn test_large_array_gets_paged_reference() {
        let raw = RawProperty {
            pagesize: Some(10),
            ..RawProperty::collection("$rows", "$rows", "array", 250)
        };
        let value = converter().convert_property(&locals(), &raw).value;
        assert_eq!(
            decode(&value),
            ObjectId::Paged {
                context: ContextRef::new(2, 0, "0"),
                window: PagedWindow {
                    fullname: "$rows".to_string(),
                    page_size: 10,
                    start_index: 0,
                    count: 250,
                },
            }
        );
    }

    #[test]
    fn test_object_described_by_class() {
        let raw = RawProperty {
            classname: Some("App\\User".to_string()),
            ..RawProperty::collection("$user", "$user", "object", 2)
        };
        let value = converter().convert_property(&locals(), &raw).value;
        assert_eq!(value.description, "App\\User");
        assert!(value.object_id.is_some());
    }

    #[test]
    fn test_empty_collection_has_no_reference() {
        let raw = RawProperty::collection("$empty", "$empty", "array", 0);
        let value = converter().convert_property(&locals(), &raw).value;
        assert_eq!(value.description, "Array[0]");
        assert!(value.object_id.is_none());
    }

    #[test]
    fn test_nameless_property() {
        let raw = RawProperty {
            name: None,
            ..RawProperty::scalar("x", "int", "1")
        };
        assert_eq!(
            converter().convert_property(&locals(), &raw).name,
            ANONYMOUS_PROPERTY
        );
    }

    #[test]
    fn test_missing_fullname_gets_no_reference() {
        let owner = ObjectId::SinglePage {
            context: ContextRef::new(2, 1, "1"),
            page: PageRef {
                fullname: "$user".to_string(),
                index: 0,
            },
        };
        for type_name in ["array", "object"] {
            let raw = RawProperty {
                fullname: None,
                ..RawProperty::collection("roles", "unused", type_name, 1)
            };
            let value = converter().convert_property(&owner, &raw).value;
            assert_eq!(value.object_id, None, "{type_name}");
        }
    }

    #[test]
    fn test_paged_properties_emit_ranges() {
        let context = ContextRef::new(2, 0, "0");
        let window = PagedWindow {
            fullname: "$rows".to_string(),
            page_size: 32,
            start_index: 0,
            count: 70,
        };
        let props = converter().paged_properties(&context, &window);
        let names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["[0..31]", "[32..63]", "[64..69]"]);
        assert_eq!(props[2].value.description, "Array[6]");
        assert_eq!(
            decode(&props[1].value),
            ObjectId::SinglePage {
                context,
                page: PageRef {
                    fullname: "$rows".to_string(),
                    index: 1,
                },
            }
        );
    }

    #[test]
    fn test_convert_value_variants() {
        let owner = ObjectId::Context(ContextRef::evaluation(2, 0));
        let converter = converter();

        let single = converter.convert_value(
            &owner,
            RawValue::Properties(vec![RawProperty::scalar("", "int", "7")]),
        );
        assert_eq!(single.value, Some(Value::from(7)));

        let error = converter.convert_value(
            &owner,
            RawValue::Error {
                code: 206,
                message: "syntax error".to_string(),
            },
        );
        assert_eq!(error.subtype, Some(ValueSubtype::Error));
        assert_eq!(error.description, "syntax error");

        let array = converter.convert_value(
            &owner,
            RawValue::Property(RawProperty::collection("", "$a + $b", "array", 2)),
        );
        assert!(decode(&array).context().is_evaluation());
    }
}
