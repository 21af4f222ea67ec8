use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AttributeSchema, DiffSuppress, Elem, SchemaMap, SetHash, ValueType};
use crate::error::SettleError;

/// JSON form of a resource schema, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument {
    pub attributes: BTreeMap<String, AttributeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct AttributeDocument {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_suppress: Option<SuppressKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<ElemDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressKind {
    EquivalentJson,
    CaseInsensitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElemDocument {
    Attribute(Box<AttributeDocument>),
    Block(BTreeMap<String, AttributeDocument>),
}

impl SchemaDocument {
    pub fn from_json(json: &str) -> Result<SchemaMap, SettleError> {
        let document: Self = serde_json::from_str(json)?;
        document.into_schema()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<SchemaMap, SettleError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn into_schema(self) -> Result<SchemaMap, SettleError> {
        build_map(self.attributes, "")
    }
}

fn build_map(
    attributes: BTreeMap<String, AttributeDocument>,
    prefix: &str,
) -> Result<SchemaMap, SettleError> {
    attributes
        .into_iter()
        .map(|(name, doc)| {
            let path = format!("{}{}", prefix, name);
            let schema = build_attribute(doc, &path)?;
            Ok((name, schema))
        })
        .collect()
}

fn build_attribute(doc: AttributeDocument, path: &str) -> Result<AttributeSchema, SettleError> {
    let mut schema = AttributeSchema::new(doc.value_type);
    schema.required = doc.required;
    schema.optional = doc.optional;
    schema.computed = doc.computed;
    schema.max_items = doc.max_items;

    if schema.required && schema.computed {
        return Err(SettleError::Schema(format!(
            "{}: required attributes cannot be computed",
            path
        )));
    }

    if let Some(keys) = doc.hash_keys {
        if doc.value_type != ValueType::Set {
            return Err(SettleError::Schema(format!(
                "{}: hash_keys is only valid on set attributes",
                path
            )));
        }
        schema.set_hash = Some(SetHash::keyed(keys));
    }

    schema.diff_suppress = doc.diff_suppress.map(|kind| match kind {
        SuppressKind::EquivalentJson => DiffSuppress::equivalent_json(),
        SuppressKind::CaseInsensitive => DiffSuppress::case_insensitive(),
    });

    if let Some(elem) = doc.elem {
        if !matches!(
            doc.value_type,
            ValueType::List | ValueType::Set | ValueType::Map
        ) {
            return Err(SettleError::Schema(format!(
                "{}: elem is only valid on list, set and map attributes",
                path
            )));
        }
        schema.elem = Some(match elem {
            ElemDocument::Attribute(inner) => {
                Elem::Attribute(Box::new(build_attribute(*inner, path)?))
            }
            ElemDocument::Block(children) => {
                Elem::Block(super::Block::new(build_map(children, &format!("{}.", path))?))
            }
        });
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    const ROUTING_QUEUE: &str = r#"{
        "name": { "type": "string", "required": true },
        "description": { "type": "string", "optional": true },
        "queue_id": { "type": "string", "computed": true },
        "email": { "type": "string", "optional": true, "diff_suppress": "case_insensitive" },
        "skills": { "type": "set", "optional": true, "elem": { "attribute": { "type": "string" } } },
        "members": {
            "type": "set",
            "optional": true,
            "hash_keys": ["user_id"],
            "elem": { "block": {
                "user_id": { "type": "string", "required": true },
                "ring_num": { "type": "int", "optional": true, "computed": true }
            } }
        }
    }"#;

    #[test]
    fn test_from_json_builds_schema() {
        let schema = SchemaDocument::from_json(ROUTING_QUEUE).unwrap();

        assert_eq!(schema.len(), 6);
        assert!(schema["name"].required);
        assert!(schema["queue_id"].computed);
        assert!(schema["email"].diff_suppress.is_some());
        assert!(schema["skills"].set_hash.is_none());
        assert!(schema["members"].set_hash.is_some());
        assert!(matches!(schema["skills"].elem, Some(Elem::Attribute(_))));

        let members = schema["members"].block().unwrap();
        assert!(members.schema["ring_num"].computed);
    }

    #[test]
    fn test_hash_keys_hash_only_named_keys() {
        let schema = SchemaDocument::from_json(ROUTING_QUEUE).unwrap();
        let hash = schema["members"].set_hash.as_ref().unwrap();

        let a = Value::map([("user_id", Value::from("u1")), ("ring_num", Value::Int(1))]);
        let b = Value::map([("user_id", Value::from("u1")), ("ring_num", Value::Int(2))]);
        assert_eq!(hash.hash(&a), hash.hash(&b));
    }

    #[test]
    fn test_unknown_type_is_json_error() {
        let err = SchemaDocument::from_json(r#"{"name": {"type": "text"}}"#).unwrap_err();
        assert!(matches!(err, SettleError::Json(_)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = SchemaDocument::from_json(r#"{"name": {"type": "string", "sensitive": true}}"#)
            .unwrap_err();
        assert!(matches!(err, SettleError::Json(_)));
    }

    #[test]
    fn test_hash_keys_on_list_is_schema_error() {
        let err = SchemaDocument::from_json(r#"{"ids": {"type": "list", "hash_keys": ["id"]}}"#)
            .unwrap_err();
        match err {
            SettleError::Schema(msg) => assert!(msg.contains("ids: hash_keys")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_error_reports_path() {
        let json = r#"{
            "routing": { "type": "list", "elem": { "block": {
                "rule": { "type": "string", "required": true, "computed": true }
            } } }
        }"#;
        let err = SchemaDocument::from_json(json).unwrap_err();
        assert!(err.to_string().contains("routing.rule"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, ROUTING_QUEUE).unwrap();

        let schema = SchemaDocument::load(&path).unwrap();
        assert!(schema.contains_key("members"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SchemaDocument::load("/nonexistent/schema.json").unwrap_err();
        assert!(matches!(err, SettleError::Io(_)));
    }
}
