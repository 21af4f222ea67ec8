use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettleError;
use crate::resource_data::MemoryResourceData;
use crate::schema::{AttributeSchema, SchemaMap, ValueType};
use crate::value::Value;

/// One resource instance's state as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StateSnapshot {
    pub id: String,
    #[serde(default)]
    pub tainted: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl StateSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SettleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettleError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Attribute values typed by `schema`: JSON arrays under set attributes
    /// become sets, nested blocks included.
    pub fn typed_attributes(&self, schema: &SchemaMap) -> BTreeMap<String, Value> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), typed_value(v.clone().into(), schema.get(k).map(shape))))
            .collect()
    }

    pub fn into_resource_data(self, schema: &SchemaMap) -> MemoryResourceData {
        let attributes = self.typed_attributes(schema);
        let mut data = MemoryResourceData::new(self.id);
        data.set_tainted(self.tainted);
        data.replace_attributes(attributes);
        data
    }
}

type Shape<'a> = (ValueType, Option<&'a SchemaMap>);

fn shape(schema: &AttributeSchema) -> Shape<'_> {
    (schema.value_type, schema.block().map(|b| &b.schema))
}

fn typed_value(value: Value, shape_hint: Option<Shape<'_>>) -> Value {
    let Some((value_type, block)) = shape_hint else {
        return value;
    };
    let items = match value {
        Value::List(items) => items,
        other => return other,
    };
    let items: Vec<Value> = match block {
        Some(children) => items
            .into_iter()
            .map(|item| match item {
                Value::Map(entries) => Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| {
                            let v = typed_value(v, children.get(&k).map(shape));
                            (k, v)
                        })
                        .collect(),
                ),
                other => other,
            })
            .collect(),
        None => items,
    };
    match value_type {
        ValueType::Set => Value::set(items),
        _ => Value::List(items),
    }
}
