//! Attribute schemas, the subset of Terraform's `schema.Schema` the consistency
//! checker reads.

pub mod document;

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub use document::SchemaDocument;

pub type SchemaMap = BTreeMap<String, AttributeSchema>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    List,
    Set,
    Map,
}

#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub max_items: Option<usize>,
    pub set_hash: Option<SetHash>,
    pub diff_suppress: Option<DiffSuppress>,
    pub elem: Option<Elem>,
}

/// Element schema of a list, set or map attribute.
#[derive(Debug, Clone)]
pub enum Elem {
    Attribute(Box<AttributeSchema>),
    Block(Block),
}

/// A nested sub-resource.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub schema: SchemaMap,
}

impl Block {
    pub fn new(schema: SchemaMap) -> Self {
        Self { schema }
    }
}

impl AttributeSchema {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: false,
            computed: false,
            max_items: None,
            set_hash: None,
            diff_suppress: None,
            elem: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_set_hash(mut self, hash: SetHash) -> Self {
        self.set_hash = Some(hash);
        self
    }

    pub fn with_diff_suppress(mut self, suppress: DiffSuppress) -> Self {
        self.diff_suppress = Some(suppress);
        self
    }

    pub fn with_elem(mut self, elem: AttributeSchema) -> Self {
        self.elem = Some(Elem::Attribute(Box::new(elem)));
        self
    }

    pub fn with_block(mut self, schema: SchemaMap) -> Self {
        self.elem = Some(Elem::Block(Block::new(schema)));
        self
    }

    /// Nested sub-resource schema, if the element is a block with attributes.
    pub fn block(&self) -> Option<&Block> {
        match &self.elem {
            Some(Elem::Block(block)) if !block.schema.is_empty() => Some(block),
            _ => None,
        }
    }
}

/// Hash function deciding set membership.
#[derive(Clone)]
pub struct SetHash(Arc<dyn Fn(&Value) -> u64 + Send + Sync>);

impl SetHash {
    pub fn new(f: impl Fn(&Value) -> u64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Hashes the element's full canonical form.
    pub fn canonical() -> Self {
        Self::new(canonical_hash)
    }

    /// Hashes only `keys` of a block element. Non-map elements hash whole.
    pub fn keyed<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        Self::new(move |value| match value {
            Value::Map(entries) => {
                let mut hasher = DefaultHasher::new();
                for key in &keys {
                    key.hash(&mut hasher);
                    hash_into(entries.get(key).unwrap_or(&Value::Null), &mut hasher);
                }
                hasher.finish()
            }
            other => canonical_hash(other),
        })
    }

    pub fn hash(&self, value: &Value) -> u64 {
        (self.0)(value)
    }
}

impl fmt::Debug for SetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SetHash(..)")
    }
}

pub fn canonical_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_into(value, &mut hasher);
    hasher.finish()
}

fn hash_into<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Int(i) => {
            2u8.hash(state);
            i.hash(state);
        }
        Value::Float(x) => {
            3u8.hash(state);
            x.to_bits().hash(state);
        }
        Value::String(s) => {
            4u8.hash(state);
            s.hash(state);
        }
        Value::List(items) => {
            5u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_into(item, state);
            }
        }
        Value::Set(items) => {
            6u8.hash(state);
            let mut hashes: Vec<u64> = items.iter().map(canonical_hash).collect();
            hashes.sort_unstable();
            hashes.hash(state);
        }
        Value::Map(entries) => {
            7u8.hash(state);
            entries.len().hash(state);
            for (k, v) in entries {
                k.hash(state);
                hash_into(v, state);
            }
        }
    }
}

/// Predicate reporting two string values as equivalent: `(key, old, new)`.
#[derive(Clone)]
pub struct DiffSuppress(Arc<dyn Fn(&str, &str, &str) -> bool + Send + Sync>);

impl DiffSuppress {
    pub fn new(f: impl Fn(&str, &str, &str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Two JSON documents that parse to the same value.
    pub fn equivalent_json() -> Self {
        Self::new(|_, old, new| {
            match (
                serde_json::from_str::<serde_json::Value>(old),
                serde_json::from_str::<serde_json::Value>(new),
            ) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        })
    }

    pub fn case_insensitive() -> Self {
        Self::new(|_, old, new| old.eq_ignore_ascii_case(new))
    }

    pub fn suppresses(&self, key: &str, old: &str, new: &str) -> bool {
        (self.0)(key, old, new)
    }
}

impl fmt::Debug for DiffSuppress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiffSuppress(..)")
    }
}
