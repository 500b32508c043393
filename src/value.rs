//! Native values produced by payload conversion.
//!
//! An [`Instance`] is a typed record: its values are keyed by member name
//! (not wire name) and already coerced to the member's declared type.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::descriptor::CollectionShape;
use crate::error::ConvertError;
use crate::types::{EntryAnnotations, Payload};

/// A resolved enumeration member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub enum_name: String,
    pub name: String,
    pub value: i64,
}

/// A value converted to its declared native type.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Enum(EnumValue),
    Record(Instance),
    List {
        shape: CollectionShape,
        items: Vec<Native>,
    },
    Map(Payload),
    Annotations(EntryAnnotations),
}

impl Native {
    /// Carry a wire value over without any declared-type coercion.
    pub fn from_wire(value: &Value) -> Self {
        match value {
            Value::Null => Native::Null,
            Value::Bool(b) => Native::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Native::Int(i),
                None => n.as_f64().map(Native::Float).unwrap_or(Native::Null),
            },
            Value::String(s) => Native::Text(s.clone()),
            Value::Array(items) => Native::List {
                shape: CollectionShape::List,
                items: items.iter().map(Native::from_wire).collect(),
            },
            Value::Object(map) => Native::Map(map.clone()),
        }
    }

    /// Plain JSON form, with records keyed by member name.
    pub fn to_json(&self) -> Value {
        match self {
            Native::Null => Value::Null,
            Native::Bool(b) => Value::Bool(*b),
            Native::Int(i) => Value::Number((*i).into()),
            Native::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Native::Text(s) => Value::String(s.clone()),
            Native::Enum(e) => Value::String(e.name.clone()),
            Native::Record(instance) => instance.to_json(),
            Native::List { items, .. } => Value::Array(items.iter().map(Native::to_json).collect()),
            Native::Map(map) => Value::Object(map.clone()),
            Native::Annotations(a) => a.to_value(),
        }
    }

    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Native::Null => "null",
            Native::Bool(_) => "bool",
            Native::Int(_) => "int",
            Native::Float(_) => "float",
            Native::Text(_) => "text",
            Native::Enum(_) => "enum",
            Native::Record(_) => "record",
            Native::List { .. } => "list",
            Native::Map(_) => "map",
            Native::Annotations(_) => "annotations",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Native::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Native::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Native::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Native::Float(f) => Some(*f),
            Native::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Native::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Native::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Instance> {
        match self {
            Native::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Native]> {
        match self {
            Native::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Payload> {
        match self {
            Native::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_annotations(&self) -> Option<&EntryAnnotations> {
        match self {
            Native::Annotations(a) => Some(a),
            _ => None,
        }
    }
}

impl From<bool> for Native {
    fn from(value: bool) -> Self {
        Native::Bool(value)
    }
}

impl From<i64> for Native {
    fn from(value: i64) -> Self {
        Native::Int(value)
    }
}

impl From<i32> for Native {
    fn from(value: i32) -> Self {
        Native::Int(value.into())
    }
}

impl From<f64> for Native {
    fn from(value: f64) -> Self {
        Native::Float(value)
    }
}

impl From<&str> for Native {
    fn from(value: &str) -> Self {
        Native::Text(value.to_string())
    }
}

impl From<String> for Native {
    fn from(value: String) -> Self {
        Native::Text(value)
    }
}

impl From<Instance> for Native {
    fn from(value: Instance) -> Self {
        Native::Record(value)
    }
}

impl From<Payload> for Native {
    fn from(value: Payload) -> Self {
        Native::Map(value)
    }
}

impl From<EnumValue> for Native {
    fn from(value: EnumValue) -> Self {
        Native::Enum(value)
    }
}

/// A native record of a registered type.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    type_name: String,
    values: IndexMap<String, Native>,
}

impl Instance {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: IndexMap::new(),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, member: impl Into<String>, value: impl Into<Native>) -> Self {
        self.set(member, value);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, member: &str) -> Option<&Native> {
        self.values.get(member)
    }

    pub fn get_mut(&mut self, member: &str) -> Option<&mut Native> {
        self.values.get_mut(member)
    }

    pub fn set(&mut self, member: impl Into<String>, value: impl Into<Native>) {
        self.values.insert(member.into(), value.into());
    }

    /// Member values in assignment order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Native)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Contents of a map-valued member, such as a dynamic property bag.
    pub fn map(&self, member: &str) -> Option<&Payload> {
        self.get(member).and_then(Native::as_map)
    }

    /// Plain JSON object keyed by member name.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.values {
            map.insert(name.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Deserialize this record into an ordinary serde type.
    ///
    /// Field names of `T` are matched against member names.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, ConvertError> {
        serde_json::from_value(self.to_json()).map_err(|source| ConvertError::Serde {
            type_name: self.type_name.clone(),
            source,
        })
    }
}
