//! Object/map conversion.
//!
//! Turns wire payloads into typed [`Native`] values guided by the type
//! registry, and flattens [`Instance`]s back into payloads keyed by wire name.
//!
//! Conversion is lenient: entries that match neither a member nor a dynamic
//! property bag are dropped, unrecognised type annotations leave the declared
//! type in place, and primitives that cannot be coerced keep their wire form.
//! Each of these emits a `tracing` warning or debug event.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::descriptor::{CollectionShape, FieldType, MemberDef, TypeDescriptor};
use crate::error::ConvertError;
use crate::session::Session;
use crate::types::{json_type_name, EntryAnnotations, Payload};
use crate::value::{EnumValue, Instance, Native};

/// Custom conversion from a payload to a native value, registered per type.
pub trait PayloadConverter: Send + Sync {
    fn convert(&self, payload: &Payload) -> Result<Native, ConvertError>;
}

impl<F> PayloadConverter for F
where
    F: Fn(&Payload) -> Result<Native, ConvertError> + Send + Sync,
{
    fn convert(&self, payload: &Payload) -> Result<Native, ConvertError> {
        self(payload)
    }
}

/// Payload converters keyed by target type name.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn PayloadConverter>>,
}

impl ConverterRegistry {
    pub fn register(&mut self, type_name: impl Into<String>, converter: Arc<dyn PayloadConverter>) {
        self.converters.insert(type_name.into(), converter);
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn PayloadConverter>> {
        self.converters.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.converters.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.converters.keys().collect();
        names.sort();
        f.debug_struct("ConverterRegistry")
            .field("types", &names)
            .finish()
    }
}

/// Converter bound to a session's settings and type registry.
#[derive(Debug, Clone, Copy)]
pub struct Converter<'a> {
    session: &'a Session,
}

impl<'a> Converter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Convert a payload to the native form of `target`.
    ///
    /// Map-shaped targets get the payload back unchanged.
    ///
    /// # Errors
    ///
    /// `StructuralToScalar` when `target` is a primitive, enum or collection.
    pub fn to_object(&self, payload: &Payload, target: &FieldType) -> Result<Native, ConvertError> {
        match target {
            FieldType::Map | FieldType::Any => Ok(Native::Map(payload.clone())),
            FieldType::Record(type_name) => self.to_native(payload, type_name),
            FieldType::Annotations => Ok(Native::Annotations(
                EntryAnnotations::from_value(&Value::Object(payload.clone())).unwrap_or_default(),
            )),
            scalar => Err(ConvertError::StructuralToScalar {
                target: scalar.describe(),
            }),
        }
    }

    /// Convert a payload to a record of `type_name` (or of a type its
    /// annotations point to).
    pub fn to_record(&self, payload: &Payload, type_name: &str) -> Result<Instance, ConvertError> {
        match self.to_native(payload, type_name)? {
            Native::Record(instance) => Ok(instance),
            other => Err(ConvertError::NotAnObject {
                type_name: type_name.to_string(),
                actual: other.kind_name().to_string(),
            }),
        }
    }

    /// Convert any serializable value to a record of `type_name`.
    pub fn from_serialize<T: Serialize>(
        &self,
        value: &T,
        type_name: &str,
    ) -> Result<Instance, ConvertError> {
        let value = serde_json::to_value(value).map_err(|source| ConvertError::Serde {
            type_name: type_name.to_string(),
            source,
        })?;
        match value {
            Value::Object(payload) => self.to_record(&payload, type_name),
            other => Err(ConvertError::NotAnObject {
                type_name: type_name.to_string(),
                actual: json_type_name(&other).to_string(),
            }),
        }
    }

    /// Flatten a record into a payload keyed by wire name.
    ///
    /// Every mapped member is emitted, nulls included; the annotations
    /// member never is.
    pub fn to_dictionary(&self, instance: &Instance) -> Result<Payload, ConvertError> {
        let descriptor = self.session.types().describe(instance.type_name())?;
        let mut payload = Payload::new();
        for (wire_name, member) in descriptor.mapped_members() {
            let value = match instance.get(&member.name) {
                Some(native) => self.to_wire(native)?,
                None => Value::Null,
            };
            payload.insert(wire_name.to_string(), value);
        }
        Ok(payload)
    }

    fn to_wire(&self, native: &Native) -> Result<Value, ConvertError> {
        match native {
            Native::Record(instance) => self.to_dictionary(instance).map(Value::Object),
            Native::List { items, .. } => items
                .iter()
                .map(|item| self.to_wire(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.to_json()),
        }
    }

    fn to_native(&self, payload: &Payload, type_name: &str) -> Result<Native, ConvertError> {
        let settings = self.session.settings();
        let type_name = match payload.get(&settings.annotations_field) {
            Some(annotations) => self.annotated_type(annotations, type_name)?,
            None => type_name.to_string(),
        };

        if let Some(converter) = settings.converters.get(&type_name) {
            return converter.convert(payload);
        }

        let descriptor = self.session.types().describe(&type_name)?;
        if descriptor.is_anonymous() {
            return self.construct(payload, &descriptor).map(Native::Record);
        }
        self.populate(payload, &descriptor).map(Native::Record)
    }

    /// The type a payload's annotations narrow `declared` to.
    fn annotated_type(&self, annotations: &Value, declared: &str) -> Result<String, ConvertError> {
        let Some(hint) = EntryAnnotations::from_value(annotations)
            .and_then(|a| a.type_name)
            .filter(|t| !t.is_empty())
        else {
            return Ok(declared.to_string());
        };

        let types = self.session.types();
        if !types.is_defined(declared) {
            return Ok(declared.to_string());
        }
        let matcher = &self.session.settings().name_matcher;
        let descriptor = types.describe(declared)?;
        if matcher.is_entity_type_match(&hint, descriptor.mapped_name()) {
            return Ok(declared.to_string());
        }

        for derived in descriptor.derived_types() {
            let derived_descriptor = types.describe(derived)?;
            if matcher.is_entity_type_match(&hint, derived_descriptor.mapped_name()) {
                return Ok(derived.clone());
            }
        }

        if let Some(found) = types.find_by_exact_name(&hint) {
            types.register(&found)?;
            debug!(type_hint = %hint, type_name = %found, "registered annotated type");
            return Ok(found);
        }

        warn!(type_hint = %hint, type_name = declared, "unresolved type annotation, keeping declared type");
        Ok(declared.to_string())
    }

    /// Build a transient record through the constructor covering the payload.
    fn construct(
        &self,
        payload: &Payload,
        descriptor: &TypeDescriptor,
    ) -> Result<Instance, ConvertError> {
        let parameters = descriptor
            .constructors()
            .iter()
            .find(|params| {
                params.len() == payload.len() && params.iter().all(|p| payload.contains_key(p))
            })
            .ok_or_else(|| ConvertError::ConstructorNotFound {
                type_name: descriptor.name().to_string(),
                keys: payload.keys().cloned().collect(),
                value_types: payload
                    .values()
                    .map(|v| json_type_name(v).to_string())
                    .collect(),
            })?;

        let mut instance = Instance::new(descriptor.name());
        for parameter in parameters {
            let value = match (payload.get(parameter), descriptor.member(parameter)) {
                (Some(value), Some(member)) => self.convert_value(&member.field_type, value)?,
                (Some(value), None) => Native::from_wire(value),
                (None, _) => Native::Null,
            };
            instance.set(parameter.clone(), value);
        }
        Ok(instance)
    }

    /// Default instance of `descriptor` with payload entries assigned.
    fn populate(&self, payload: &Payload, descriptor: &TypeDescriptor) -> Result<Instance, ConvertError> {
        let settings = self.session.settings();
        let bag_member = descriptor.dynamic_container();

        let mut instance = Instance::new(descriptor.name());
        for member in descriptor.members() {
            instance.set(member.name.clone(), Native::Null);
        }
        let mut bag = bag_member.map(|_| Payload::new());

        for (key, value) in payload {
            let member = self.find_member(descriptor, key).or_else(|| {
                if *key == settings.annotations_field {
                    descriptor.annotations_member().and_then(|m| descriptor.member(m))
                } else {
                    None
                }
            });

            match (member, bag.as_mut()) {
                (Some(m), Some(bag)) if Some(m.name.as_str()) == bag_member => match value {
                    Value::Object(entries) => {
                        bag.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())))
                    }
                    Value::Null => {}
                    other => {
                        bag.insert(key.clone(), other.clone());
                    }
                },
                (Some(m), _) if m.writable => {
                    if !value.is_null() {
                        instance.set(m.name.clone(), self.convert_value(&m.field_type, value)?);
                    }
                }
                (_, Some(bag)) if *key != settings.annotations_field => {
                    bag.insert(key.clone(), value.clone());
                }
                (_, _) if *key == settings.annotations_field => {
                    debug!(type_name = descriptor.name(), "no annotations member, skipping annotations");
                }
                (_, _) => {
                    warn!(type_name = descriptor.name(), entry = %key, "dropping payload entry with no matching member");
                }
            }
        }

        if let (Some(name), Some(bag)) = (bag_member, bag) {
            instance.set(name, Native::Map(bag));
        }
        Ok(instance)
    }

    fn find_member<'d>(&self, descriptor: &'d TypeDescriptor, key: &str) -> Option<&'d MemberDef> {
        let matcher = &self.session.settings().name_matcher;
        descriptor.member_by_mapped_name(key).or_else(|| {
            descriptor
                .mapped_members()
                .find(|(wire_name, _)| matcher.is_match(wire_name, key))
                .map(|(_, member)| member)
        })
    }

    fn convert_value(&self, field_type: &FieldType, value: &Value) -> Result<Native, ConvertError> {
        if value.is_null() {
            return Ok(Native::Null);
        }

        match field_type {
            FieldType::Any => Ok(Native::from_wire(value)),
            FieldType::Bool | FieldType::Int | FieldType::Float | FieldType::Text => {
                Ok(coerce_primitive(field_type, value).unwrap_or_else(|| {
                    debug!(target_type = %field_type.describe(), "keeping uncoerced value");
                    Native::from_wire(value)
                }))
            }
            FieldType::Enum(enum_name) => self.convert_enum(enum_name, value),
            FieldType::Record(type_name) => match value {
                Value::Object(payload) => self.to_native(payload, type_name),
                other => Err(ConvertError::NotAnObject {
                    type_name: type_name.clone(),
                    actual: json_type_name(other).to_string(),
                }),
            },
            FieldType::Collection { element, shape } => match value {
                Value::Array(items) => {
                    let mut converted: Vec<Native> = Vec::with_capacity(items.len());
                    for item in items {
                        let native = self.convert_value(element, item)?;
                        if *shape == CollectionShape::Set && converted.contains(&native) {
                            continue;
                        }
                        converted.push(native);
                    }
                    Ok(Native::List {
                        shape: *shape,
                        items: converted,
                    })
                }
                other => Ok(Native::from_wire(other)),
            },
            FieldType::Map => Ok(Native::from_wire(value)),
            FieldType::Annotations => Ok(EntryAnnotations::from_value(value)
                .map(Native::Annotations)
                .unwrap_or_else(|| Native::from_wire(value))),
        }
    }

    /// Numeric strings map by discriminant, anything else by member name.
    fn convert_enum(&self, enum_name: &str, value: &Value) -> Result<Native, ConvertError> {
        let def = self
            .session
            .types()
            .enum_def(enum_name)
            .ok_or_else(|| ConvertError::UnknownType {
                name: enum_name.to_string(),
            })?;

        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let enum_value = |(name, value): (&str, i64)| {
            Native::Enum(EnumValue {
                enum_name: def.name.clone(),
                name: name.to_string(),
                value,
            })
        };

        if let Ok(discriminant) = text.parse::<i64>() {
            return Ok(def
                .by_value(discriminant)
                .map(enum_value)
                .unwrap_or_else(|| Native::from_wire(value)));
        }

        def.by_name(&text)
            .map(enum_value)
            .ok_or_else(|| ConvertError::UnknownEnumMember {
                enum_name: enum_name.to_string(),
                value: text,
            })
    }
}

fn coerce_primitive(field_type: &FieldType, value: &Value) -> Option<Native> {
    match (field_type, value) {
        (FieldType::Bool, Value::Bool(b)) => Some(Native::Bool(*b)),
        (FieldType::Bool, Value::String(s)) => s.parse().ok().map(Native::Bool),
        (FieldType::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Native::Int),
        (FieldType::Int, Value::String(s)) => s.trim().parse().ok().map(Native::Int),
        (FieldType::Float, Value::Number(n)) => n.as_f64().map(Native::Float),
        (FieldType::Float, Value::String(s)) => s.trim().parse().ok().map(Native::Float),
        (FieldType::Text, Value::String(s)) => Some(Native::Text(s.clone())),
        (FieldType::Text, Value::Number(n)) => Some(Native::Text(n.to_string())),
        (FieldType::Text, Value::Bool(b)) => Some(Native::Text(b.to_string())),
        _ => None,
    }
}
