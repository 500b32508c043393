//! Core types shared by the resolver and the converter.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::converter::{ConverterRegistry, PayloadConverter};
use crate::naming::{self, NameMatcher};

/// Key/value wire representation of an entry. Insertion order is preserved.
pub type Payload = Map<String, Value>;

/// Default reserved wire field carrying out-of-band entry annotations.
pub const ANNOTATIONS_LITERAL: &str = "__annotations";

/// Default member name of a dynamic property bag.
pub const DEFAULT_DYNAMIC_CONTAINER: &str = "DynamicProperties";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A schema-resolved entity collection.
///
/// `name` is the exact schema name, independent of how the caller spelled it.
/// A derived collection keeps a reference to the collection it narrows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityCollection {
    name: String,
    base: Option<Box<EntityCollection>>,
}

impl EntityCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
        }
    }

    /// A collection narrowed to a derived entity type of `base`.
    pub fn derived(name: impl Into<String>, base: EntityCollection) -> Self {
        Self {
            name: name.into(),
            base: Some(Box::new(base)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&EntityCollection> {
        self.base.as_deref()
    }
}

/// Out-of-band annotations carried by an entry under the reserved field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryAnnotations {
    #[serde(rename = "type", alias = "typeName", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_read_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_edit_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_etag: Option<String>,
}

impl EntryAnnotations {
    /// Parse annotations from a wire value.
    ///
    /// A bare string is read as the type name. Returns `None` for anything
    /// that is not an annotations object.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self {
                type_name: Some(s.clone()),
                ..Self::default()
            }),
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Named name-matching presets, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatchKind {
    /// Ordinal equality.
    Strict,
    /// Case and punctuation folded, then ordinal.
    Alphanumeric,
    /// Case and punctuation folded, compared case-insensitively.
    AlphanumericCaseInsensitive,
    /// Folded with singular/plural tolerance.
    #[default]
    NotStrict,
}

impl NameMatchKind {
    /// Returns the policy instance for this preset.
    pub fn matcher(&self) -> Arc<dyn NameMatcher> {
        match self {
            NameMatchKind::Strict => naming::strict(),
            NameMatchKind::Alphanumeric => naming::alphanumeric(),
            NameMatchKind::AlphanumericCaseInsensitive => naming::alphanumeric_case_insensitive(),
            NameMatchKind::NotStrict => naming::not_strict(),
        }
    }
}

/// Options consumed by resolution and conversion.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Policy used whenever a requested name is reconciled with a schema name.
    pub name_matcher: Arc<dyn NameMatcher>,
    /// When false, a key component whose value is null disqualifies a key match.
    pub support_nulls_as_key_property_values: bool,
    /// Reserved wire field holding entry annotations.
    pub annotations_field: String,
    /// Payload converters keyed by target type name.
    pub converters: ConverterRegistry,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Settings with the permissive policy and nulls rejected as key values.
    pub fn new() -> Self {
        Self {
            name_matcher: NameMatchKind::default().matcher(),
            support_nulls_as_key_property_values: false,
            annotations_field: ANNOTATIONS_LITERAL.to_string(),
            converters: ConverterRegistry::default(),
        }
    }

    /// Select one of the named matching presets.
    pub fn name_match(mut self, kind: NameMatchKind) -> Self {
        self.name_matcher = kind.matcher();
        self
    }

    /// Use a custom matching policy.
    pub fn name_matcher(mut self, matcher: Arc<dyn NameMatcher>) -> Self {
        self.name_matcher = matcher;
        self
    }

    pub fn support_nulls_as_key_property_values(mut self, support: bool) -> Self {
        self.support_nulls_as_key_property_values = support;
        self
    }

    pub fn annotations_field(mut self, field: impl Into<String>) -> Self {
        self.annotations_field = field.into();
        self
    }

    /// Register a payload converter for `type_name`.
    pub fn converter(
        mut self,
        type_name: impl Into<String>,
        converter: Arc<dyn PayloadConverter>,
    ) -> Self {
        self.converters.register(type_name, converter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derived_collection_keeps_base() {
        let base = EntityCollection::new("Transport");
        let derived = EntityCollection::derived("Ship", base.clone());
        assert_eq!(derived.name(), "Ship");
        assert_eq!(derived.base(), Some(&base));
        assert!(base.base().is_none());
    }

    #[test]
    fn annotations_from_object() {
        let value = json!({ "type": "NorthwindModel.Ship", "etag": "W/\"1\"" });
        let annotations = EntryAnnotations::from_value(&value).unwrap();
        assert_eq!(annotations.type_name.as_deref(), Some("NorthwindModel.Ship"));
        assert_eq!(annotations.etag.as_deref(), Some("W/\"1\""));
    }

    #[test]
    fn annotations_from_string_is_type_name() {
        let annotations = EntryAnnotations::from_value(&json!("Ship")).unwrap();
        assert_eq!(annotations.type_name.as_deref(), Some("Ship"));
        assert!(EntryAnnotations::from_value(&json!(42)).is_none());
    }

    #[test]
    fn annotations_serialize_skips_empty() {
        let annotations = EntryAnnotations {
            type_name: Some("Ship".into()),
            ..EntryAnnotations::default()
        };
        assert_eq!(annotations.to_value(), json!({ "type": "Ship" }));
    }

    #[test]
    fn name_match_kind_deserializes() {
        let kind: NameMatchKind = serde_json::from_value(json!("alphanumeric")).unwrap();
        assert_eq!(kind, NameMatchKind::Alphanumeric);
        assert!(kind.matcher().is_match("Product_Name", "productname"));
        assert!(!NameMatchKind::Strict.matcher().is_match("Product_Name", "productname"));
    }

    #[test]
    fn settings_builder() {
        let settings = Settings::new()
            .name_match(NameMatchKind::Strict)
            .support_nulls_as_key_property_values(true)
            .annotations_field("@odata");
        assert!(settings.name_matcher.is_strict());
        assert!(settings.support_nulls_as_key_property_values);
        assert_eq!(settings.annotations_field, "@odata");
    }
}
