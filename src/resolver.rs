//! Command resolution.
//!
//! Turns a [`CommandSpec`] into a [`ResolvedCommand`]: names become concrete
//! entity collections, key values become a canonical key map, a filter that
//! is really a key lookup becomes one, and the entry is flattened into the
//! request payload.

use serde_json::Value;
use tracing::debug;

use crate::command::{CommandSpec, Entry};
use crate::error::ResolveError;
use crate::expr::{Expr, FilterNames};
use crate::metadata::Metadata;
use crate::session::Session;
use crate::types::{json_type_name, EntityCollection, Payload};
use crate::value::Native;

/// A command with every name checked against the schema.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    session: Session,
    collection_name: Option<String>,
    derived_collection_name: Option<String>,
    link_name: Option<String>,
    entity_collection: Option<EntityCollection>,
    key_values: Option<Vec<Native>>,
    named_key_values: Option<Payload>,
    is_alternate_key: bool,
    filter: Option<String>,
    function_name: Option<String>,
    top_count: Option<u64>,
    entry_data: Option<Payload>,
    dynamic_properties_container: Option<String>,
    include_count: bool,
}

impl ResolvedCommand {
    /// Resolve `spec` against `session`. `spec` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` when a name does not resolve against the schema,
    /// or when keys or a filter are given without any collection.
    pub fn resolve(spec: &CommandSpec, session: &Session) -> Result<Self, ResolveError> {
        let mut resolved = Self {
            session: session.clone(),
            collection_name: spec.collection_name.clone(),
            derived_collection_name: spec.derived_collection_name.clone(),
            link_name: spec.link_name.clone(),
            entity_collection: None,
            key_values: spec.key_values.clone(),
            named_key_values: None,
            is_alternate_key: false,
            filter: spec.filter.clone(),
            function_name: spec.function_name.clone(),
            top_count: spec.top_count,
            entry_data: None,
            dynamic_properties_container: spec.dynamic_properties_container.clone(),
            include_count: spec.include_count,
        };

        resolved.resolve_collection_name(spec)?;
        resolved.resolve_derived_collection_name(spec)?;
        resolved.resolve_link_name(spec)?;
        resolved.resolve_entity_collection(spec)?;
        resolved.resolve_keys(spec)?;
        resolved.resolve_filter(spec)?;
        resolved.resolve_entry_data(spec)?;

        Ok(resolved)
    }

    fn resolve_collection_name(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        let name = match (&self.collection_name, &spec.collection_expr) {
            (Some(name), _) => name.clone(),
            (None, Some(expr)) => expression_name(expr)?,
            (None, None) => return Ok(()),
        };

        // `Collection/Derived` names a derived type in one go.
        match name.split_once('/') {
            Some((collection, derived)) => {
                self.collection_name = Some(collection.to_string());
                if self.derived_collection_name.is_none() {
                    let derived = derived.split('/').next().unwrap_or(derived);
                    self.derived_collection_name = Some(derived.to_string());
                }
            }
            None => self.collection_name = Some(name),
        }
        Ok(())
    }

    fn resolve_derived_collection_name(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        if self.derived_collection_name.is_none() {
            if let Some(expr) = &spec.derived_collection_expr {
                self.derived_collection_name = Some(expression_name(expr)?);
            }
        }
        Ok(())
    }

    fn resolve_link_name(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        if self.link_name.is_none() {
            if let Some(expr) = &spec.link_expr {
                self.link_name = Some(expression_name(expr)?);
            }
        }
        Ok(())
    }

    fn resolve_entity_collection(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        let metadata = self.session.metadata();

        let collection = match (non_empty(&self.link_name), non_empty(&self.collection_name)) {
            (Some(link), _) => {
                let parent = spec.parent.as_deref().ok_or(ResolveError::MissingCollection)?;
                let parent = Self::resolve(parent, &self.session)?;
                let parent_collection = parent
                    .entity_collection
                    .as_ref()
                    .ok_or(ResolveError::MissingCollection)?;
                let partner =
                    metadata.get_navigation_property_partner_type_name(parent_collection.name(), link)?;
                metadata.get_entity_collection(&partner)?
            }
            (None, Some(name)) => metadata.get_entity_collection(name)?,
            (None, None) => return Ok(()),
        };

        let collection = match non_empty(&self.derived_collection_name) {
            Some(derived) => metadata.get_derived_entity_collection(&collection, derived)?,
            None => collection,
        };

        debug!(collection = collection.name(), "resolved entity collection");
        self.entity_collection = Some(collection);
        Ok(())
    }

    fn resolve_keys(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        let named = match spec.key_values.as_deref() {
            Some([Native::Record(record)])
                if self.session.types().is_anonymous(record.type_name()) =>
            {
                Some(self.session.converter().to_dictionary(record)?)
            }
            _ => spec.named_key_values.clone(),
        };

        if !spec.has_key() {
            return Ok(());
        }
        let collection = self.collection()?.name().to_string();

        let Some(named) = named else {
            return Ok(());
        };

        let keys = self.session.key_matcher();
        let matched = match keys.match_any(&collection, &named)? {
            Some(key) => Some(key),
            None => keys.extract_any(&collection, &named)?,
        };

        match matched {
            Some(key) => {
                self.named_key_values = Some(key.values);
                self.is_alternate_key = key.is_alternate;
            }
            None => {
                debug!(collection = %collection, "named values match no key");
                self.named_key_values = None;
            }
        }
        self.key_values = None;
        Ok(())
    }

    fn resolve_filter(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        if self.filter.is_some() {
            return Ok(());
        }
        let Some(expr) = &spec.filter_expr else {
            return Ok(());
        };
        let collection = self.entity_collection.clone();

        let as_key = match &collection {
            Some(collection) => self.interpret_filter_as_key(collection, expr)?,
            None => None,
        };

        match as_key {
            Some((values, is_alternate)) => {
                debug!(filter = %expr, "filter resolved to key lookup");
                self.named_key_values = Some(values);
                self.is_alternate_key = is_alternate;
                self.key_values = None;
                self.top_count = None;
            }
            None => {
                let mut target = collection.clone();
                if let Some(function) = non_empty(&self.function_name) {
                    if let Some(returned) =
                        self.session.metadata().get_function_return_collection(function)?
                    {
                        target = Some(returned);
                    }
                }
                let target = target.ok_or(ResolveError::MissingCollection)?;
                self.named_key_values = None;
                self.is_alternate_key = false;
                self.filter = Some(expr.format_with(&TargetNames {
                    metadata: self.session.metadata(),
                    collection: target.name(),
                }));
            }
        }

        if let Some(derived) = non_empty(&self.derived_collection_name) {
            if expr.has_type_constraint(derived) {
                self.derived_collection_name = None;
                if let Some(base) = collection.as_ref().and_then(EntityCollection::base) {
                    self.entity_collection = Some(base.clone());
                }
            }
        }
        Ok(())
    }

    fn interpret_filter_as_key(
        &self,
        collection: &EntityCollection,
        expr: &Expr,
    ) -> Result<Option<(Payload, bool)>, ResolveError> {
        let Some(columns) = expr.lookup_columns() else {
            return Ok(None);
        };
        let Some(key) = self.session.key_matcher().match_any(collection.name(), &columns)? else {
            return Ok(None);
        };

        if !self.session.settings().support_nulls_as_key_property_values
            && key.values.values().any(Value::is_null)
        {
            return Ok(None);
        }
        Ok(Some((key.values, key.is_alternate)))
    }

    fn resolve_entry_data(&mut self, spec: &CommandSpec) -> Result<(), ResolveError> {
        let Some(entry) = &spec.entry else {
            return Ok(());
        };

        let converter = self.session.converter();
        let data = match entry {
            Entry::Map(payload) => payload.as_ref().clone(),
            Entry::Record(record) => {
                if self.dynamic_properties_container.is_none() {
                    self.dynamic_properties_container = self
                        .session
                        .types()
                        .describe(record.type_name())
                        .ok()
                        .and_then(|d| {
                            d.dynamic_container()
                                .and_then(|bag| d.mapped_name_of(bag))
                                .map(str::to_string)
                        });
                }
                converter.to_dictionary(record)?
            }
        };

        self.entry_data = Some(match &spec.batch_entries {
            Some(batch) => batch.get_or_add(entry, data),
            None => data,
        });
        Ok(())
    }

    fn collection(&self) -> Result<&EntityCollection, ResolveError> {
        self.entity_collection
            .as_ref()
            .ok_or(ResolveError::MissingCollection)
    }

    pub fn entity_collection(&self) -> Option<&EntityCollection> {
        self.entity_collection.as_ref()
    }

    /// Collection path: the collection name, or `Base/Namespace.Derived`.
    pub fn qualified_collection_name(&self) -> Result<String, ResolveError> {
        let collection = self.collection()?;
        match collection.base() {
            None => Ok(collection.name().to_string()),
            Some(base) => Ok(format!(
                "{}/{}",
                base.name(),
                self.session.metadata().get_qualified_type_name(collection.name())?
            )),
        }
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }

    pub fn derived_collection_name(&self) -> Option<&str> {
        self.derived_collection_name.as_deref()
    }

    pub fn link_name(&self) -> Option<&str> {
        self.link_name.as_deref()
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    pub fn has_key(&self) -> bool {
        self.key_values.is_some() || self.named_key_values.is_some()
    }

    /// Key map for request formatting.
    ///
    /// Positional key values are paired with the declared key names in order.
    pub fn key_values(&self) -> Result<Option<Payload>, ResolveError> {
        if let Some(values) = &self.key_values {
            let names = self
                .session
                .metadata()
                .get_declared_key_property_names(self.collection()?.name())?;
            return Ok(Some(
                names
                    .into_iter()
                    .zip(values.iter().map(Native::to_json))
                    .collect(),
            ));
        }
        Ok(self.named_key_values.clone())
    }

    /// Key map the named values or the filter resolved to.
    pub fn filter_as_key(&self) -> Option<&Payload> {
        self.named_key_values.as_ref()
    }

    pub fn is_alternate_key(&self) -> bool {
        self.is_alternate_key
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Page size; `None` is unlimited.
    pub fn top_count(&self) -> Option<u64> {
        self.top_count
    }

    pub fn include_count(&self) -> bool {
        self.include_count
    }

    pub fn with_count(mut self) -> Self {
        self.include_count = true;
        self
    }

    pub fn dynamic_properties_container_name(&self) -> Option<&str> {
        self.dynamic_properties_container.as_deref()
    }

    pub fn entry_data(&self) -> Option<&Payload> {
        self.entry_data.as_ref()
    }

    /// Request payload with the dynamic property bag merged into the top level.
    ///
    /// # Errors
    ///
    /// `DynamicContainerNotMap` if the bag entry holds anything but a map.
    pub fn command_data(&self) -> Result<Payload, ResolveError> {
        let Some(entry_data) = &self.entry_data else {
            return Ok(Payload::new());
        };
        let Some(container) = non_empty(&self.dynamic_properties_container) else {
            return Ok(entry_data.clone());
        };

        let mut data: Payload = entry_data
            .iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(container))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        match entry_data.get(container) {
            None | Some(Value::Null) => {}
            Some(Value::Object(bag)) => {
                data.extend(bag.iter().map(|(key, value)| (key.clone(), value.clone())));
            }
            Some(other) => {
                return Err(ResolveError::DynamicContainerNotMap {
                    container: container.to_string(),
                    actual: json_type_name(other).to_string(),
                })
            }
        }
        Ok(data)
    }
}

/// Filter names spelled against one target collection.
///
/// Names the schema does not know are kept as written.
struct TargetNames<'a> {
    metadata: &'a dyn Metadata,
    collection: &'a str,
}

impl FilterNames for TargetNames<'_> {
    fn property_path(&self, path: &[String]) -> String {
        match self.metadata.get_property_path(self.collection, path) {
            Ok(Some(declared)) => declared.join("/"),
            Ok(None) | Err(_) => {
                debug!(collection = self.collection, ?path, "leaving property path as written");
                path.join("/")
            }
        }
    }

    fn type_name(&self, name: &str) -> String {
        self.metadata.get_qualified_type_name(name).unwrap_or_else(|_| {
            debug!(collection = self.collection, type_name = name, "leaving type name unqualified");
            name.to_string()
        })
    }
}

fn expression_name(expr: &Expr) -> Result<String, ResolveError> {
    expr.as_name()
        .ok_or_else(|| ResolveError::InvalidNameExpression {
            expression: expr.format(),
        })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaModel;
    use crate::types::Settings;
    use serde_json::json;
    use std::sync::Arc;

    fn session() -> Session {
        let model = SchemaModel::from_document(&json!({
            "namespace": "Shop",
            "entityTypes": [
                { "name": "Item", "key": ["ItemID"], "alternateKeys": [["Sku"]] }
            ],
            "entitySets": [{ "name": "Items", "entityType": "Item" }]
        }))
        .unwrap();
        Session::new(Settings::new(), Arc::new(model))
    }

    #[test]
    fn keys_without_collection() {
        let spec = CommandSpec {
            key_values: Some(vec![Native::Int(1)]),
            ..CommandSpec::default()
        };
        assert!(matches!(
            ResolvedCommand::resolve(&spec, &session()),
            Err(ResolveError::MissingCollection)
        ));
    }

    #[test]
    fn positional_keys_zip_with_declared_names() {
        let resolved = session().resolve(&CommandSpec::collection("Items").key([5])).unwrap();
        assert_eq!(
            resolved.key_values().unwrap().map(Value::Object),
            Some(json!({ "ItemID": 5 }))
        );
        assert!(resolved.filter_as_key().is_none());
    }

    #[test]
    fn invalid_name_expression() {
        let spec = CommandSpec::collection_expr(Expr::literal(3));
        assert!(matches!(
            session().resolve(&spec),
            Err(ResolveError::InvalidNameExpression { expression }) if expression == "3"
        ));
    }

    #[test]
    fn with_count_sets_flag() {
        let resolved = session().resolve(&CommandSpec::collection("Items")).unwrap();
        assert!(!resolved.include_count());
        assert!(resolved.with_count().include_count());
    }

    #[test]
    fn command_data_without_entry_is_empty() {
        let resolved = session().resolve(&CommandSpec::collection("Items")).unwrap();
        assert!(resolved.command_data().unwrap().is_empty());
    }
}
