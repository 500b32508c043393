//! In-memory schema model.
//!
//! A reference [`Metadata`] implementation backed by a JSON model document:
//!
//! ```json
//! {
//!   "namespace": "NorthwindModel",
//!   "entityTypes": [
//!     { "name": "Product", "key": ["ProductID"], "alternateKeys": [["ProductCode"]],
//!       "properties": [{ "name": "ProductID", "type": "Edm.Int32" }],
//!       "navigationProperties": [{ "name": "Category", "type": "Category" }] }
//!   ],
//!   "entitySets": [{ "name": "Products", "entityType": "Product" }],
//!   "functions": [{ "name": "TopProducts", "returnType": "Product", "returnsCollection": true }]
//! }
//! ```
//!
//! Documents are validated against an embedded JSON Schema before use.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ModelError, ResolveError, SchemaError};
use crate::metadata::Metadata;
use crate::naming::{self, NameMatcher};
use crate::types::EntityCollection;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDef {
    pub name: String,
    #[serde(rename = "type")]
    pub target: String,
    #[serde(default)]
    pub collection: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub alternate_keys: Vec<Vec<String>>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySetDef {
    pub name: String,
    pub entity_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub returns_collection: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelDocument {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    entity_sets: Vec<EntitySetDef>,
    #[serde(default)]
    functions: Vec<FunctionDef>,
}

/// Schema model answering [`Metadata`] queries with best-match name lookup.
///
/// A lookup prefers an exact ordinal match; otherwise exactly one candidate
/// must satisfy the name matcher, and several is an `AmbiguousName` error.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    namespace: Option<String>,
    entity_types: Vec<EntityTypeDef>,
    entity_sets: Vec<EntitySetDef>,
    functions: Vec<FunctionDef>,
    matcher: Arc<dyn NameMatcher>,
}

impl SchemaModel {
    /// Validate and parse a model document.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Invalid` with every validation failure if the
    /// document does not conform to the model schema.
    pub fn from_document(document: &Value) -> Result<Self, ModelError> {
        validate_document(document)?;
        let doc: ModelDocument = serde_json::from_value(document.clone())
            .map_err(|source| ModelError::InvalidJson { source })?;

        Ok(Self {
            namespace: doc.namespace,
            entity_types: doc.entity_types,
            entity_sets: doc.entity_sets,
            functions: doc.functions,
            matcher: naming::not_strict(),
        })
    }

    /// Parse, validate and build a model from document text.
    ///
    /// # Errors
    ///
    /// `ModelError::InvalidJson` when the text is not JSON, otherwise as
    /// [`from_document`](Self::from_document).
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let document: Value =
            serde_json::from_str(text).map_err(|source| ModelError::InvalidJson { source })?;
        Self::from_document(&document)
    }

    /// Use a different name match policy for lookups.
    pub fn with_name_matcher(mut self, matcher: Arc<dyn NameMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn entity_types(&self) -> &[EntityTypeDef] {
        &self.entity_types
    }

    pub fn entity_sets(&self) -> &[EntitySetDef] {
        &self.entity_sets
    }

    fn qualified_name(&self, entity_type: &EntityTypeDef) -> String {
        match entity_type.namespace.as_ref().or(self.namespace.as_ref()) {
            Some(ns) => format!("{}.{}", ns, entity_type.name),
            None => entity_type.name.clone(),
        }
    }

    fn best_match<'a, T, F>(
        &self,
        items: &'a [T],
        name_of: F,
        requested: &str,
        entity: bool,
    ) -> Result<Option<&'a T>, ResolveError>
    where
        F: Fn(&'a T) -> &'a str,
    {
        if let Some(exact) = items.iter().find(|item| name_of(*item) == requested) {
            return Ok(Some(exact));
        }

        let matches: Vec<&'a T> = items
            .iter()
            .filter(|item| {
                if entity {
                    self.matcher.is_entity_type_match(name_of(*item), requested)
                } else {
                    self.matcher.is_match(name_of(*item), requested)
                }
            })
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            many => Err(ResolveError::AmbiguousName {
                name: requested.to_string(),
                candidates: many.iter().map(|item| name_of(*item).to_string()).collect(),
            }),
        }
    }

    fn find_entity_set(&self, name: &str) -> Result<Option<&EntitySetDef>, ResolveError> {
        let name = name.split('/').next().unwrap_or(name);
        if let Some(set) = self.best_match(&self.entity_sets, |s| s.name.as_str(), name, true)? {
            return Ok(Some(set));
        }
        self.best_match(&self.entity_sets, |s| s.entity_type.as_str(), name, true)
    }

    fn type_by_name(&self, name: &str) -> Result<Option<&EntityTypeDef>, ResolveError> {
        self.best_match(&self.entity_types, |t| t.name.as_str(), name, true)
    }

    fn find_entity_type(&self, name: &str) -> Result<Option<&EntityTypeDef>, ResolveError> {
        if let Some((_, last)) = name.rsplit_once('/') {
            if last.contains('.') {
                return Ok(self
                    .entity_types
                    .iter()
                    .find(|t| self.qualified_name(t) == last));
            }
        }

        if let Some(set) = self.find_entity_set(name)? {
            return self.type_by_name(&set.entity_type);
        }
        self.type_by_name(name.split('/').next().unwrap_or(name))
    }

    fn entity_type(&self, name: &str) -> Result<&EntityTypeDef, ResolveError> {
        self.find_entity_type(name)?
            .ok_or_else(|| ResolveError::TypeNotFound {
                name: name.to_string(),
            })
    }

    /// This type followed by its ancestors.
    fn lineage<'a>(&'a self, entity_type: &'a EntityTypeDef) -> Vec<&'a EntityTypeDef> {
        let mut chain = vec![entity_type];
        let mut base = entity_type.base_type.as_deref();
        while let Some(name) = base {
            let simple = naming::simple_name(name);
            match self.entity_types.iter().find(|t| t.name == simple) {
                Some(t) if !chain.iter().any(|c| c.name == t.name) => {
                    chain.push(t);
                    base = t.base_type.as_deref();
                }
                _ => break,
            }
        }
        chain
    }

    fn derived_types(&self, entity_type: &EntityTypeDef) -> Vec<EntityTypeDef> {
        self.entity_types
            .iter()
            .filter(|t| {
                t.name != entity_type.name
                    && self.lineage(t).iter().any(|a| a.name == entity_type.name)
            })
            .cloned()
            .collect()
    }
}

impl Metadata for SchemaModel {
    fn get_entity_collection(&self, name: &str) -> Result<EntityCollection, ResolveError> {
        if let Some(set) = self.find_entity_set(name)? {
            return Ok(EntityCollection::new(set.name.clone()));
        }
        match self.type_by_name(name.split('/').next().unwrap_or(name))? {
            Some(t) => Ok(EntityCollection::new(t.name.clone())),
            None => Err(ResolveError::CollectionNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn get_derived_entity_collection(
        &self,
        base: &EntityCollection,
        derived_name: &str,
    ) -> Result<EntityCollection, ResolveError> {
        let found = match self.find_entity_set(base.name())? {
            Some(set) => {
                let element = self.entity_type(&set.entity_type)?;
                let derived = self.derived_types(element);
                self.best_match(&derived, |t| t.name.as_str(), derived_name, true)?
                    .map(|t| t.name.clone())
            }
            None => self.type_by_name(derived_name)?.map(|t| t.name.clone()),
        };

        match found {
            Some(name) => Ok(EntityCollection::derived(name, base.clone())),
            None => Err(ResolveError::DerivedTypeNotFound {
                collection: base.name().to_string(),
                name: derived_name.to_string(),
            }),
        }
    }

    fn get_declared_key_property_names(
        &self,
        collection_name: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let entity_type = self.entity_type(collection_name)?;
        Ok(self
            .lineage(entity_type)
            .into_iter()
            .find(|t| !t.key.is_empty())
            .map(|t| t.key.clone())
            .unwrap_or_default())
    }

    fn get_alternate_key_property_names(
        &self,
        collection_name: &str,
    ) -> Result<Vec<Vec<String>>, ResolveError> {
        let entity_type = self.entity_type(collection_name)?;
        Ok(self
            .lineage(entity_type)
            .into_iter()
            .find(|t| !t.alternate_keys.is_empty())
            .map(|t| t.alternate_keys.clone())
            .unwrap_or_default())
    }

    fn get_navigation_property_partner_type_name(
        &self,
        collection_name: &str,
        link_name: &str,
    ) -> Result<String, ResolveError> {
        let not_found = || ResolveError::NavigationNotFound {
            collection: collection_name.to_string(),
            link: link_name.to_string(),
        };

        let entity_type = self.entity_type(collection_name)?;
        let navigations: Vec<NavigationDef> = self
            .lineage(entity_type)
            .into_iter()
            .flat_map(|t| t.navigation_properties.iter().cloned())
            .collect();

        let navigation = match self.best_match(&navigations, |n| n.name.as_str(), link_name, false)? {
            Some(n) => n,
            // Navigating by the partner type name picks the first property of that type.
            None => navigations
                .iter()
                .find(|n| self.matcher.is_entity_type_match(&n.target, link_name))
                .ok_or_else(not_found)?,
        };

        self.type_by_name(naming::simple_name(&navigation.target))?
            .map(|t| t.name.clone())
            .ok_or_else(not_found)
    }

    fn get_property_path(
        &self,
        collection_name: &str,
        path: &[String],
    ) -> Result<Option<Vec<String>>, ResolveError> {
        let mut entity_type = self.entity_type(collection_name)?;
        let mut declared = Vec::with_capacity(path.len());

        for (i, segment) in path.iter().enumerate() {
            let lineage = self.lineage(entity_type);
            if i + 1 == path.len() {
                let properties: Vec<&PropertyDef> =
                    lineage.iter().flat_map(|t| t.properties.iter()).collect();
                if let Some(p) = self.best_match(&properties, |p| p.name.as_str(), segment, false)? {
                    declared.push(p.name.clone());
                    continue;
                }
            }

            let navigations: Vec<&NavigationDef> = lineage
                .iter()
                .flat_map(|t| t.navigation_properties.iter())
                .collect();
            let Some(navigation) =
                self.best_match(&navigations, |n| n.name.as_str(), segment, false)?
            else {
                return Ok(None);
            };
            declared.push(navigation.name.clone());
            match self.type_by_name(naming::simple_name(&navigation.target))? {
                Some(partner) => entity_type = partner,
                None if i + 1 == path.len() => {}
                None => return Ok(None),
            }
        }
        Ok(Some(declared))
    }

    fn get_qualified_type_name(&self, collection_name: &str) -> Result<String, ResolveError> {
        let entity_type = self.entity_type(collection_name)?;
        Ok(self.qualified_name(entity_type))
    }

    fn get_function_return_collection(
        &self,
        function_name: &str,
    ) -> Result<Option<EntityCollection>, ResolveError> {
        let function = self
            .best_match(&self.functions, |f| f.name.as_str(), function_name, false)?
            .ok_or_else(|| ResolveError::FunctionNotFound {
                name: function_name.to_string(),
            })?;

        let Some(return_type) = function.return_type.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .type_by_name(naming::simple_name(return_type))?
            .map(|t| EntityCollection::new(t.name.clone())))
    }
}

/// Validate a model document against the model schema.
///
/// Collects every validation failure rather than stopping at the first.
pub fn validate_document(document: &Value) -> Result<(), ModelError> {
    let validator = jsonschema::validator_for(&model_schema()).map_err(|e| {
        ModelError::InvalidSchema {
            message: e.to_string(),
        }
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(document)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Invalid { errors })
    }
}

fn model_schema() -> Value {
    json!({
        "type": "object",
        "required": ["entityTypes"],
        "properties": {
            "namespace": { "type": "string" },
            "entityTypes": { "type": "array", "items": { "$ref": "#/$defs/entityType" } },
            "entitySets": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "entityType"],
                    "properties": {
                        "name": { "$ref": "#/$defs/name" },
                        "entityType": { "$ref": "#/$defs/name" }
                    }
                }
            },
            "functions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "$ref": "#/$defs/name" },
                        "returnType": { "type": ["string", "null"] },
                        "returnsCollection": { "type": "boolean" }
                    }
                }
            }
        },
        "$defs": {
            "name": { "type": "string", "minLength": 1 },
            "names": { "type": "array", "items": { "$ref": "#/$defs/name" } },
            "entityType": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "$ref": "#/$defs/name" },
                    "namespace": { "type": "string" },
                    "baseType": { "type": ["string", "null"] },
                    "abstract": { "type": "boolean" },
                    "key": { "$ref": "#/$defs/names" },
                    "alternateKeys": { "type": "array", "items": { "$ref": "#/$defs/names" } },
                    "properties": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": { "$ref": "#/$defs/name" },
                                "type": { "type": "string" },
                                "nullable": { "type": "boolean" }
                            }
                        }
                    },
                    "navigationProperties": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name", "type"],
                            "properties": {
                                "name": { "$ref": "#/$defs/name" },
                                "type": { "$ref": "#/$defs/name" },
                                "collection": { "type": "boolean" }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_model() -> Value {
        json!({
            "namespace": "NorthwindModel",
            "entityTypes": [
                { "name": "Transport", "key": ["TransportID"],
                  "properties": [{ "name": "TransportID", "type": "Edm.Int32", "nullable": false }] },
                { "name": "Ship", "baseType": "NorthwindModel.Transport",
                  "properties": [{ "name": "ShipName", "type": "Edm.String" }] },
                { "name": "Truck", "baseType": "Transport",
                  "properties": [{ "name": "TruckNumber", "type": "Edm.String" }] },
                { "name": "Employee", "key": ["EmployeeID"], "alternateKeys": [["Email"], ["FirstName", "LastName"]],
                  "navigationProperties": [
                      { "name": "Superior", "type": "NorthwindModel.Employee" },
                      { "name": "Subordinates", "type": "Employee", "collection": true }
                  ] }
            ],
            "entitySets": [
                { "name": "Transport", "entityType": "Transport" },
                { "name": "Employees", "entityType": "Employee" }
            ],
            "functions": [
                { "name": "ActiveEmployees", "returnType": "NorthwindModel.Employee", "returnsCollection": true },
                { "name": "ParseInt", "returnType": "Edm.Int32" },
                { "name": "Ping" }
            ]
        })
    }

    fn model() -> SchemaModel {
        SchemaModel::from_document(&transport_model()).unwrap()
    }

    #[test]
    fn collection_by_set_and_plural_folding() {
        let model = model();
        assert_eq!(model.get_entity_collection("Employees").unwrap().name(), "Employees");
        assert_eq!(model.get_entity_collection("Employee").unwrap().name(), "Employees");
        assert_eq!(model.get_entity_collection("employees").unwrap().name(), "Employees");
        assert!(matches!(
            model.get_entity_collection("Customers"),
            Err(ResolveError::CollectionNotFound { name }) if name == "Customers"
        ));
    }

    #[test]
    fn strict_matcher_rejects_folding() {
        let model = model().with_name_matcher(naming::strict());
        assert!(model.get_entity_collection("Employees").is_ok());
        assert!(model.get_entity_collection("employees").is_err());
    }

    #[test]
    fn derived_collection() {
        let model = model();
        let base = model.get_entity_collection("Transport").unwrap();
        let ships = model.get_derived_entity_collection(&base, "Ships").unwrap();
        assert_eq!(ships.name(), "Ship");
        assert_eq!(ships.base().unwrap().name(), "Transport");

        assert!(matches!(
            model.get_derived_entity_collection(&base, "Employee"),
            Err(ResolveError::DerivedTypeNotFound { .. })
        ));
    }

    #[test]
    fn keys_inherit_from_base() {
        let model = model();
        assert_eq!(model.get_declared_key_property_names("Ship").unwrap(), ["TransportID"]);
        assert_eq!(
            model.get_alternate_key_property_names("Employees").unwrap(),
            vec![vec!["Email".to_string()], vec!["FirstName".into(), "LastName".into()]]
        );
        assert!(model.get_alternate_key_property_names("Transport").unwrap().is_empty());
    }

    #[test]
    fn navigation_partner() {
        let model = model();
        assert_eq!(
            model.get_navigation_property_partner_type_name("Employees", "Superior").unwrap(),
            "Employee"
        );
        assert!(matches!(
            model.get_navigation_property_partner_type_name("Employees", "Orders"),
            Err(ResolveError::NavigationNotFound { link, .. }) if link == "Orders"
        ));
    }

    #[test]
    fn qualified_type_name() {
        let model = model();
        assert_eq!(model.get_qualified_type_name("Ship").unwrap(), "NorthwindModel.Ship");
        assert_eq!(
            model.get_qualified_type_name("Employees").unwrap(),
            "NorthwindModel.Employee"
        );
    }

    #[test]
    fn function_return_collection() {
        let model = model();
        let collection = model.get_function_return_collection("ActiveEmployees").unwrap();
        assert_eq!(collection.unwrap().name(), "Employee");
        assert!(model.get_function_return_collection("ParseInt").unwrap().is_none());
        assert!(model.get_function_return_collection("Ping").unwrap().is_none());
        assert!(matches!(
            model.get_function_return_collection("Nope"),
            Err(ResolveError::FunctionNotFound { .. })
        ));
    }

    #[test]
    fn ambiguous_policy_match() {
        let document = json!({
            "entityTypes": [{ "name": "Order_Detail" }, { "name": "OrderDetail2" }, { "name": "order-detail" }],
            "entitySets": []
        });
        let model = SchemaModel::from_document(&document).unwrap();
        assert!(matches!(
            model.get_entity_collection("OrderDetail"),
            Err(ResolveError::AmbiguousName { candidates, .. }) if candidates.len() == 2
        ));
        assert_eq!(
            model.get_entity_collection("order-detail").unwrap().name(),
            "order-detail"
        );
    }

    #[test]
    fn invalid_document_collects_errors() {
        let document = json!({
            "entityTypes": [{ "name": "", "key": "ProductID" }],
            "entitySets": [{ "name": "Products" }]
        });
        match SchemaModel::from_document(&document) {
            Err(ModelError::Invalid { errors }) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn from_json_text() {
        let model = SchemaModel::from_json(&transport_model().to_string()).unwrap();
        assert_eq!(model.entity_types().len(), 4);
        assert_eq!(model.entity_sets().len(), 2);

        assert!(matches!(
            SchemaModel::from_json("not valid json"),
            Err(ModelError::InvalidJson { .. })
        ));
    }

    #[test]
    fn property_path_through_navigation() {
        let model = model();
        let path = |p: &str| p.split('/').map(str::to_string).collect::<Vec<_>>();

        assert_eq!(
            model.get_property_path("Ships", &path("shipname")).unwrap(),
            Some(vec!["ShipName".to_string()])
        );
        assert_eq!(
            model.get_property_path("Ship", &path("transportid")).unwrap(),
            Some(vec!["TransportID".to_string()])
        );
        assert_eq!(
            model.get_property_path("Employees", &path("superior/subordinates")).unwrap(),
            Some(vec!["Superior".to_string(), "Subordinates".to_string()])
        );
        assert_eq!(model.get_property_path("Employees", &path("Email")).unwrap(), None);
        assert_eq!(model.get_property_path("Transport", &path("ShipName")).unwrap(), None);
    }
}
