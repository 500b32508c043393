//! Schema queries the resolver needs answered.
//!
//! Implemented once per protocol version by a metadata adapter. The crate
//! ships one reference implementation, [`SchemaModel`](crate::SchemaModel).

use std::fmt::Debug;

use crate::error::ResolveError;
use crate::types::EntityCollection;

/// Read-only view of a parsed schema document.
pub trait Metadata: Send + Sync + Debug {
    /// Collection by name, using the active name match policy.
    fn get_entity_collection(&self, name: &str) -> Result<EntityCollection, ResolveError>;

    /// A derived entity type of `base`, narrowed into its own collection.
    fn get_derived_entity_collection(
        &self,
        base: &EntityCollection,
        derived_name: &str,
    ) -> Result<EntityCollection, ResolveError>;

    /// Primary key property names, in declaration order.
    fn get_declared_key_property_names(
        &self,
        collection_name: &str,
    ) -> Result<Vec<String>, ResolveError>;

    /// Alternate key name sets, in declaration order.
    fn get_alternate_key_property_names(
        &self,
        collection_name: &str,
    ) -> Result<Vec<Vec<String>>, ResolveError>;

    /// Entity type name reached by following `link_name` from a collection.
    fn get_navigation_property_partner_type_name(
        &self,
        collection_name: &str,
        link_name: &str,
    ) -> Result<String, ResolveError>;

    /// Declared spelling of a property path on a collection's entity type.
    ///
    /// Every segment but the last must be a navigation property; following
    /// one moves on to its partner type. `None` when a segment names nothing.
    fn get_property_path(
        &self,
        collection_name: &str,
        path: &[String],
    ) -> Result<Option<Vec<String>>, ResolveError>;

    /// Namespace-qualified type name of a collection's entity type.
    fn get_qualified_type_name(&self, collection_name: &str) -> Result<String, ResolveError>;

    /// Collection a function returns, or `None` for non-entity results.
    fn get_function_return_collection(
        &self,
        function_name: &str,
    ) -> Result<Option<EntityCollection>, ResolveError>;
}
