//! OData Client Core
//!
//! Command resolution and object/payload mapping for clients of OData-style
//! services: entities in named collections with primary and alternate keys,
//! derived types, navigation links and a filter language.
//!
//! The crate turns a partially specified [`CommandSpec`] into a
//! [`ResolvedCommand`] checked against the service schema, and converts
//! between wire payloads and typed [`Instance`]s.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use odata_core::{CommandSpec, Expr, SchemaModel, Session, Settings};
//! use serde_json::json;
//!
//! let model = SchemaModel::from_document(&json!({
//!     "namespace": "NorthwindModel",
//!     "entityTypes": [
//!         { "name": "Order", "key": ["OrderID"], "alternateKeys": [["CustomerID"]] }
//!     ],
//!     "entitySets": [{ "name": "Orders", "entityType": "Order" }]
//! }))
//! .unwrap();
//! let session = Session::new(Settings::new(), Arc::new(model));
//!
//! // A filter on the whole key is a key lookup.
//! let spec = CommandSpec::collection("Order").filter_expr(Expr::property("OrderID").eq(10248));
//! let resolved = session.resolve(&spec).unwrap();
//!
//! assert_eq!(resolved.qualified_collection_name().unwrap(), "Orders");
//! assert_eq!(resolved.filter_as_key().unwrap()["OrderID"], json!(10248));
//! assert!(resolved.filter().is_none());
//! ```
//!
//! # Name Matching
//!
//! | Policy | `order_details` matches `OrderDetails` | `Product` matches `Products` |
//! |--------|----------------------------------------|------------------------------|
//! | `strict` | no | no |
//! | `alphanumeric` | yes | no |
//! | `alphanumeric_case_insensitive` | yes | no |
//! | `not_strict` (default) | yes | yes |
//!
//! # Logging
//!
//! Events go through [`tracing`]. Lenient conversions (dropped payload
//! entries, unresolved type annotations) are reported at `warn` level.

mod cache;
mod command;
mod converter;
mod descriptor;
mod error;
mod expr;
mod keys;
mod metadata;
mod model;
pub mod naming;
mod resolver;
mod session;
mod types;
mod value;

pub use cache::{MetadataCache, MetadataCacheEntry};
pub use command::{BatchEntries, CommandSpec, Entry};
pub use converter::{Converter, ConverterRegistry, PayloadConverter};
pub use descriptor::{
    CollectionShape, EnumDef, FieldType, MemberDef, TypeCache, TypeDef, TypeDescriptor,
};
pub use error::{CacheError, ConvertError, ErrorKind, ModelError, ResolveError, SchemaError};
pub use expr::{AsWritten, BinaryOp, Expr, FilterNames};
pub use keys::{contain_match, exact_match, KeyMatch, KeyMatcher};
pub use metadata::Metadata;
pub use model::{
    validate_document, EntitySetDef, EntityTypeDef, FunctionDef, NavigationDef, PropertyDef,
    SchemaModel,
};
pub use naming::{NameMatcher, Pluralizer};
pub use resolver::ResolvedCommand;
pub use session::Session;
pub use types::{
    EntityCollection, EntryAnnotations, NameMatchKind, Payload, Settings, ANNOTATIONS_LITERAL,
    DEFAULT_DYNAMIC_CONTAINER,
};
pub use value::{EnumValue, Instance, Native};
