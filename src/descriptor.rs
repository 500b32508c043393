//! Type descriptor registry.
//!
//! Domain types are declared once with a [`TypeDef`] (members, wire-name
//! overrides, base type, dynamic property bag). The [`TypeCache`] turns a
//! definition into an immutable [`TypeDescriptor`] on first use and hands out
//! the same `Arc` afterwards.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::ConvertError;
use crate::types::DEFAULT_DYNAMIC_CONTAINER;

/// Shape of a collection-typed member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionShape {
    /// Fixed array; the converted sequence is used as-is.
    Array,
    /// Growable list.
    List,
    /// Insertion-ordered set; duplicate elements are dropped.
    Set,
}

/// Declared type of a member or conversion target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// No coercion; the wire value is kept.
    Any,
    Bool,
    Int,
    Float,
    Text,
    /// Enumeration registered under this name.
    Enum(String),
    /// Compound type registered under this name.
    Record(String),
    Collection {
        element: Box<FieldType>,
        shape: CollectionShape,
    },
    /// String-keyed map.
    Map,
    /// Out-of-band entry annotations.
    Annotations,
}

impl FieldType {
    pub fn record(name: impl Into<String>) -> Self {
        FieldType::Record(name.into())
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        FieldType::Enum(name.into())
    }

    pub fn list(element: FieldType) -> Self {
        FieldType::Collection {
            element: Box::new(element),
            shape: CollectionShape::List,
        }
    }

    pub fn array(element: FieldType) -> Self {
        FieldType::Collection {
            element: Box::new(element),
            shape: CollectionShape::Array,
        }
    }

    pub fn set(element: FieldType) -> Self {
        FieldType::Collection {
            element: Box::new(element),
            shape: CollectionShape::Set,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, FieldType::Map)
    }

    /// Display name used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Any => "any".to_string(),
            FieldType::Bool => "bool".to_string(),
            FieldType::Int => "int".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Text => "text".to_string(),
            FieldType::Enum(name) | FieldType::Record(name) => name.clone(),
            FieldType::Collection { element, shape } => {
                format!("{:?}<{}>", shape, element.describe())
            }
            FieldType::Map => "map".to_string(),
            FieldType::Annotations => "annotations".to_string(),
        }
    }
}

/// A structural member of a domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDef {
    pub name: String,
    pub field_type: FieldType,
    /// Wire name override; defaults to `name`.
    pub mapped_name: Option<String>,
    pub writable: bool,
}

impl MemberDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mapped_name: None,
            writable: true,
        }
    }

    /// Map this member to a different wire name.
    pub fn mapped_as(mut self, mapped_name: impl Into<String>) -> Self {
        self.mapped_name = Some(mapped_name.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// The wire name of this member.
    pub fn wire_name(&self) -> &str {
        self.mapped_name.as_deref().unwrap_or(&self.name)
    }
}

/// An enumeration with named integral members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.push((name.into(), value));
        self
    }

    /// Case-sensitive lookup by member name.
    pub fn by_name(&self, name: &str) -> Option<(&str, i64)> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, v)| (n.as_str(), *v))
    }

    pub fn by_value(&self, value: i64) -> Option<(&str, i64)> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, v)| (n.as_str(), *v))
    }
}

/// Declaration of a domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub namespace: Option<String>,
    /// Schema type name override; defaults to `name`.
    pub mapped_name: Option<String>,
    pub base: Option<String>,
    pub members: Vec<MemberDef>,
    pub dynamic_properties: Option<String>,
    /// Transient record built through a constructor rather than member writes.
    pub anonymous: bool,
    /// Constructor parameter lists, by member name.
    pub constructors: Vec<Vec<String>>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            mapped_name: None,
            base: None,
            members: Vec::new(),
            dynamic_properties: None,
            anonymous: false,
            constructors: Vec::new(),
        }
    }

    /// A transient record whose only constructor takes every member in order.
    pub fn anonymous(name: impl Into<String>, members: Vec<MemberDef>) -> Self {
        let constructor = members.iter().map(|m| m.name.clone()).collect();
        Self {
            anonymous: true,
            constructors: vec![constructor],
            members,
            ..Self::new(name)
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn mapped_as(mut self, mapped_name: impl Into<String>) -> Self {
        self.mapped_name = Some(mapped_name.into());
        self
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    /// Declare a dynamic property bag member of type [`FieldType::Map`].
    pub fn dynamic_properties(mut self, member: impl Into<String>) -> Self {
        let member = member.into();
        if !self.members.iter().any(|m| m.name == member) {
            self.members.push(MemberDef::new(member.clone(), FieldType::Map));
        }
        self.dynamic_properties = Some(member);
        self
    }

    /// Add an extra constructor taking the named members.
    pub fn constructor<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constructors
            .push(parameters.into_iter().map(Into::into).collect());
        self
    }

    /// Namespace-qualified name, or the bare name without a namespace.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// Structural facts about a domain type, built once and immutable thereafter.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    full_name: String,
    mapped_name: String,
    base: Option<String>,
    declared_members: Vec<MemberDef>,
    members: Vec<MemberDef>,
    by_mapped_name: HashMap<String, usize>,
    by_member_name: HashMap<String, usize>,
    derived_types: Vec<String>,
    dynamic_container: Option<String>,
    annotations_member: Option<String>,
    anonymous: bool,
    constructors: Vec<Vec<String>>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Schema name this type corresponds to.
    pub fn mapped_name(&self) -> &str {
        &self.mapped_name
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Members declared on this type only.
    pub fn declared_members(&self) -> &[MemberDef] {
        &self.declared_members
    }

    /// Inherited members first, then declared ones.
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    /// Members that travel on the wire, paired with their wire names.
    pub fn mapped_members(&self) -> impl Iterator<Item = (&str, &MemberDef)> {
        self.members
            .iter()
            .filter(|m| m.field_type != FieldType::Annotations)
            .map(|m| (m.wire_name(), m))
    }

    pub fn member(&self, name: &str) -> Option<&MemberDef> {
        self.by_member_name.get(name).map(|&i| &self.members[i])
    }

    /// Exact lookup by wire name.
    pub fn member_by_mapped_name(&self, mapped_name: &str) -> Option<&MemberDef> {
        self.by_mapped_name.get(mapped_name).map(|&i| &self.members[i])
    }

    /// Wire name of a member, by member name.
    pub fn mapped_name_of(&self, member: &str) -> Option<&str> {
        self.member(member).map(MemberDef::wire_name)
    }

    /// Known types that inherit from this one, directly or transitively.
    pub fn derived_types(&self) -> &[String] {
        &self.derived_types
    }

    pub fn dynamic_container(&self) -> Option<&str> {
        self.dynamic_container.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic_container.is_some()
    }

    /// Member receiving the reserved annotations entry, if any.
    pub fn annotations_member(&self) -> Option<&str> {
        self.annotations_member.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn constructors(&self) -> &[Vec<String>] {
        &self.constructors
    }
}

/// Process-lifetime registry of domain type and enum definitions.
///
/// Safe to share between threads. Descriptors are built lazily; two threads
/// racing on the same type may both build one, and the first insert wins.
#[derive(Debug, Default)]
pub struct TypeCache {
    catalog: RwLock<IndexMap<String, TypeDef>>,
    enums: RwLock<HashMap<String, Arc<EnumDef>>>,
    containers: RwLock<HashMap<String, String>>,
    descriptors: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a type known to the registry.
    ///
    /// Cached descriptors of the type and its ancestors are dropped so their
    /// derived-type sets pick it up; descriptors already handed out stay valid.
    pub fn define(&self, def: TypeDef) {
        let mut lineage = vec![def.name.clone()];
        {
            let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
            let mut base = def.base.clone();
            while let Some(name) = base {
                if lineage.contains(&name) {
                    break;
                }
                base = catalog.get(&name).and_then(|d| d.base.clone());
                lineage.push(name);
            }
            catalog.insert(def.name.clone(), def);
        }

        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for name in &lineage {
            descriptors.remove(name);
        }
    }

    pub fn define_enum(&self, def: EnumDef) {
        self.enums
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(def.name.clone(), Arc::new(def));
    }

    pub fn enum_def(&self, name: &str) -> Option<Arc<EnumDef>> {
        self.enums
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Build (or fetch) the descriptor of a defined type.
    pub fn register(&self, name: &str) -> Result<Arc<TypeDescriptor>, ConvertError> {
        self.describe(name)
    }

    /// Mark a type as holding a dynamic property bag.
    ///
    /// `container` defaults to `DynamicProperties`. Derived types inherit the
    /// container unless they are registered with their own.
    pub fn register_dynamic(
        &self,
        name: &str,
        container: Option<&str>,
    ) -> Result<Arc<TypeDescriptor>, ConvertError> {
        let container = container.unwrap_or(DEFAULT_DYNAMIC_CONTAINER).to_string();
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), container);

        let stale: Vec<String> = {
            let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
            catalog
                .keys()
                .filter(|n| *n == name || inherits_from(&catalog, n, name))
                .cloned()
                .collect()
        };
        {
            let mut descriptors = self
                .descriptors
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for n in &stale {
                descriptors.remove(n);
            }
        }

        self.describe(name)
    }

    /// Descriptor of a defined type, built on first use.
    pub fn describe(&self, name: &str) -> Result<Arc<TypeDescriptor>, ConvertError> {
        if let Some(found) = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(found.clone());
        }

        let built = Arc::new(self.build(name)?);
        debug!(type_name = name, members = built.members.len(), "built type descriptor");

        Ok(self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(built)
            .clone())
    }

    /// Name of the dynamic property bag of a type, if it has one.
    pub fn dynamic_container_name(&self, name: &str) -> Option<String> {
        self.describe(name)
            .ok()
            .and_then(|d| d.dynamic_container().map(str::to_string))
    }

    pub fn is_anonymous(&self, name: &str) -> bool {
        self.describe(name).map(|d| d.is_anonymous()).unwrap_or(false)
    }

    /// Find a defined type whose name or qualified name equals `name` exactly.
    pub fn find_by_exact_name(&self, name: &str) -> Option<String> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|d| d.name == name || d.full_name() == name)
            .map(|d| d.name.clone())
    }

    fn build(&self, name: &str) -> Result<TypeDescriptor, ConvertError> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        let def = catalog.get(name).ok_or_else(|| ConvertError::UnknownType {
            name: name.to_string(),
        })?;

        // Ancestors from the root down to (and including) this type.
        let mut chain = vec![def];
        let mut base = def.base.as_deref();
        while let Some(base_name) = base {
            if chain.iter().any(|d| d.name == base_name) {
                break;
            }
            let base_def = catalog
                .get(base_name)
                .ok_or_else(|| ConvertError::UnknownType {
                    name: base_name.to_string(),
                })?;
            chain.push(base_def);
            base = base_def.base.as_deref();
        }
        chain.reverse();

        let mut members: Vec<MemberDef> = Vec::new();
        for ancestor in &chain {
            for member in &ancestor.members {
                match members.iter_mut().find(|m| m.name == member.name) {
                    Some(existing) => *existing = member.clone(),
                    None => members.push(member.clone()),
                }
            }
        }

        let mut by_mapped_name = HashMap::new();
        let mut by_member_name = HashMap::new();
        for (i, member) in members.iter().enumerate() {
            by_member_name.insert(member.name.clone(), i);
            if member.field_type != FieldType::Annotations {
                by_mapped_name.entry(member.wire_name().to_string()).or_insert(i);
            }
        }

        let dynamic_container = {
            let containers = self
                .containers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            chain
                .iter()
                .rev()
                .find_map(|d| {
                    containers
                        .get(&d.name)
                        .cloned()
                        .or_else(|| d.dynamic_properties.clone())
                })
        };

        if let Some(container) = &dynamic_container {
            let member = members.iter().find(|m| &m.name == container).ok_or_else(|| {
                ConvertError::ContainerMissing {
                    type_name: name.to_string(),
                    member: container.clone(),
                }
            })?;
            if !member.field_type.is_map() {
                return Err(ConvertError::ContainerNotMap {
                    type_name: name.to_string(),
                    member: container.clone(),
                });
            }
        }

        let annotations_member = members
            .iter()
            .find(|m| m.field_type == FieldType::Annotations)
            .map(|m| m.name.clone());

        let derived_types = catalog
            .keys()
            .filter(|n| *n != name && inherits_from(&catalog, n, name))
            .cloned()
            .collect();

        Ok(TypeDescriptor {
            name: def.name.clone(),
            full_name: def.full_name(),
            mapped_name: def.mapped_name.clone().unwrap_or_else(|| def.name.clone()),
            base: def.base.clone(),
            declared_members: def.members.clone(),
            members,
            by_mapped_name,
            by_member_name,
            derived_types,
            dynamic_container,
            annotations_member,
            anonymous: def.anonymous,
            constructors: def.constructors.clone(),
        })
    }
}

/// True if `name` has `ancestor` somewhere in its base chain.
fn inherits_from(catalog: &IndexMap<String, TypeDef>, name: &str, ancestor: &str) -> bool {
    let mut seen = 0;
    let mut base = catalog.get(name).and_then(|d| d.base.as_deref());
    while let Some(current) = base {
        if current == ancestor {
            return true;
        }
        seen += 1;
        if seen > catalog.len() {
            return false;
        }
        base = catalog.get(current).and_then(|d| d.base.as_deref());
    }
    false
}
