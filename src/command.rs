//! Unresolved commands.
//!
//! A [`CommandSpec`] is what the fluent query layer hands the resolver: names
//! or name expressions, positional or named key values, a filter, and an
//! optional entry payload. It is never mutated by resolution.

use std::sync::{Arc, Mutex, PoisonError};

use crate::expr::Expr;
use crate::types::Payload;
use crate::value::{Instance, Native};

/// Entry data attached to a command, compared by identity.
#[derive(Debug, Clone)]
pub enum Entry {
    Map(Arc<Payload>),
    Record(Arc<Instance>),
}

impl Entry {
    /// Whether both handles refer to the same entry object.
    pub fn same(&self, other: &Entry) -> bool {
        match (self, other) {
            (Entry::Map(a), Entry::Map(b)) => Arc::ptr_eq(a, b),
            (Entry::Record(a), Entry::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Payload> for Entry {
    fn from(value: Payload) -> Self {
        Entry::Map(Arc::new(value))
    }
}

impl From<Instance> for Entry {
    fn from(value: Instance) -> Self {
        Entry::Record(Arc::new(value))
    }
}

/// Flattened entry payloads of a batch, keyed by entry identity.
///
/// The first payload registered for an entry is the one every later command
/// in the batch sees.
#[derive(Debug, Default)]
pub struct BatchEntries {
    entries: Mutex<Vec<(Entry, Payload)>>,
}

impl BatchEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload registered for `entry`, registering `data` if there is none.
    pub fn get_or_add(&self, entry: &Entry, data: Payload) -> Payload {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, existing)) = entries.iter().find(|(e, _)| e.same(entry)) {
            return existing.clone();
        }
        entries.push((entry.clone(), data.clone()));
        data
    }

    pub fn get(&self, entry: &Entry) -> Option<Payload> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(e, _)| e.same(entry))
            .map(|(_, data)| data.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A partially specified command awaiting resolution.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub collection_name: Option<String>,
    pub collection_expr: Option<Expr>,
    pub derived_collection_name: Option<String>,
    pub derived_collection_expr: Option<Expr>,
    pub link_name: Option<String>,
    pub link_expr: Option<Expr>,
    /// Command the link is navigated from.
    pub parent: Option<Box<CommandSpec>>,
    pub key_values: Option<Vec<Native>>,
    pub named_key_values: Option<Payload>,
    /// Preformatted filter string; a filter expression is ignored when set.
    pub filter: Option<String>,
    pub filter_expr: Option<Expr>,
    pub function_name: Option<String>,
    pub entry: Option<Entry>,
    /// Page size; `None` is unlimited.
    pub top_count: Option<u64>,
    /// Overrides the entry type's dynamic property bag member.
    pub dynamic_properties_container: Option<String>,
    pub batch_entries: Option<Arc<BatchEntries>>,
    pub include_count: bool,
}

impl CommandSpec {
    /// Command addressing a collection by name.
    ///
    /// A `Collection/Derived` name addresses a derived type.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Command addressing a collection through a name expression.
    pub fn collection_expr(expr: Expr) -> Self {
        Self {
            collection_expr: Some(expr),
            ..Self::default()
        }
    }

    /// Navigate `link` from this command.
    pub fn navigate(self, link: impl Into<String>) -> Self {
        Self {
            link_name: Some(link.into()),
            parent: Some(Box::new(self)),
            ..Self::default()
        }
    }

    pub fn navigate_expr(self, link: Expr) -> Self {
        Self {
            link_expr: Some(link),
            parent: Some(Box::new(self)),
            ..Self::default()
        }
    }

    pub fn derived(mut self, name: impl Into<String>) -> Self {
        self.derived_collection_name = Some(name.into());
        self
    }

    pub fn derived_expr(mut self, expr: Expr) -> Self {
        self.derived_collection_expr = Some(expr);
        self
    }

    /// Positional key values, in declared key order.
    pub fn key<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Native>,
    {
        self.key_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn named_key(mut self, values: Payload) -> Self {
        self.named_key_values = Some(values);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn filter_expr(mut self, expr: Expr) -> Self {
        self.filter_expr = Some(expr);
        self
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn entry(mut self, entry: impl Into<Entry>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn top(mut self, count: u64) -> Self {
        self.top_count = Some(count);
        self
    }

    pub fn dynamic_properties_container(mut self, name: impl Into<String>) -> Self {
        self.dynamic_properties_container = Some(name.into());
        self
    }

    pub fn batch(mut self, entries: Arc<BatchEntries>) -> Self {
        self.batch_entries = Some(entries);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.include_count = true;
        self
    }

    pub fn has_key(&self) -> bool {
        self.key_values.is_some() || self.named_key_values.is_some()
    }

    pub fn has_function(&self) -> bool {
        self.function_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn navigate_nests_parent() {
        let spec = CommandSpec::collection("Employees").key([1]).navigate("Superior");
        assert_eq!(spec.link_name.as_deref(), Some("Superior"));
        let parent = spec.parent.as_deref().unwrap();
        assert_eq!(parent.collection_name.as_deref(), Some("Employees"));
        assert_eq!(parent.key_values, Some(vec![Native::Int(1)]));
        assert!(!spec.has_key());
    }

    #[test]
    fn entry_identity() {
        let shared = Entry::from(payload(json!({ "ProductName": "Chai" })));
        let copy = shared.clone();
        let lookalike = Entry::from(payload(json!({ "ProductName": "Chai" })));
        assert!(shared.same(&copy));
        assert!(!shared.same(&lookalike));
    }

    #[test]
    fn batch_keeps_first_payload() {
        let batch = BatchEntries::new();
        let entry = Entry::from(payload(json!({ "ProductName": "Chai" })));

        let first = batch.get_or_add(&entry, payload(json!({ "ProductName": "Chai" })));
        let second = batch.get_or_add(&entry, payload(json!({ "ProductName": "Chang" })));
        assert_eq!(first, second);
        assert_eq!(batch.len(), 1);

        let other = Entry::from(payload(json!({ "ProductName": "Chai" })));
        assert!(batch.get(&other).is_none());
    }
}
