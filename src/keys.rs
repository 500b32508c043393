//! Key matching.
//!
//! Two families decide whether a set of named values identifies an entity:
//!
//! - **exact**: the named values are precisely the key, no more and no less;
//! - **contained-in** (extraction): the key can be picked out of a larger set.
//!
//! Names are reconciled with the active [`NameMatcher`], never by ordinal
//! comparison alone. Results are keyed by the schema's key names in declared
//! order so they can be handed to a formatter as-is.

use serde_json::Value;

use crate::error::ResolveError;
use crate::metadata::Metadata;
use crate::naming::NameMatcher;
use crate::types::Payload;

/// A successful key match.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMatch {
    /// Key values keyed by schema key name, in declared order.
    pub values: Payload,
    /// Whether an alternate key matched rather than the primary key.
    pub is_alternate: bool,
}

/// Values of `named` whose names the policy reconciles with `key`.
fn candidates<'v>(
    matcher: &dyn NameMatcher,
    named: &'v Payload,
    key: &str,
) -> Vec<(&'v String, &'v Value)> {
    named
        .iter()
        .filter(|(name, _)| matcher.is_match(key, name))
        .collect()
}

/// Succeeds only when `named` holds exactly one value per key name and nothing else.
pub fn exact_match(
    matcher: &dyn NameMatcher,
    named: &Payload,
    key_names: &[String],
) -> Option<Payload> {
    if key_names.is_empty() || named.is_empty() || named.len() != key_names.len() {
        return None;
    }

    let mut values = Payload::new();
    for key in key_names {
        match candidates(matcher, named, key).as_slice() {
            [(_, value)] => {
                values.insert(key.clone(), (*value).clone());
            }
            _ => return None,
        }
    }
    Some(values)
}

/// Succeeds when every key name finds a value in `named`; extra values are ignored.
///
/// With `ignore_nulls`, a key whose value is null counts as missing.
pub fn contain_match(
    matcher: &dyn NameMatcher,
    named: &Payload,
    key_names: &[String],
    ignore_nulls: bool,
) -> Option<Payload> {
    if key_names.is_empty() || named.is_empty() {
        return None;
    }

    let mut values = Payload::new();
    for key in key_names {
        let value = match named.get(key) {
            Some(exact) => exact,
            None => candidates(matcher, named, key).first()?.1,
        };
        if ignore_nulls && value.is_null() {
            return None;
        }
        values.insert(key.clone(), value.clone());
    }
    Some(values)
}

/// Key matching against the keys a collection declares.
#[derive(Debug, Clone, Copy)]
pub struct KeyMatcher<'a> {
    metadata: &'a dyn Metadata,
    matcher: &'a dyn NameMatcher,
    ignore_nulls: bool,
}

impl<'a> KeyMatcher<'a> {
    pub fn new(
        metadata: &'a dyn Metadata,
        matcher: &'a dyn NameMatcher,
        support_nulls_as_key_property_values: bool,
    ) -> Self {
        Self {
            metadata,
            matcher,
            ignore_nulls: !support_nulls_as_key_property_values,
        }
    }

    pub fn match_primary(
        &self,
        collection_name: &str,
        named: &Payload,
    ) -> Result<Option<Payload>, ResolveError> {
        let key = self.metadata.get_declared_key_property_names(collection_name)?;
        Ok(exact_match(self.matcher, named, &key))
    }

    /// First alternate key, in declaration order, that `named` matches exactly.
    pub fn match_alternate(
        &self,
        collection_name: &str,
        named: &Payload,
    ) -> Result<Option<Payload>, ResolveError> {
        let keys = self.metadata.get_alternate_key_property_names(collection_name)?;
        Ok(keys
            .iter()
            .find_map(|key| exact_match(self.matcher, named, key)))
    }

    /// Primary key first, then alternate keys.
    pub fn match_any(
        &self,
        collection_name: &str,
        named: &Payload,
    ) -> Result<Option<KeyMatch>, ResolveError> {
        if let Some(values) = self.match_primary(collection_name, named)? {
            return Ok(Some(KeyMatch {
                values,
                is_alternate: false,
            }));
        }
        Ok(self
            .match_alternate(collection_name, named)?
            .map(|values| KeyMatch {
                values,
                is_alternate: true,
            }))
    }

    pub fn extract_primary(
        &self,
        collection_name: &str,
        named: &Payload,
    ) -> Result<Option<Payload>, ResolveError> {
        let key = self.metadata.get_declared_key_property_names(collection_name)?;
        Ok(contain_match(self.matcher, named, &key, self.ignore_nulls))
    }

    pub fn extract_alternate(
        &self,
        collection_name: &str,
        named: &Payload,
    ) -> Result<Option<Payload>, ResolveError> {
        let keys = self.metadata.get_alternate_key_property_names(collection_name)?;
        Ok(keys
            .iter()
            .find_map(|key| contain_match(self.matcher, named, key, self.ignore_nulls)))
    }

    /// Primary key first, then alternate keys.
    pub fn extract_any(
        &self,
        collection_name: &str,
        named: &Payload,
    ) -> Result<Option<KeyMatch>, ResolveError> {
        if let Some(values) = self.extract_primary(collection_name, named)? {
            return Ok(Some(KeyMatch {
                values,
                is_alternate: false,
            }));
        }
        Ok(self
            .extract_alternate(collection_name, named)?
            .map(|values| KeyMatch {
                values,
                is_alternate: true,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    mod exact {
        use super::*;

        #[test]
        fn equal_sets_match() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "categoryid": 1 }));
            let values = exact_match(matcher.as_ref(), &named, &names(&["CategoryID"])).unwrap();
            assert_eq!(values, payload(json!({ "CategoryID": 1 })));
        }

        #[test]
        fn extra_value_fails() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "CategoryID": 1, "CategoryName": "x" }));
            assert!(exact_match(matcher.as_ref(), &named, &names(&["CategoryID"])).is_none());
        }

        #[test]
        fn missing_value_fails() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "OrderID": 1 }));
            assert!(exact_match(matcher.as_ref(), &named, &names(&["OrderID", "ProductID"])).is_none());
        }

        #[test]
        fn empty_never_matches() {
            let matcher = naming::not_strict();
            assert!(exact_match(matcher.as_ref(), &Payload::new(), &[]).is_none());
            assert!(exact_match(matcher.as_ref(), &Payload::new(), &names(&["ID"])).is_none());
            let named = payload(json!({ "ID": 1 }));
            assert!(exact_match(matcher.as_ref(), &named, &[]).is_none());
        }

        #[test]
        fn two_candidates_for_one_key_fail() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "Order_ID": 1, "OrderID": 2 }));
            assert!(
                exact_match(matcher.as_ref(), &named, &names(&["OrderID", "Other"])).is_none()
            );
        }

        #[test]
        fn strict_policy_is_ordinal() {
            let matcher = naming::strict();
            let named = payload(json!({ "categoryid": 1 }));
            assert!(exact_match(matcher.as_ref(), &named, &names(&["CategoryID"])).is_none());
        }

        #[test]
        fn result_follows_declared_order() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "ProductID": 2, "OrderID": 1 }));
            let values =
                exact_match(matcher.as_ref(), &named, &names(&["OrderID", "ProductID"])).unwrap();
            let keys: Vec<&String> = values.keys().collect();
            assert_eq!(keys, ["OrderID", "ProductID"]);
        }
    }

    mod contained {
        use super::*;

        #[test]
        fn extracts_from_superset() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "CategoryID": 1, "CategoryName": "x" }));
            let values =
                contain_match(matcher.as_ref(), &named, &names(&["CategoryID"]), true).unwrap();
            assert_eq!(values, payload(json!({ "CategoryID": 1 })));
        }

        #[test]
        fn missing_key_fails() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "CategoryName": "x" }));
            assert!(contain_match(matcher.as_ref(), &named, &names(&["CategoryID"]), true).is_none());
        }

        #[test]
        fn null_values_follow_flag() {
            let matcher = naming::not_strict();
            let named = payload(json!({ "EmployeeID": null, "LastName": "Davolio" }));
            let key = names(&["EmployeeID"]);

            assert!(contain_match(matcher.as_ref(), &named, &key, true).is_none());
            let values = contain_match(matcher.as_ref(), &named, &key, false).unwrap();
            assert_eq!(values, payload(json!({ "EmployeeID": null })));
        }
    }
}
