//! Canonical comparison of item payloads.
//!
//! Two payloads are canonically equal when they are structurally equal
//! after every volatile field has been removed at every depth. Volatile
//! fields are the ones the remote store assigns on its own: timestamps,
//! authorship, revision counters, computed ACLs and publish state.

use std::collections::BTreeSet;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::encoder::to_canonical_cbor;
use crate::error::CodecResult;
use crate::value::Value;

/// Fields the remote store assigns and a local snapshot never controls.
pub const DEFAULT_VOLATILE_FIELDS: &[&str] = &[
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "_version",
    "ACL",
    "_in_progress",
    "publish_details",
];

/// Deep structural comparator that ignores volatile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    volatile: BTreeSet<String>,
}

impl Comparator {
    /// Comparator that ignores [`DEFAULT_VOLATILE_FIELDS`].
    pub fn new() -> Self {
        Self::with_volatile_fields(DEFAULT_VOLATILE_FIELDS.iter().copied())
    }

    /// Comparator that ignores exactly the given fields.
    pub fn with_volatile_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            volatile: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Also ignore `field`.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.volatile.insert(field.into());
        self
    }

    /// Whether `field` is ignored.
    pub fn is_volatile(&self, field: &str) -> bool {
        self.volatile.contains(field)
    }

    /// Strip volatile fields at every depth and put maps in canonical order.
    pub fn canonicalize(&self, value: &Value) -> Value {
        match value {
            Value::Map(pairs) => Value::map(
                pairs
                    .iter()
                    .filter(|(k, _)| !k.as_text().is_some_and(|k| self.is_volatile(k)))
                    .map(|(k, v)| (k.clone(), self.canonicalize(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.canonicalize(v)).collect())
            }
            other => other.clone(),
        }
    }

    /// Canonical equality of two payloads. Has no side effects.
    pub fn equal(&self, a: &Value, b: &Value) -> bool {
        self.canonicalize(a) == self.canonicalize(b)
    }

    /// SHA-256 over the canonical bytes of the canonicalized payload.
    ///
    /// Payloads that are canonically equal have equal fingerprints.
    pub fn fingerprint(&self, value: &Value) -> CodecResult<Fingerprint> {
        let bytes = to_canonical_cbor(&self.canonicalize(value))?;
        Ok(Fingerprint(Sha256::digest(&bytes).into()))
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 digest of a canonical payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, updated_at: &str) -> Value {
        Value::object([
            ("title", Value::from(title)),
            ("updated_at", Value::from(updated_at)),
            ("_version", Value::from(3)),
            (
                "blocks",
                Value::Array(vec![Value::object([
                    ("kind", Value::from("hero")),
                    ("created_by", Value::from("blt01")),
                ])]),
            ),
        ])
    }

    #[test]
    fn volatile_fields_are_ignored_at_every_depth() {
        let cmp = Comparator::new();
        assert!(cmp.equal(&entry("Home", "2024-01-01"), &entry("Home", "2025-06-30")));
        assert!(!cmp.equal(&entry("Home", "x"), &entry("About", "x")));
    }

    #[test]
    fn map_order_is_irrelevant() {
        let cmp = Comparator::new();
        let a = Value::Map(vec![
            (Value::from("b"), Value::from(2)),
            (Value::from("a"), Value::from(1)),
        ]);
        let b = Value::object([("a", Value::from(1)), ("b", Value::from(2))]);
        assert!(cmp.equal(&a, &b));
    }

    #[test]
    fn array_order_matters() {
        let cmp = Comparator::new();
        let a = Value::from(vec![1i64, 2]);
        let b = Value::from(vec![2i64, 1]);
        assert!(!cmp.equal(&a, &b));
    }

    #[test]
    fn custom_volatile_fields() {
        let cmp = Comparator::with_volatile_fields(["etag"]);
        let a = Value::object([("etag", Value::from("1")), ("updated_at", Value::from("x"))]);
        let b = Value::object([("etag", Value::from("2")), ("updated_at", Value::from("x"))]);
        let c = Value::object([("etag", Value::from("2")), ("updated_at", Value::from("y"))]);

        assert!(cmp.equal(&a, &b));
        assert!(!cmp.equal(&b, &c));
        assert!(cmp.clone().with_field("updated_at").equal(&a, &c));
    }

    #[test]
    fn canonicalize_strips_fields() {
        let cmp = Comparator::new();
        let stripped = cmp.canonicalize(&entry("Home", "x"));
        assert_eq!(stripped.get("updated_at"), None);
        assert_eq!(stripped.get("_version"), None);
        assert_eq!(stripped.title(), Some("Home"));
    }

    #[test]
    fn fingerprint_follows_equality() {
        let cmp = Comparator::new();
        let a = cmp.fingerprint(&entry("Home", "2024")).unwrap();
        let b = cmp.fingerprint(&entry("Home", "2025")).unwrap();
        let c = cmp.fingerprint(&entry("About", "2024")).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string().len(), 64);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn leaf() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Integer),
                "[a-z]{0,8}".prop_map(Value::Text),
            ]
        }

        fn fields() -> impl Strategy<Value = Vec<(String, Value)>> {
            prop::collection::btree_map("[a-z_]{1,10}", leaf(), 0..8)
                .prop_map(|m| m.into_iter().collect())
        }

        proptest! {
            #[test]
            fn field_order_never_changes_equality(fields in fields()) {
                let cmp = Comparator::new();
                let forward = Value::Map(
                    fields.iter().map(|(k, v)| (Value::from(k.as_str()), v.clone())).collect(),
                );
                let reversed = Value::Map(
                    fields.iter().rev().map(|(k, v)| (Value::from(k.as_str()), v.clone())).collect(),
                );

                prop_assert!(cmp.equal(&forward, &reversed));
                prop_assert_eq!(cmp.fingerprint(&forward).unwrap(), cmp.fingerprint(&reversed).unwrap());
            }

            #[test]
            fn volatile_values_never_change_equality(fields in fields(), stamp in "[0-9]{4}", other in "[0-9]{4}") {
                let cmp = Comparator::new();
                let base = Value::object(fields.into_iter().filter(|(k, _)| !cmp.is_volatile(k)));
                let a = base.with_field("updated_at", Value::Text(stamp));
                let b = base.with_field("updated_at", Value::Text(other));

                prop_assert!(cmp.equal(&a, &b));
                prop_assert!(cmp.equal(&a, &base));
            }
        }
    }
}
