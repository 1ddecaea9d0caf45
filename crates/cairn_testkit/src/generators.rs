//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keyed collections whose expected
//! reconciliation is known up front.

use std::collections::BTreeSet;

use cairn_codec::Value;
use cairn_sync::{Collection, Item};
use proptest::prelude::*;

/// Strategy for generating item keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,11}").expect("Invalid regex")
}

/// Strategy for generating folder paths up to `depth` segments deep.
pub fn path_strategy(depth: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[a-c]{1,2}").expect("Invalid regex"),
        1..=depth.max(1),
    )
    .prop_map(|segments| segments.join("/"))
}

/// Strategy for generating arbitrary payload values.
///
/// Floats are left out; they are covered by the codec's own tests.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,8}", inner), 0..6).prop_map(Value::object),
        ]
    })
}

/// Strategy for generating entry payloads titled `title`.
pub fn payload_strategy(title: String) -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-z]{1,8}", value_strategy()), 0..4).prop_map(move |fields| {
        let mut pairs: Vec<(String, Value)> = fields
            .into_iter()
            .filter(|(name, _)| name != "title")
            .collect();
        pairs.push(("title".to_string(), Value::from(title.as_str())));
        Value::object(pairs)
    })
}

/// Two collections built from four disjoint key sets.
///
/// `local` holds `local_only`, `equal` and `changed`; `remote` holds
/// `equal`, `changed` and `remote_only`. Equal keys differ remotely only
/// in volatile fields.
#[derive(Debug, Clone)]
pub struct ReconciliationCase {
    /// Local snapshot of the category.
    pub local: Collection,
    /// Remote snapshot of the category.
    pub remote: Collection,
    /// Keys only present locally.
    pub local_only: BTreeSet<String>,
    /// Keys present on both sides with canonically equal payloads.
    pub equal: BTreeSet<String>,
    /// Keys present on both sides with different payloads.
    pub changed: BTreeSet<String>,
    /// Keys only present remotely.
    pub remote_only: BTreeSet<String>,
}

/// Strategy for generating a [`ReconciliationCase`] with up to `max_keys`
/// keys.
pub fn reconciliation_case_strategy(max_keys: usize) -> impl Strategy<Value = ReconciliationCase> {
    prop::collection::btree_map(key_strategy(), 0u8..4, 0..=max_keys).prop_map(|buckets| {
        let mut case = ReconciliationCase {
            local: Collection::new(),
            remote: Collection::new(),
            local_only: BTreeSet::new(),
            equal: BTreeSet::new(),
            changed: BTreeSet::new(),
            remote_only: BTreeSet::new(),
        };

        for (key, bucket) in buckets {
            let current = entry(&key, "current");
            match bucket {
                0 => {
                    case.local.insert(key.clone(), current);
                    case.local_only.insert(key);
                }
                1 => {
                    let mut stored = current.clone();
                    stored.payload = stored
                        .payload
                        .with_field("updated_at", Value::from("2024-01-01T00:00:00Z"))
                        .with_field("_version", Value::from(3));
                    case.local.insert(key.clone(), current);
                    case.remote.insert(key.clone(), stored);
                    case.equal.insert(key);
                }
                2 => {
                    case.local.insert(key.clone(), current);
                    case.remote.insert(key.clone(), entry(&key, "stale"));
                    case.changed.insert(key);
                }
                _ => {
                    case.remote.insert(key.clone(), entry(&key, "orphan"));
                    case.remote_only.insert(key);
                }
            }
        }
        case
    })
}

fn entry(key: &str, body: &str) -> Item {
    Item::new(
        key,
        Value::object([("title", Value::from(key)), ("body", Value::from(body))]),
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn key_is_valid(key in key_strategy()) {
            let first = key.chars().next();
            prop_assert!(first.is_some_and(|c| c.is_ascii_lowercase()));
        }

        #[test]
        fn path_has_no_empty_segments(path in path_strategy(4)) {
            prop_assert!(path.split('/').all(|segment| !segment.is_empty()));
        }

        #[test]
        fn payload_keeps_title(payload in payload_strategy("Home".to_string())) {
            prop_assert_eq!(payload.title(), Some("Home"));
        }

        #[test]
        fn case_buckets_are_disjoint(case in reconciliation_case_strategy(24)) {
            let total = case.local_only.len() + case.equal.len() + case.changed.len() + case.remote_only.len();
            let keys: BTreeSet<&String> = case.local.keys().chain(case.remote.keys()).collect();
            prop_assert_eq!(keys.len(), total);
        }
    }
}
