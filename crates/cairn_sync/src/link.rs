//! References between items.
//!
//! Locally an item points at another one by logical path:
//! `{"$link": "<category>/<key>"}`. The remote store only understands
//! identifiers: `{"$ref": {"category": .., "id": ..}}`. Resolving turns the
//! first form into the second; unresolving turns remote payloads back into
//! the local form so both sides compare canonically.

use std::collections::{BTreeMap, BTreeSet};

use cairn_codec::Value;

use crate::item::{Collection, ItemId};

/// Map key of a local link.
pub const LINK_KEY: &str = "$link";

/// Map key of a remote reference.
pub const REF_KEY: &str = "$ref";

/// Logical path of an item: `category/key`.
pub fn item_path(category: &str, key: &str) -> String {
    format!("{category}/{key}")
}

/// Splits a logical path into category and key.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    path.split_once('/')
        .filter(|(category, key)| !category.is_empty() && !key.is_empty())
}

/// A local link to `path`.
pub fn link(path: impl Into<String>) -> Value {
    Value::object([(LINK_KEY, Value::Text(path.into()))])
}

/// A remote reference to `id` in `category`.
pub fn remote_ref(category: &str, id: &ItemId) -> Value {
    Value::object([(
        REF_KEY,
        Value::object([
            ("category", Value::from(category)),
            ("id", Value::from(id.as_str())),
        ]),
    )])
}

fn as_link(value: &Value) -> Option<&str> {
    match value.as_map()? {
        [(k, Value::Text(path))] if k.as_text() == Some(LINK_KEY) => Some(path.as_str()),
        _ => None,
    }
}

fn as_remote_ref(value: &Value) -> Option<(&str, &str)> {
    match value.as_map()? {
        [(k, target)] if k.as_text() == Some(REF_KEY) => {
            Some((target.get("category")?.as_text()?, target.get("id")?.as_text()?))
        }
        _ => None,
    }
}

/// Translates logical paths into identifiers.
pub trait LinkResolver {
    /// The identifier of the item at `path`, if it exists yet.
    fn resolve(&self, path: &str) -> Option<ItemId>;
}

/// Rewrites every link in `value` into a remote reference.
///
/// A link that cannot be resolved becomes `Null` inside a map and is
/// dropped from an array.
pub fn resolve_links<R: LinkResolver + ?Sized>(value: &Value, resolver: &R) -> Value {
    let to_ref = |path: &str| {
        let (category, _) = split_path(path)?;
        let id = resolver.resolve(path)?;
        Some(remote_ref(category, &id))
    };
    map_links(value, &to_ref).unwrap_or(Value::Null)
}

/// Removes every link whose target `live` rejects, the way
/// [`resolve_links`] drops a link it cannot resolve.
pub fn prune_links(value: &Value, live: &dyn Fn(&str) -> bool) -> Value {
    let keep = |path: &str| {
        split_path(path)?;
        live(path).then(|| link(path))
    };
    map_links(value, &keep).unwrap_or(Value::Null)
}

fn map_links(value: &Value, rewrite: &dyn Fn(&str) -> Option<Value>) -> Option<Value> {
    if let Some(path) = as_link(value) {
        return rewrite(path);
    }

    Some(match value {
        Value::Map(pairs) => Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), map_links(v, rewrite).unwrap_or(Value::Null)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().filter_map(|v| map_links(v, rewrite)).collect())
        }
        other => other.clone(),
    })
}

/// Every logical path `value` links to, in order of first appearance.
pub fn references(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    let mut seen = BTreeSet::new();
    collect_links(value, &mut |path| {
        if seen.insert(path.to_string()) {
            found.push(path.to_string());
        }
    });
    found
}

fn collect_links(value: &Value, visit: &mut dyn FnMut(&str)) {
    if let Some(path) = as_link(value) {
        visit(path);
        return;
    }
    match value {
        Value::Map(pairs) => pairs.iter().for_each(|(_, v)| collect_links(v, visit)),
        Value::Array(items) => items.iter().for_each(|v| collect_links(v, visit)),
        _ => {}
    }
}

/// Identifier to logical path, across every category of the remote side.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    paths: BTreeMap<(String, ItemId), String>,
}

impl IdIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every identified item of `category`.
    pub fn add_collection(&mut self, category: &str, items: &Collection) {
        for (key, item) in items {
            if let Some(id) = &item.id {
                self.insert(category, id.clone(), key);
            }
        }
    }

    /// Indexes one item.
    pub fn insert(&mut self, category: &str, id: ItemId, key: &str) {
        self.paths
            .insert((category.to_string(), id), item_path(category, key));
    }

    /// Logical path of `id` in `category`.
    pub fn path(&self, category: &str, id: &str) -> Option<&str> {
        self.paths
            .get(&(category.to_string(), ItemId::from(id)))
            .map(String::as_str)
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Rewrites remote references in `value` back into local links.
///
/// References to unknown identifiers are kept as they are, so the item
/// compares unequal and is rewritten.
pub fn unresolve_links(value: &Value, index: &IdIndex) -> Value {
    if let Some((category, id)) = as_remote_ref(value) {
        if let Some(path) = index.path(category, id) {
            return link(path);
        }
        return value.clone();
    }

    match value {
        Value::Map(pairs) => Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), unresolve_links(v, index)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| unresolve_links(v, index)).collect()),
        other => other.clone(),
    }
}
