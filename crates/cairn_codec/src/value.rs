//! Dynamic payload value.

use std::cmp::Ordering;
use std::fmt;

/// A dynamic payload value.
///
/// Item payloads arrive from YAML/JSON collaborators and from the remote
/// store in this shape. Maps keep their pairs sorted by canonical key order
/// when built through [`Value::map`], so two maps with the same entries are
/// structurally equal regardless of the order they were read in.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Finite floating point number.
    Float(f64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Map of key-value pairs.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value with canonically sorted keys.
    ///
    /// Later duplicates of a key replace earlier ones.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut sorted: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match sorted.binary_search_by(|(k, _)| k.cmp_canonical(&key)) {
                Ok(pos) => sorted[pos].1 = value,
                Err(pos) => sorted.insert(pos, (key, value)),
            }
        }
        Value::Map(sorted)
    }

    /// Create a map from text keys.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::map(
            fields
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v))
                .collect(),
        )
    }

    /// Compare two values in canonical order.
    ///
    /// Values of different kinds order by kind; values of the same kind
    /// order length-first, then by content. This is the order map keys are
    /// kept in and the order canonical bytes are written in.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let kind = self.kind_rank().cmp(&other.kind_rank());
        if kind != Ordering::Equal {
            return kind;
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => {
                if *a >= 0 {
                    Self::cmp_unsigned(*a as u64, *b as u64)
                } else {
                    // Negative integers are stored as -1 - n.
                    Self::cmp_unsigned((-1 - *a) as u64, (-1 - *b) as u64)
                }
            }
            (Value::Bytes(a), Value::Bytes(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.cmp_canonical(y))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|((ak, av), (bk, bv))| {
                        ak.cmp_canonical(bk).then_with(|| av.cmp_canonical(bv))
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            (Value::Float(a), Value::Float(b)) => a.to_bits().cmp(&b.to_bits()),
            (a, b) => a.simple_rank().cmp(&b.simple_rank()),
        }
    }

    fn cmp_unsigned(a: u64, b: u64) -> Ordering {
        Self::encoded_len(a)
            .cmp(&Self::encoded_len(b))
            .then_with(|| a.cmp(&b))
    }

    /// Length of the head of an unsigned argument in canonical form.
    pub(crate) fn encoded_len(n: u64) -> usize {
        if n <= 23 {
            1
        } else if n <= 0xFF {
            2
        } else if n <= 0xFFFF {
            3
        } else if n <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    /// Major type of the canonical encoding.
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Integer(n) if *n >= 0 => 0,
            Value::Integer(_) => 1,
            Value::Bytes(_) => 2,
            Value::Text(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Bool(_) | Value::Null | Value::Float(_) => 7,
        }
    }

    /// Initial byte of simple values.
    fn simple_rank(&self) -> u8 {
        match self {
            Value::Bool(false) => 0xf4,
            Value::Bool(true) => 0xf5,
            Value::Null => 0xf6,
            Value::Float(_) => 0xfb,
            _ => 0,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Returns a copy of this map with `key` set to `value`.
    ///
    /// Non-map values are returned unchanged.
    #[must_use]
    pub fn with_field(&self, key: &str, value: Value) -> Value {
        match self {
            Value::Map(pairs) => {
                let mut pairs = pairs.clone();
                pairs.push((Value::Text(key.to_string()), value));
                Value::map(pairs)
            }
            other => other.clone(),
        }
    }

    /// Returns the `title` field of a map payload, if present.
    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_text)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

// Floats compare bitwise, which makes equality reflexive.
impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.to_json()) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_are_sorted_length_first() {
        let map = Value::object([
            ("abc", Value::Integer(1)),
            ("a", Value::Integer(2)),
            ("ab", Value::Integer(3)),
        ]);

        let keys: Vec<_> = map
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_text().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let map = Value::object([("a", Value::Integer(1)), ("a", Value::Integer(2))]);
        assert_eq!(map.as_map().unwrap().len(), 1);
        assert_eq!(map.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = Value::object([("z", Value::from(1)), ("m", Value::from("x"))]);
        let b = Value::object([("m", Value::from("x")), ("z", Value::from(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn integer_ordering() {
        let mut values = vec![
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(1),
            Value::Integer(-2),
            Value::Integer(300),
        ];
        values.sort_by(Value::cmp_canonical);

        assert_eq!(
            values,
            vec![
                Value::Integer(0),
                Value::Integer(1),
                Value::Integer(300),
                Value::Integer(-1),
                Value::Integer(-2),
            ]
        );
    }

    #[test]
    fn simple_values_order_by_initial_byte() {
        let mut values = vec![Value::Null, Value::Float(1.5), Value::Bool(true), Value::Bool(false)];
        values.sort_by(Value::cmp_canonical);
        assert_eq!(
            values,
            vec![Value::Bool(false), Value::Bool(true), Value::Null, Value::Float(1.5)]
        );
    }

    #[test]
    fn floats_compare_bitwise() {
        assert_eq!(Value::Float(0.5), Value::Float(0.5));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Integer(1));
    }

    #[test]
    fn with_field_replaces_existing() {
        let entry = Value::object([("title", Value::from("Home")), ("url", Value::from("/"))]);
        let renamed = entry.with_field("title", Value::from("Home (page)"));

        assert_eq!(renamed.title(), Some("Home (page)"));
        assert_eq!(renamed.get("url"), Some(&Value::from("/")));
        assert_eq!(entry.title(), Some("Home"));
    }

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::from("x").as_text(), Some("x"));
        assert_eq!(Value::from(vec![1i64, 2]).as_array().map(<[Value]>::len), Some(2));
        assert_eq!(Value::Integer(1).get("a"), None);
    }
}
