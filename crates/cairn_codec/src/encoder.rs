//! Canonical byte encoding of payload values.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to canonical CBOR bytes.
///
/// The output is deterministic: map entries are written in the order of
/// their encoded keys (length-first, then bytewise), integers use the
/// shortest head, and floats are always written as 64-bit doubles.
///
/// # Errors
///
/// Returns an error if the value contains a non-finite float.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Writes values in canonical form into an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value, appending to the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(false) => self.buffer.push(0xf4),
            Value::Bool(true) => self.buffer.push(0xf5),
            Value::Integer(n) => self.write_integer(*n),
            Value::Float(f) => self.write_float(*f)?,
            Value::Bytes(b) => {
                self.write_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.write_head(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(pairs) => self.write_map(pairs)?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(0, n as u64);
        } else {
            // -1 - n is non-negative for every negative i64.
            self.write_head(1, (-1 - n) as u64);
        }
    }

    fn write_float(&mut self, f: f64) -> CodecResult<()> {
        if !f.is_finite() {
            return Err(CodecError::NonFiniteFloat);
        }
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major: u8, arg: u64) {
        let mt = major << 5;
        match Value::encoded_len(arg) {
            1 => self.buffer.push(mt | arg as u8),
            2 => {
                self.buffer.push(mt | 24);
                self.buffer.push(arg as u8);
            }
            3 => {
                self.buffer.push(mt | 25);
                self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            5 => {
                self.buffer.push(mt | 26);
                self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buffer.push(mt | 27);
                self.buffer.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn write_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            entries.push((to_canonical_cbor(key)?, value));
        }
        entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        self.write_head(5, entries.len() as u64);
        for (key, value) in entries {
            self.buffer.extend_from_slice(&key);
            self.encode(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(value: &Value) -> Vec<u8> {
        to_canonical_cbor(value).unwrap()
    }

    #[test]
    fn simple_values() {
        assert_eq!(bytes(&Value::Null), vec![0xf6]);
        assert_eq!(bytes(&Value::Bool(false)), vec![0xf4]);
        assert_eq!(bytes(&Value::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn integers_use_shortest_head() {
        assert_eq!(bytes(&Value::Integer(23)), vec![0x17]);
        assert_eq!(bytes(&Value::Integer(24)), vec![0x18, 24]);
        assert_eq!(bytes(&Value::Integer(1000)), vec![0x19, 0x03, 0xe8]);
        assert_eq!(bytes(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(bytes(&Value::Integer(-100)), vec![0x38, 99]);
        assert_eq!(bytes(&Value::Integer(i64::MIN)).len(), 9);
    }

    #[test]
    fn floats_are_doubles() {
        let encoded = bytes(&Value::Float(1.5));
        assert_eq!(encoded[0], 0xfb);
        assert_eq!(&encoded[1..], &1.5f64.to_bits().to_be_bytes());
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        assert_eq!(
            to_canonical_cbor(&Value::Float(f64::NAN)),
            Err(CodecError::NonFiniteFloat)
        );
        assert_eq!(
            to_canonical_cbor(&Value::Array(vec![Value::Float(f64::INFINITY)])),
            Err(CodecError::NonFiniteFloat)
        );
    }

    #[test]
    fn text_and_bytes() {
        assert_eq!(bytes(&Value::from("a")), vec![0x61, b'a']);
        assert_eq!(bytes(&Value::Bytes(vec![1, 2])), vec![0x42, 1, 2]);
    }

    #[test]
    fn unsorted_map_is_written_sorted() {
        // Built without Value::map, so pairs are out of order.
        let raw = Value::Map(vec![
            (Value::from("bb"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(1)),
        ]);
        let sorted = Value::object([("a", Value::Integer(1)), ("bb", Value::Integer(2))]);

        assert_eq!(bytes(&raw), bytes(&sorted));
        assert_eq!(bytes(&sorted), vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }
}
