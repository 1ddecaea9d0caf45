//! # Cairn Codec
//!
//! Payload values and canonical comparison for the Cairn reconciliation
//! engine.
//!
//! - [`Value`] is the dynamic payload model shared by local snapshots and
//!   the remote store.
//! - [`Comparator`] decides canonical equality: deep, map-order
//!   insensitive, ignoring server-assigned volatile fields.
//! - [`to_canonical_cbor`] writes a deterministic byte form used for
//!   [`Fingerprint`]s.
//!
//! ```
//! use cairn_codec::{Comparator, Value};
//!
//! let local = Value::object([("title", Value::from("Home"))]);
//! let remote = Value::object([
//!     ("updated_at", Value::from("2024-05-01T10:00:00Z")),
//!     ("title", Value::from("Home")),
//! ]);
//! assert!(Comparator::new().equal(&local, &remote));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod canonical;
mod encoder;
mod error;
mod json;
mod value;

pub use canonical::{Comparator, Fingerprint, DEFAULT_VOLATILE_FIELDS};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;
