//! Opaque key encoding for canonstore
//!
//! Document backends have no native key type, so every persisted document
//! carries its canonical [`Key`](canonstore_core::Key) as an opaque string.
//! This crate produces and parses that string.
//!
//! ## Format
//!
//! URL-safe base64 (no padding) of a JSON envelope:
//!
//! ```json
//! {"version":1,"projectId":"p","namespace":"ns","path":[{"kind":"K","idOrName":{"id":5}}]}
//! ```
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `version` | format version, currently `1` |
//! | `projectId` | project id |
//! | `namespace` | namespace, empty when absent |
//! | `path` | ancestors then leaf; `idOrName` is `{"id": n}` or `{"name": s}` |
//!
//! ## Examples
//!
//! ```
//! use canonstore_core::KeyBuilder;
//! use canonstore_wire::{decode_key, encode_key};
//!
//! let key = KeyBuilder::new("test-project", "Task").build_with_id(7).unwrap();
//! let encoded = encode_key(&key).unwrap();
//! assert_eq!(decode_key(&encoded).unwrap(), key);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod key;

// Re-export main types
pub use key::{decode_key, encode_key, KeyCodecError, KEY_FORMAT_VERSION};
