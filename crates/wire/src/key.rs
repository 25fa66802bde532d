//! Key envelope encoding and decoding

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use canonstore_core::{Error, Key, KeyPath, PathElement};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current envelope version.
pub const KEY_FORMAT_VERSION: u32 = 1;

/// Key encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyCodecError {
    /// Input is not valid URL-safe base64
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Decoded bytes are not a key envelope
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Envelope version this build cannot read
    #[error("Unsupported key format version: {0}")]
    UnsupportedVersion(u32),

    /// Envelope decoded but violates a key invariant
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<KeyCodecError> for Error {
    fn from(e: KeyCodecError) -> Self {
        Error::invalid_request(e.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyEnvelope {
    version: u32,
    project_id: String,
    #[serde(default)]
    namespace: String,
    path: Vec<PathElement>,
}

/// Encode a key as an opaque, versioned string.
pub fn encode_key(key: &Key) -> Result<String, KeyCodecError> {
    let envelope = KeyEnvelope {
        version: KEY_FORMAT_VERSION,
        project_id: key.project_id().to_string(),
        namespace: key.namespace().to_string(),
        path: key.path().to_vec(),
    };
    let json = serde_json::to_vec(&envelope).map_err(|e| KeyCodecError::InvalidJson(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a string produced by [`encode_key`].
pub fn decode_key(encoded: &str) -> Result<Key, KeyCodecError> {
    let json = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| KeyCodecError::InvalidBase64(e.to_string()))?;
    let envelope: KeyEnvelope =
        serde_json::from_slice(&json).map_err(|e| KeyCodecError::InvalidJson(e.to_string()))?;
    if envelope.version != KEY_FORMAT_VERSION {
        return Err(KeyCodecError::UnsupportedVersion(envelope.version));
    }
    Key::new(envelope.project_id, envelope.namespace, envelope.path)
        .map_err(|e| KeyCodecError::InvalidKey(e.to_string()))
}
