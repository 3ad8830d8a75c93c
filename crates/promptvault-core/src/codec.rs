//! Binary/text transcoding for envelope fields.
//!
//! Standard base64 (RFC 4648, padded), as embedded in uploaded JSON records.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Encode raw bytes as a transportable string.
pub fn to_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a transportable string back into raw bytes.
pub fn from_text(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text)
        .map_err(|e| CodecError::InvalidEncoding(e.to_string()))
}
