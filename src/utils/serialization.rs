// src/utils/serialization.rs
//! Serialization helpers for compact JWS segments.
//!
//! Proof tokens are three base64url (unpadded) segments: header, claims and
//! signature. These helpers encode and decode the JSON segments.

use serde::{de::DeserializeOwned, Serialize};

/// Encodes raw bytes as unpadded base64url.
pub fn encode_segment(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

/// Serializes `value` to JSON and encodes it as a JWS segment.
///
/// # Errors
/// Returns `serde_json::Error` if `value` cannot be serialized.
pub fn encode_json_segment<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(encode_segment(&serde_json::to_vec(value)?))
}

/// Decodes a base64url JWS segment and deserializes its JSON content.
///
/// # Errors
/// Returns a description of the failure if the segment is not base64url or
/// the decoded bytes are not the expected JSON.
pub fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = base64::decode_config(segment, base64::URL_SAFE_NO_PAD)
        .map_err(|e| format!("Base64 decoding failed: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("Deserialization failed: {}", e))
}
