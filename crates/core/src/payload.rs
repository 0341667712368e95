//! Base64 image payload helpers.
//!
//! The backend returns bare base64 strings, but some builds prefix them
//! with a `data:` URI header. Both forms are accepted on input; output
//! is always bare base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Strip a leading `data:<mime>;base64,` header if present.
pub fn strip_data_uri(payload: &str) -> &str {
    let trimmed = payload.trim();
    match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(trimmed, |(_, data)| data),
        None => trimmed,
    }
}

/// Decode a (possibly data-URI prefixed) base64 image payload.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(strip_data_uri(payload))
}

/// Encode raw image bytes as bare base64.
pub fn encode_image_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap a bare base64 PNG payload in a `data:image/png;base64,` URI.
pub fn png_data_uri(payload: &str) -> String {
    format!("data:image/png;base64,{}", strip_data_uri(payload))
}
