//! Base64 helpers for code payloads and downloaded file content

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::SandboxResult;

/// Encode source text for the execute endpoint
pub fn encode_code(code: &str) -> String {
    encode_bytes(code.as_bytes())
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode the `content` returned by a file download into raw bytes
pub fn decode_content(content: &str) -> SandboxResult<Vec<u8>> {
    Ok(STANDARD.decode(content)?)
}
