//! URL-safe, unpadded base64 used by Web Push keys and JWT segments.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

use super::WebPushError;

/// Encodes without padding, decodes with or without it.
///
/// Browsers hand out `p256dh`/`auth` unpadded, but some stores keep them
/// padded, so decoding is indifferent to trailing `=`.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64URL.encode(bytes)
}

/// Decode a base64url string.
///
/// Fails with [`WebPushError::Decode`] on characters outside the
/// base64url alphabet or an impossible length.
pub fn decode(input: &str) -> Result<Vec<u8>, WebPushError> {
    BASE64URL
        .decode(input.trim())
        .map_err(|e| WebPushError::Decode(format!("invalid base64url: {e}")))
}

/// Decode a base64url string that must yield exactly `N` bytes.
///
/// `what` names the value in the error message (e.g. "p256dh key").
pub fn decode_exact<const N: usize>(input: &str, what: &str) -> Result<[u8; N], WebPushError> {
    let bytes = decode(input)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_: Vec<u8>| {
        WebPushError::Decode(format!("{what} must decode to {N} bytes, got {len}"))
    })
}
