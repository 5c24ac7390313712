//! VAPID assertion (ES256 JWT) construction.
//!
//! The token proves the sending server's identity to one push service
//! origin. ECDSA libraries disagree on signature encoding (ASN.1 DER versus
//! fixed-width `r || s`), while JWS requires the fixed form, so signatures
//! are normalised before encoding.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::base64url;
use super::vapid::VapidKeyPair;
use super::WebPushError;
use crate::constants::VAPID_TOKEN_LIFETIME;

/// ASN.1 SEQUENCE tag.
const DER_SEQUENCE: u8 = 0x30;
/// ASN.1 INTEGER tag.
const DER_INTEGER: u8 = 0x02;
/// Width of each of `r` and `s` for P-256.
const COMPONENT_LEN: usize = 32;

#[derive(Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

/// Claims carried by a VAPID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidClaims {
    /// Push service origin (`scheme://host[:port]`).
    pub aud: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Contact URI of the sender.
    pub sub: String,
}

/// Signed VAPID token plus the public key it was signed with.
#[derive(Debug, Clone)]
pub struct VapidAssertion {
    token: String,
    public_key: String,
    expires_at: i64,
}

impl VapidAssertion {
    /// Compact `header.claims.signature` token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry of the token (Unix seconds).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Value for the `Authorization` request header.
    pub fn authorization_header(&self) -> String {
        format!("vapid t={}, k={}", self.token, self.public_key)
    }
}

/// Audience for a subscription endpoint: its ASCII origin.
///
/// Non-default ports are kept (`https://push.example:8443`), matching what
/// push services compare the `aud` claim against.
pub fn audience_for(endpoint: &str) -> Result<String, WebPushError> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| WebPushError::InvalidSubscription(format!("endpoint is not a URL: {e}")))?;

    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(WebPushError::InvalidSubscription(format!(
            "endpoint must be an http(s) URL with a host, got {endpoint:?}"
        )));
    }

    Ok(url.origin().ascii_serialization())
}

/// Build a VAPID token valid for 24 hours from now.
pub fn build_assertion(
    key_pair: &VapidKeyPair,
    audience: &str,
    subject: &str,
) -> Result<VapidAssertion, WebPushError> {
    build_assertion_at(key_pair, audience, subject, Utc::now().timestamp())
}

/// Build a VAPID token as if the current time were `now` (Unix seconds).
pub fn build_assertion_at(
    key_pair: &VapidKeyPair,
    audience: &str,
    subject: &str,
    now: i64,
) -> Result<VapidAssertion, WebPushError> {
    let header = JwtHeader {
        typ: "JWT",
        alg: "ES256",
    };
    let expires_at = now + VAPID_TOKEN_LIFETIME.as_secs() as i64;
    let claims = VapidClaims {
        aud: audience.to_string(),
        exp: expires_at,
        sub: subject.to_string(),
    };

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| WebPushError::Signing(format!("failed to serialize JWT header: {e}")))?;
    let claims_json = serde_json::to_vec(&claims)
        .map_err(|e| WebPushError::Signing(format!("failed to serialize JWT claims: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        base64url::encode(header_json),
        base64url::encode(claims_json)
    );
    let signature = key_pair.sign(signing_input.as_bytes())?;
    let raw = signature_to_raw(&signature)?;

    Ok(VapidAssertion {
        token: format!("{signing_input}.{}", base64url::encode(raw)),
        public_key: key_pair.public_key_base64url(),
        expires_at,
    })
}

/// Normalise an ECDSA P-256 signature to the 64-byte JWS form.
///
/// A buffer starting with the SEQUENCE tag is parsed as DER first. If that
/// fails and the buffer is exactly 64 bytes it is a raw signature whose `r`
/// happens to start with `0x30`; otherwise it is malformed.
pub fn signature_to_raw(signature: &[u8]) -> Result<[u8; 64], WebPushError> {
    if signature.first() == Some(&DER_SEQUENCE) {
        match der_to_raw(signature) {
            Ok(raw) => return Ok(raw),
            Err(e) if signature.len() != 64 => return Err(e),
            Err(_) => {}
        }
    }

    signature.try_into().map_err(|_| {
        WebPushError::MalformedSignature(format!(
            "expected DER or 64-byte raw signature, got {} bytes",
            signature.len()
        ))
    })
}

/// Convert `SEQUENCE { INTEGER r, INTEGER s }` to `r || s`.
fn der_to_raw(der: &[u8]) -> Result<[u8; 64], WebPushError> {
    let malformed = |what: &str| WebPushError::MalformedSignature(what.to_string());

    if der.len() < 2 || der[0] != DER_SEQUENCE {
        return Err(malformed("missing SEQUENCE header"));
    }
    // ES256 signatures are at most 72 bytes, so only the short length form is valid.
    let seq_len = usize::from(der[1]);
    if seq_len >= 0x80 || seq_len + 2 != der.len() {
        return Err(malformed("SEQUENCE length does not match buffer size"));
    }

    let (r, rest) = read_integer(&der[2..])?;
    let (s, rest) = read_integer(rest)?;
    if !rest.is_empty() {
        return Err(malformed("trailing bytes after INTEGER s"));
    }

    let mut raw = [0u8; 64];
    raw[..COMPONENT_LEN].copy_from_slice(&r);
    raw[COMPONENT_LEN..].copy_from_slice(&s);
    Ok(raw)
}

/// Read one DER INTEGER, returning it left-padded to 32 bytes and the rest.
fn read_integer(input: &[u8]) -> Result<([u8; COMPONENT_LEN], &[u8]), WebPushError> {
    let malformed = |what: &str| WebPushError::MalformedSignature(what.to_string());

    if input.len() < 2 || input[0] != DER_INTEGER {
        return Err(malformed("expected INTEGER"));
    }
    let len = usize::from(input[1]);
    if len == 0 || len >= 0x80 || input.len() < 2 + len {
        return Err(malformed("INTEGER length does not match buffer size"));
    }

    let mut value = &input[2..2 + len];
    // Drop the sign-padding zero DER adds when the high bit is set.
    while value.len() > 1 && value[0] == 0 {
        value = &value[1..];
    }
    if value.len() > COMPONENT_LEN {
        return Err(malformed("INTEGER wider than 32 bytes"));
    }

    let mut padded = [0u8; COMPONENT_LEN];
    padded[COMPONENT_LEN - value.len()..].copy_from_slice(value);
    Ok((padded, &input[2 + len..]))
}
