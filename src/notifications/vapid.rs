//! VAPID server identity for Web Push (RFC 8292).
//!
//! [`VapidKeys`] is the stored form: base64url strings for the uncompressed
//! public point and the raw 32-byte private scalar (the JWK "d" value).
//! [`VapidKeyPair`] is the imported form used for signing, built once per
//! dispatch and shared read-only by every send in it.

// Rust guideline compliant 2026-02

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::base64url;
use super::provider::{CryptoProvider, SecretScalar, PUBLIC_KEY_LEN, SCALAR_LEN};
use super::WebPushError;

/// VAPID keypair as configured.
///
/// The private key is the raw 32-byte scalar (base64url), not SEC1 or
/// PKCS8 DER. The public key is the uncompressed SEC1 point (65 bytes), the
/// same value browsers receive as `applicationServerKey`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeys {
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    public_key: String,
    /// Raw 32-byte P-256 private key scalar (base64url).
    private_key: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl VapidKeys {
    /// Generate a fresh VAPID keypair.
    ///
    /// Only used by `clinic-push generate-keys`; storing the result is up
    /// to the operator.
    pub fn generate(provider: &dyn CryptoProvider) -> Result<Self, WebPushError> {
        let pair = provider.generate_key_pair()?;
        Ok(Self {
            public_key: base64url::encode(pair.public),
            private_key: base64url::encode(pair.secret.as_bytes()),
        })
    }

    /// Reconstruct from base64url-encoded strings.
    ///
    /// Checks the decoded lengths only; a wrong length is a configuration
    /// problem and is reported as [`WebPushError::Configuration`]. Curve
    /// validation happens in [`VapidKeyPair::import`].
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self, WebPushError> {
        let public_key_b64 = public_key_b64.trim();
        let private_key_b64 = private_key_b64.trim();

        if public_key_b64.is_empty() || private_key_b64.is_empty() {
            return Err(WebPushError::Configuration(
                "VAPID public and private keys must both be set".to_string(),
            ));
        }

        let pub_bytes: [u8; PUBLIC_KEY_LEN] =
            base64url::decode_exact(public_key_b64, "VAPID public key")
                .map_err(|e| WebPushError::Configuration(e.to_string()))?;
        if pub_bytes[0] != 0x04 {
            return Err(WebPushError::Configuration(
                "VAPID public key must be an uncompressed P-256 point (0x04 prefix)".to_string(),
            ));
        }

        base64url::decode_exact::<SCALAR_LEN>(private_key_b64, "VAPID private key")
            .map_err(|e| WebPushError::Configuration(e.to_string()))?;

        Ok(Self {
            public_key: public_key_b64.to_string(),
            private_key: private_key_b64.to_string(),
        })
    }

    /// Base64url-encoded uncompressed public key (65 bytes decoded).
    ///
    /// This is the `k=` parameter of the `Authorization` header.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key
    }

    /// Base64url-encoded raw 32-byte private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key
    }
}

/// Imported VAPID key pair able to produce ES256 signatures.
pub struct VapidKeyPair {
    public_key: [u8; PUBLIC_KEY_LEN],
    private_key: SecretScalar,
    provider: Arc<dyn CryptoProvider>,
}

impl std::fmt::Debug for VapidKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeyPair")
            .field("public_key", &base64url::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

impl VapidKeyPair {
    /// Import stored keys into a signing-capable key pair.
    ///
    /// The public point is split into its x (bytes 1..33) and y (bytes
    /// 33..65) coordinates and checked against the point derived from the
    /// private scalar, the same consistency a JWK `{x, y, d}` import needs.
    pub fn import(provider: Arc<dyn CryptoProvider>, keys: &VapidKeys) -> Result<Self, WebPushError> {
        let public_key: [u8; PUBLIC_KEY_LEN] =
            base64url::decode_exact(&keys.public_key, "VAPID public key")
                .map_err(|e| WebPushError::KeyImport(e.to_string()))?;
        let scalar: [u8; SCALAR_LEN] = base64url::decode_exact(&keys.private_key, "VAPID private key")
            .map_err(|e| WebPushError::KeyImport(e.to_string()))?;
        let private_key = SecretScalar::new(scalar);

        provider.validate_public_key(&public_key)?;

        let (x, y) = (&public_key[1..33], &public_key[33..65]);
        let derived = provider.public_key_for(&private_key)?;
        if derived[1..33] != *x || derived[33..65] != *y {
            return Err(WebPushError::KeyImport(
                "VAPID private key does not match the public key".to_string(),
            ));
        }

        Ok(Self {
            public_key,
            private_key,
            provider,
        })
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    /// Base64url-encoded uncompressed public key.
    pub fn public_key_base64url(&self) -> String {
        base64url::encode(self.public_key)
    }

    /// ECDSA P-256 / SHA-256 signature, in whatever form the provider emits.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, WebPushError> {
        self.provider.sign_es256(&self.private_key, message)
    }
}

/// Server identity presented to push services: keys plus contact subject.
#[derive(Debug, Clone)]
pub struct VapidIdentity {
    /// Stored key material.
    pub keys: VapidKeys,
    /// Contact URI (`mailto:` or `https:`), the JWT `sub` claim.
    pub subject: String,
}

impl VapidIdentity {
    /// Build an identity, validating the subject URI scheme.
    pub fn new(keys: VapidKeys, subject: impl Into<String>) -> Result<Self, WebPushError> {
        let subject = subject.into();
        if !(subject.starts_with("mailto:") || subject.starts_with("https:")) {
            return Err(WebPushError::Configuration(format!(
                "VAPID subject must be a mailto: or https: URI, got {subject:?}"
            )));
        }
        Ok(Self { keys, subject })
    }
}
