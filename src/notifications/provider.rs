//! Cryptographic capability used by the encryption engine and JWT builder.
//!
//! The aes128gcm encoding and VAPID token layout are byte-exact protocol
//! logic; the primitives underneath (P-256, HMAC-SHA-256, AES-128-GCM) are
//! interchangeable. [`CryptoProvider`] is the seam between the two, with
//! [`RustCryptoProvider`] as the default implementation on top of the
//! RustCrypto `p256`, `hmac` and `aes-gcm` crates.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use hmac::{Hmac, Mac};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::WebPushError;

type HmacSha256 = Hmac<Sha256>;

/// Length of an uncompressed SEC1 P-256 point (`0x04 || x || y`).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a P-256 private scalar.
pub const SCALAR_LEN: usize = 32;

/// P-256 private scalar, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretScalar([u8; SCALAR_LEN]);

impl SecretScalar {
    /// Wrap raw scalar bytes.
    pub fn new(bytes: [u8; SCALAR_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw scalar bytes.
    pub fn as_bytes(&self) -> &[u8; SCALAR_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

/// Single-use P-256 key pair for one encrypted message.
#[derive(Debug, Clone)]
pub struct EphemeralKeyPair {
    /// Private scalar.
    pub secret: SecretScalar,
    /// Uncompressed public point.
    pub public: [u8; PUBLIC_KEY_LEN],
}

/// Primitive operations needed for Web Push.
///
/// Keys cross this boundary as raw bytes (SEC1 points and 32-byte scalars)
/// so implementations can be backed by any library.
pub trait CryptoProvider: Send + Sync + std::fmt::Debug {
    /// Fill `buf` with cryptographically secure random bytes.
    fn fill_random(&self, buf: &mut [u8]);

    /// Generate a fresh P-256 key pair.
    fn generate_key_pair(&self) -> Result<EphemeralKeyPair, WebPushError>;

    /// Derive the uncompressed public point for a private scalar.
    ///
    /// Fails if the scalar is zero or not below the curve order.
    fn public_key_for(&self, secret: &SecretScalar) -> Result<[u8; PUBLIC_KEY_LEN], WebPushError>;

    /// Check that `public` is a valid uncompressed point on P-256.
    fn validate_public_key(&self, public: &[u8]) -> Result<(), WebPushError>;

    /// ECDH between our scalar and the peer's point; returns the x coordinate.
    fn ecdh(&self, secret: &SecretScalar, peer_public: &[u8]) -> Result<[u8; 32], WebPushError>;

    /// HMAC-SHA-256 of `data` under `key`.
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], WebPushError>;

    /// AES-128-GCM encryption; the 16-byte tag is appended to the output.
    fn aes128gcm_encrypt(
        &self,
        key: &[u8; 16],
        nonce: &[u8; 12],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, WebPushError>;

    /// ECDSA P-256 / SHA-256 signature over `message`.
    ///
    /// Implementations may return either DER or raw `r || s`; the JWT
    /// builder normalises both.
    fn sign_es256(&self, secret: &SecretScalar, message: &[u8]) -> Result<Vec<u8>, WebPushError>;
}

/// [`CryptoProvider`] backed by the RustCrypto crates.
///
/// `sign_es256` returns the fixed 64-byte `r || s` form (RFC 6979
/// deterministic nonces).
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    fn secret_key(secret: &SecretScalar) -> Result<SecretKey, WebPushError> {
        SecretKey::from_slice(secret.as_bytes())
            .map_err(|e| WebPushError::KeyImport(format!("invalid P-256 scalar: {e}")))
    }

    fn encode_point(public: &PublicKey) -> Result<[u8; PUBLIC_KEY_LEN], WebPushError> {
        public
            .to_encoded_point(false)
            .as_bytes()
            .try_into()
            .map_err(|_| WebPushError::KeyImport("unexpected point encoding".to_string()))
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn fill_random(&self, buf: &mut [u8]) {
        rand::rng().fill_bytes(buf);
    }

    fn generate_key_pair(&self) -> Result<EphemeralKeyPair, WebPushError> {
        let secret_key = SecretKey::random(&mut OsRng);
        let public = Self::encode_point(&secret_key.public_key())?;

        let mut scalar = [0u8; SCALAR_LEN];
        scalar.copy_from_slice(&secret_key.to_bytes());
        let secret = SecretScalar::new(scalar);
        scalar.zeroize();

        Ok(EphemeralKeyPair { secret, public })
    }

    fn public_key_for(&self, secret: &SecretScalar) -> Result<[u8; PUBLIC_KEY_LEN], WebPushError> {
        Self::encode_point(&Self::secret_key(secret)?.public_key())
    }

    fn validate_public_key(&self, public: &[u8]) -> Result<(), WebPushError> {
        if public.len() != PUBLIC_KEY_LEN || public[0] != 0x04 {
            return Err(WebPushError::KeyImport(format!(
                "expected {PUBLIC_KEY_LEN}-byte uncompressed point, got {} bytes",
                public.len()
            )));
        }
        PublicKey::from_sec1_bytes(public)
            .map(|_| ())
            .map_err(|e| WebPushError::KeyImport(format!("point not on P-256: {e}")))
    }

    fn ecdh(&self, secret: &SecretScalar, peer_public: &[u8]) -> Result<[u8; 32], WebPushError> {
        let secret_key = Self::secret_key(secret)
            .map_err(|e| WebPushError::Encryption(e.to_string()))?;
        let peer = PublicKey::from_sec1_bytes(peer_public)
            .map_err(|e| WebPushError::Encryption(format!("invalid peer public key: {e}")))?;

        let shared = p256::ecdh::diffie_hellman(secret_key.to_nonzero_scalar(), peer.as_affine());
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.raw_secret_bytes());
        Ok(out)
    }

    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], WebPushError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| WebPushError::Encryption(format!("HMAC key rejected: {e}")))?;
        mac.update(data);
        let digest = mac.finalize().into_bytes();

        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Ok(out)
    }

    fn aes128gcm_encrypt(
        &self,
        key: &[u8; 16],
        nonce: &[u8; 12],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, WebPushError> {
        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|e| WebPushError::Encryption(format!("AES key rejected: {e}")))?;
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| WebPushError::Encryption(format!("AES-GCM encryption failed: {e}")))
    }

    fn sign_es256(&self, secret: &SecretScalar, message: &[u8]) -> Result<Vec<u8>, WebPushError> {
        let signing_key = SigningKey::from_slice(secret.as_bytes())
            .map_err(|e| WebPushError::Signing(format!("invalid signing key: {e}")))?;
        let signature: Signature = signing_key
            .try_sign(message)
            .map_err(|e| WebPushError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}
