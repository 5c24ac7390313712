//! Message encryption for Web Push (RFC 8291 over RFC 8188 `aes128gcm`).
//!
//! Every message is encrypted with a fresh ephemeral P-256 key pair and a
//! fresh 16-byte salt, and sent as a single record:
//!
//! ```text
//! salt (16) | record size (u32 BE) | idlen = 65 | as_public (65) | ciphertext
//! ```
//!
//! Key schedule, with every HKDF step expanded to one HMAC block:
//!
//! ```text
//! PRK_key = HMAC(auth_secret, ecdh_secret)
//! IKM     = HMAC(PRK_key, "WebPush: info\0" | ua_public | as_public | 0x01)
//! PRK     = HMAC(salt, IKM)
//! CEK     = HMAC(PRK, "Content-Encoding: aes128gcm\0" | 0x01)[..16]
//! NONCE   = HMAC(PRK, "Content-Encoding: nonce\0" | 0x01)[..12]
//! ```

use zeroize::Zeroizing;

use super::provider::{CryptoProvider, EphemeralKeyPair, PUBLIC_KEY_LEN};
use super::WebPushError;
use crate::constants::{AUTH_SECRET_LEN, ECE_HEADER_LEN, MAX_PAYLOAD_LEN, SALT_LEN, TAG_LEN};

const KEY_INFO_PREFIX: &[u8] = b"WebPush: info\0";
// HKDF info strings with the single-block counter appended.
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0\x01";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0\x01";

/// Padding delimiter marking the last (and only) record.
const LAST_RECORD_DELIMITER: u8 = 0x02;

/// Encrypt `plaintext` for one subscription.
///
/// `ua_public` is the subscription's `p256dh` key (65 bytes) and
/// `auth_secret` its `auth` value (16 bytes).
pub fn encrypt(
    provider: &dyn CryptoProvider,
    plaintext: &[u8],
    ua_public: &[u8],
    auth_secret: &[u8],
) -> Result<Vec<u8>, WebPushError> {
    check_payload_len(plaintext)?;

    let ephemeral = provider
        .generate_key_pair()
        .map_err(|e| WebPushError::Encryption(format!("ephemeral key generation failed: {e}")))?;
    let mut salt = [0u8; SALT_LEN];
    provider.fill_random(&mut salt);

    encrypt_with(provider, plaintext, ua_public, auth_secret, &ephemeral, &salt)
}

/// Encrypt with a caller-chosen ephemeral key pair and salt.
///
/// Reusing either across messages breaks confidentiality; production code
/// goes through [`encrypt`]. This exists for fixed test vectors.
pub fn encrypt_with(
    provider: &dyn CryptoProvider,
    plaintext: &[u8],
    ua_public: &[u8],
    auth_secret: &[u8],
    ephemeral: &EphemeralKeyPair,
    salt: &[u8; SALT_LEN],
) -> Result<Vec<u8>, WebPushError> {
    check_payload_len(plaintext)?;

    if ua_public.len() != PUBLIC_KEY_LEN || ua_public[0] != 0x04 {
        return Err(WebPushError::Encryption(format!(
            "p256dh key must be a {PUBLIC_KEY_LEN}-byte uncompressed point, got {} bytes",
            ua_public.len()
        )));
    }
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(WebPushError::Encryption(format!(
            "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
            auth_secret.len()
        )));
    }

    let ecdh_secret = Zeroizing::new(provider.ecdh(&ephemeral.secret, ua_public)?);

    let prk_key = Zeroizing::new(provider.hmac_sha256(auth_secret, &ecdh_secret[..])?);
    let mut key_info = Vec::with_capacity(KEY_INFO_PREFIX.len() + 2 * PUBLIC_KEY_LEN + 1);
    key_info.extend_from_slice(KEY_INFO_PREFIX);
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(&ephemeral.public);
    key_info.push(0x01);
    let ikm = Zeroizing::new(provider.hmac_sha256(&prk_key[..], &key_info)?);

    let prk = Zeroizing::new(provider.hmac_sha256(salt, &ikm[..])?);
    let cek_block = Zeroizing::new(provider.hmac_sha256(&prk[..], CEK_INFO)?);
    let nonce_block = provider.hmac_sha256(&prk[..], NONCE_INFO)?;

    let mut cek = Zeroizing::new([0u8; 16]);
    cek.copy_from_slice(&cek_block[..16]);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_block[..12]);

    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
    padded.extend_from_slice(plaintext);
    padded.push(LAST_RECORD_DELIMITER);

    let ciphertext = provider.aes128gcm_encrypt(&cek, &nonce, &padded)?;

    let record_size = u32::try_from(ECE_HEADER_LEN + ciphertext.len())
        .map_err(|_| WebPushError::Encryption("record size overflows u32".to_string()))?;

    let mut envelope = Vec::with_capacity(ECE_HEADER_LEN + ciphertext.len());
    envelope.extend_from_slice(salt);
    envelope.extend_from_slice(&record_size.to_be_bytes());
    envelope.push(PUBLIC_KEY_LEN as u8);
    envelope.extend_from_slice(&ephemeral.public);
    envelope.extend_from_slice(&ciphertext);

    debug_assert_eq!(envelope.len(), ECE_HEADER_LEN + plaintext.len() + 1 + TAG_LEN);
    Ok(envelope)
}

fn check_payload_len(plaintext: &[u8]) -> Result<(), WebPushError> {
    if plaintext.len() > MAX_PAYLOAD_LEN {
        return Err(WebPushError::PayloadTooLarge {
            len: plaintext.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}
