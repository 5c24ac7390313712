//! Web push notification infrastructure.
//!
//! Encrypts notification payloads for browser push subscriptions and
//! delivers them to the browser vendor's push service, authenticated with
//! the server's VAPID identity.
//!
//! # Architecture
//!
//! ```text
//! DispatchRequest (recipient + title/body/...)
//!     ↓
//! Dispatcher lists the recipient's subscriptions (SubscriptionStore)
//!     ↓
//! VAPID key pair imported once, one JWT per push service origin
//!     ↓
//! Payload encrypted per subscription (aes128gcm, RFC 8291)
//!     ↓
//! POST to the push service (HttpClient), 404/410 → subscription deleted
//! ```
//!
//! # Capabilities
//!
//! Cryptographic primitives sit behind [`provider::CryptoProvider`] and
//! network I/O behind [`transport::HttpClient`], so the byte-exact encoding
//! logic can be tested against fixed vectors and the dispatcher against a
//! fake push service.

// Rust guideline compliant 2026-02

pub mod base64url;
pub mod dispatch;
pub mod ece;
pub mod jwt;
pub mod provider;
pub mod push;
pub mod store;
pub mod transport;
pub mod vapid;

pub use dispatch::{DispatchOutcome, DispatchReason, DispatchRequest, Dispatcher};
pub use push::{NotificationAction, NotificationPayload, PushSubscription};
pub use vapid::{VapidIdentity, VapidKeyPair, VapidKeys};

/// Errors raised while encrypting, signing or delivering web push messages.
///
/// Variants are grouped by how the dispatcher treats them: setup failures
/// (`Configuration`, `KeyImport`, `Signing`, `MalformedSignature`,
/// `InvalidRequest`, `Store`) abort a dispatch, while per-subscription
/// failures (`Encryption`, `InvalidSubscription`, `Delivery`, `Timeout`)
/// only skip the affected subscription.
#[derive(Debug)]
pub enum WebPushError {
    /// Input was not valid base64url or had the wrong decoded length.
    Decode(String),
    /// VAPID keys or other configuration are missing or malformed.
    Configuration(String),
    /// VAPID key material was rejected by the curve arithmetic.
    KeyImport(String),
    /// The ES256 signing primitive failed.
    Signing(String),
    /// A signature claiming to be DER could not be parsed.
    MalformedSignature(String),
    /// A content-encryption primitive failed (including bad client keys).
    Encryption(String),
    /// Plaintext exceeds what fits in a single 4096-byte push message.
    PayloadTooLarge {
        /// Serialized payload length in bytes.
        len: usize,
        /// Largest accepted payload length in bytes.
        max: usize,
    },
    /// Subscription endpoint is not a usable push service URL.
    InvalidSubscription(String),
    /// Network failure or an unexpected push service response.
    Delivery(String),
    /// A push request did not complete within the configured timeout.
    Timeout,
    /// Inbound dispatch request is missing required fields.
    InvalidRequest(String),
    /// Subscription store could not be read or updated.
    Store(String),
}

impl std::fmt::Display for WebPushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "Decode error: {msg}"),
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::KeyImport(msg) => write!(f, "Key import failed: {msg}"),
            Self::Signing(msg) => write!(f, "Signing failed: {msg}"),
            Self::MalformedSignature(msg) => write!(f, "Malformed signature: {msg}"),
            Self::Encryption(msg) => write!(f, "Encryption failed: {msg}"),
            Self::PayloadTooLarge { len, max } => {
                write!(f, "Payload too large: {len} bytes (max {max})")
            }
            Self::InvalidSubscription(msg) => write!(f, "Invalid subscription: {msg}"),
            Self::Delivery(msg) => write!(f, "Delivery failed: {msg}"),
            Self::Timeout => write!(f, "Push request timed out"),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            Self::Store(msg) => write!(f, "Subscription store error: {msg}"),
        }
    }
}

impl std::error::Error for WebPushError {}

impl WebPushError {
    /// Whether this error only affects a single subscription.
    ///
    /// Per-subscription errors are logged and counted; everything else
    /// aborts the dispatch before any request is sent.
    pub fn is_per_subscription(&self) -> bool {
        matches!(
            self,
            Self::Encryption(_) | Self::InvalidSubscription(_) | Self::Delivery(_) | Self::Timeout
        )
    }
}
