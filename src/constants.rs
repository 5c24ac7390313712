//! Application-wide constants for clinic-push.
//!
//! Protocol sizes come from RFC 8188 / RFC 8291 and are not configurable.
//! Defaults in the dispatch section can be overridden through
//! [`crate::config::Config`].
//!
//! # Categories
//!
//! - **Encoding**: aes128gcm header and record sizes
//! - **VAPID**: token lifetime
//! - **Dispatch**: per-send defaults for push requests

use std::time::Duration;

// ============================================================================
// Encoding
// ============================================================================

/// Salt length in the aes128gcm header.
pub const SALT_LEN: usize = 16;

/// Length of the auth secret a browser generates per subscription.
pub const AUTH_SECRET_LEN: usize = 16;

/// Fixed aes128gcm header size: salt (16) + record size (4) + key id length
/// (1) + uncompressed application server key (65).
pub const ECE_HEADER_LEN: usize = 86;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Largest push message body push services must accept.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Largest plaintext that still fits in one message once the header, the
/// padding delimiter and the tag are added.
pub const MAX_PAYLOAD_LEN: usize = MAX_MESSAGE_LEN - ECE_HEADER_LEN - 1 - TAG_LEN;

// ============================================================================
// VAPID
// ============================================================================

/// Lifetime of a VAPID token (`exp` = now + this).
///
/// RFC 8292 caps the lifetime at 24 hours.
pub const VAPID_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Dispatch
// ============================================================================

/// Timeout for a single push request.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of push requests in flight per dispatch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// How long the push service should hold an undelivered message.
pub const DEFAULT_TTL_SECS: u32 = 86_400;

/// Default `Urgency` header value.
pub const DEFAULT_URGENCY: &str = "high";
