//! Push subscriptions, notification payloads and push service requests.
//!
//! Builds the RFC 8030 request for one subscription (encrypted body plus
//! VAPID `Authorization` header) and classifies the push service's answer.

// Rust guideline compliant 2026-02

use serde::{Deserialize, Serialize};

use super::base64url;
use super::ece;
use super::jwt::VapidAssertion;
use super::provider::{CryptoProvider, PUBLIC_KEY_LEN};
use super::WebPushError;
use crate::constants::{AUTH_SECRET_LEN, DEFAULT_TTL_SECS};

/// A browser's push subscription.
///
/// Contains everything needed to send a web push message to this browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
}

impl PushSubscription {
    /// Decode the subscriber key and auth secret.
    ///
    /// Bad key material only affects this subscription, so it is reported
    /// as [`WebPushError::Encryption`].
    pub fn decode_keys(&self) -> Result<([u8; PUBLIC_KEY_LEN], [u8; AUTH_SECRET_LEN]), WebPushError> {
        let p256dh = base64url::decode_exact(&self.p256dh, "p256dh key")
            .map_err(|e| WebPushError::Encryption(e.to_string()))?;
        let auth = base64url::decode_exact(&self.auth, "auth secret")
            .map_err(|e| WebPushError::Encryption(e.to_string()))?;
        Ok((p256dh, auth))
    }
}

/// Output of the browser's `PushSubscription.toJSON()`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Milliseconds since the epoch, when the browser sets one.
    #[serde(default)]
    pub expiration_time: Option<i64>,
    /// Client keys.
    pub keys: BrowserSubscriptionKeys,
}

/// `keys` member of [`BrowserSubscription`].
#[derive(Clone, Debug, Deserialize)]
pub struct BrowserSubscriptionKeys {
    /// P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Auth secret (base64url).
    pub auth: String,
}

impl From<BrowserSubscription> for PushSubscription {
    fn from(sub: BrowserSubscription) -> Self {
        Self {
            endpoint: sub.endpoint,
            p256dh: sub.keys.p256dh,
            auth: sub.keys.auth,
        }
    }
}

/// Button shown on a notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Identifier reported back to the service worker on click.
    pub action: String,
    /// Button label.
    pub title: String,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// JSON document the service worker receives after decryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Replaces an earlier notification with the same tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Page opened when the notification is clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Action buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<NotificationAction>>,
}

impl NotificationPayload {
    /// Compact JSON encoding.
    pub fn to_json(&self) -> Result<Vec<u8>, WebPushError> {
        serde_json::to_vec(self)
            .map_err(|e| WebPushError::InvalidRequest(format!("payload is not serializable: {e}")))
    }
}

/// RFC 8030 `Urgency` header values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// On power and Wi-Fi only.
    VeryLow,
    /// On power or Wi-Fi.
    Low,
    /// Neither on power nor on Wi-Fi.
    Normal,
    /// Low battery included.
    #[default]
    High,
}

impl Urgency {
    /// Header value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Urgency {
    type Err = WebPushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "very-low" => Ok(Self::VeryLow),
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(WebPushError::Configuration(format!(
                "unknown urgency {other:?} (expected very-low, low, normal or high)"
            ))),
        }
    }
}

/// Per-message delivery hints sent to the push service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushOptions {
    /// Seconds the push service may hold the message.
    pub ttl: u32,
    /// Delivery priority.
    pub urgency: Urgency,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL_SECS,
            urgency: Urgency::default(),
        }
    }
}

/// Fully built request for one subscription.
#[derive(Clone, Debug)]
pub struct PushRequest {
    /// Subscription endpoint, the request target.
    pub endpoint: String,
    /// Header name/value pairs.
    pub headers: Vec<(&'static str, String)>,
    /// Encrypted envelope.
    pub body: Vec<u8>,
}

impl PushRequest {
    /// Value of the first header called `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Encrypt `payload` for `subscription` and attach the VAPID assertion.
pub fn build_push_request(
    provider: &dyn CryptoProvider,
    subscription: &PushSubscription,
    payload: &[u8],
    assertion: &VapidAssertion,
    options: &PushOptions,
) -> Result<PushRequest, WebPushError> {
    let (ua_public, auth) = subscription.decode_keys()?;
    let body = ece::encrypt(provider, payload, &ua_public, &auth)?;

    Ok(PushRequest {
        endpoint: subscription.endpoint.clone(),
        headers: vec![
            ("Authorization", assertion.authorization_header()),
            ("Content-Type", "application/octet-stream".to_string()),
            ("Content-Encoding", "aes128gcm".to_string()),
            ("TTL", options.ttl.to_string()),
            ("Urgency", options.urgency.as_str().to_string()),
        ],
        body,
    })
}

/// What a push service response means for the subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushStatus {
    /// Accepted (200/201).
    Delivered,
    /// Subscription no longer exists (404/410) and should be deleted.
    Gone,
    /// Any other status; the subscription is kept.
    Failed(u16),
}

impl PushStatus {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200 | 201 => Self::Delivered,
            404 | 410 => Self::Gone,
            other => Self::Failed(other),
        }
    }
}
