//! Fan-out of one notification to every subscription of a recipient.
//!
//! Shared setup (request validation, subscription listing, VAPID key import
//! and token signing) happens before any request is sent, so a setup error
//! aborts the dispatch with nothing delivered. After that each subscription
//! succeeds or fails on its own.

// Rust guideline compliant 2026-02

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::jwt::{self, VapidAssertion};
use super::provider::{CryptoProvider, RustCryptoProvider};
use super::push::{self, NotificationAction, NotificationPayload, PushOptions, PushStatus};
use super::store::{StoredSubscription, SubscriptionStore};
use super::transport::HttpClient;
use super::vapid::{VapidIdentity, VapidKeyPair};
use super::WebPushError;
use crate::constants::{DEFAULT_MAX_CONCURRENCY, DEFAULT_SEND_TIMEOUT, MAX_PAYLOAD_LEN};

/// Inbound request to notify one recipient.
///
/// Fields are optional at the type level so that a missing field is
/// reported as [`WebPushError::InvalidRequest`] rather than a JSON error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    /// Recipient whose subscriptions are notified.
    #[serde(default, alias = "userId")]
    pub recipient_id: Option<String>,
    /// Notification title.
    #[serde(default)]
    pub title: Option<String>,
    /// Notification body text.
    #[serde(default)]
    pub body: Option<String>,
    /// Notification tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Click-through URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Action buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<NotificationAction>>,
}

impl DispatchRequest {
    /// Request with the three required fields set.
    pub fn new(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: Some(recipient_id.into()),
            title: Some(title.into()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Set the notification tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Set the click-through URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the action buttons.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<NotificationAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Check required fields and build the payload.
    ///
    /// Empty strings count as missing; the recipient id is also rejected
    /// when it is only whitespace.
    pub fn validate(&self) -> Result<(&str, NotificationPayload), WebPushError> {
        let recipient_id = self
            .recipient_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| WebPushError::InvalidRequest("recipientId is required".to_string()))?;
        let title = self
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WebPushError::InvalidRequest("title is required".to_string()))?;
        let body = self
            .body
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| WebPushError::InvalidRequest("body is required".to_string()))?;

        let payload = NotificationPayload {
            title: title.to_string(),
            body: body.to_string(),
            tag: self.tag.clone(),
            url: self.url.clone(),
            actions: self.actions.clone(),
        };
        Ok((recipient_id, payload))
    }
}

/// Why a dispatch sent nothing without failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    /// The recipient has no registered subscriptions.
    NoSubscriptions,
}

/// Per-dispatch tally.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    /// Subscriptions the push service accepted the message for.
    pub sent: usize,
    /// Gone subscriptions deleted from the store.
    pub removed: usize,
    /// Subscriptions that failed (kept in the store).
    pub failed: usize,
    /// Set when nothing was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DispatchReason>,
}

impl DispatchOutcome {
    /// Outcome for a recipient without subscriptions.
    pub fn no_subscriptions() -> Self {
        Self {
            reason: Some(DispatchReason::NoSubscriptions),
            ..Self::default()
        }
    }
}

/// Tunables for a [`Dispatcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Upper bound on one push request round trip.
    pub send_timeout: Duration,
    /// Push requests in flight at once (at least 1).
    pub max_concurrency: usize,
    /// TTL and urgency sent with every message.
    pub push: PushOptions,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            push: PushOptions::default(),
        }
    }
}

/// Sends notifications to all of a recipient's browsers.
#[derive(Debug)]
pub struct Dispatcher {
    identity: VapidIdentity,
    provider: Arc<dyn CryptoProvider>,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn SubscriptionStore>,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Dispatcher using [`RustCryptoProvider`] and default options.
    pub fn new(
        identity: VapidIdentity,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            identity,
            provider: Arc::new(RustCryptoProvider),
            http,
            store,
            options: DispatcherOptions::default(),
        }
    }

    /// Replace the crypto provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options.
    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// Notify every subscription of the request's recipient.
    ///
    /// # Errors
    ///
    /// Only shared setup failures are returned (`InvalidRequest`, `Store`,
    /// `KeyImport`, `Signing`, `MalformedSignature`); in that case nothing
    /// has been sent. Per-subscription failures are counted in the outcome.
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchOutcome, WebPushError> {
        let (recipient_id, payload) = request.validate()?;
        let payload_json = payload.to_json()?;
        if payload_json.len() > MAX_PAYLOAD_LEN {
            return Err(WebPushError::InvalidRequest(format!(
                "notification payload is {} bytes, limit is {}",
                payload_json.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        let subscriptions = self.store.list_subscriptions(recipient_id).await?;
        if subscriptions.is_empty() {
            log::info!("[WebPush] No subscriptions for recipient {}", recipient_id);
            return Ok(DispatchOutcome::no_subscriptions());
        }

        let key_pair = VapidKeyPair::import(Arc::clone(&self.provider), &self.identity.keys)?;

        // One token per push service origin, all signed before the first send.
        let mut assertions: HashMap<String, VapidAssertion> = HashMap::new();
        let mut targets = Vec::with_capacity(subscriptions.len());
        for sub in subscriptions {
            let audience = jwt::audience_for(&sub.subscription.endpoint);
            if let Ok(aud) = &audience {
                if !assertions.contains_key(aud) {
                    let assertion = jwt::build_assertion(&key_pair, aud, &self.identity.subject)?;
                    assertions.insert(aud.clone(), assertion);
                }
            }
            targets.push((sub, audience));
        }

        log::debug!(
            "[WebPush] Sending to {} subscription(s) across {} origin(s)",
            targets.len(),
            assertions.len()
        );

        let payload_json = payload_json.as_slice();
        let assertions = &assertions;
        let results: Vec<(StoredSubscription, Result<PushStatus, WebPushError>)> =
            stream::iter(targets)
                .map(|(sub, audience)| async move {
                    let result = match audience {
                        Ok(aud) => self.send_one(&sub, &aud, payload_json, &assertions[&aud]).await,
                        Err(e) => Err(e),
                    };
                    (sub, result)
                })
                .buffer_unordered(self.options.max_concurrency.max(1))
                .collect()
                .await;

        let mut outcome = DispatchOutcome::default();
        let mut gone = Vec::new();
        for (sub, result) in results {
            match result {
                Ok(PushStatus::Delivered) => outcome.sent += 1,
                Ok(PushStatus::Gone) => gone.push(sub),
                Ok(PushStatus::Failed(_)) => outcome.failed += 1,
                Err(e) => {
                    log::warn!("[WebPush] Failed to notify subscription {}: {}", sub.id, e);
                    outcome.failed += 1;
                }
            }
        }

        for sub in gone {
            match self.store.delete_subscription(&sub.id).await {
                Ok(()) => {
                    log::info!("[WebPush] Removed expired subscription {}", sub.id);
                    outcome.removed += 1;
                }
                Err(e) => {
                    log::warn!("[WebPush] Failed to remove expired subscription {}: {}", sub.id, e);
                }
            }
        }

        log::info!(
            "[WebPush] Recipient {}: {} sent, {} removed, {} failed",
            recipient_id,
            outcome.sent,
            outcome.removed,
            outcome.failed
        );
        Ok(outcome)
    }

    async fn send_one(
        &self,
        sub: &StoredSubscription,
        origin: &str,
        payload: &[u8],
        assertion: &VapidAssertion,
    ) -> Result<PushStatus, WebPushError> {
        let request = push::build_push_request(
            self.provider.as_ref(),
            &sub.subscription,
            payload,
            assertion,
            &self.options.push,
        )?;

        let response = tokio::time::timeout(self.options.send_timeout, self.http.post(&request))
            .await
            .map_err(|_| WebPushError::Timeout)??;

        let status = PushStatus::from_status(response.status);
        match status {
            PushStatus::Delivered => log::debug!("[WebPush] Delivered to {}", origin),
            PushStatus::Gone => {
                log::info!("[WebPush] Subscription {} expired (HTTP {})", sub.id, response.status);
            }
            PushStatus::Failed(code) => log::warn!(
                "[WebPush] Push to {} rejected (HTTP {}): {}",
                origin,
                code,
                response.body
            ),
        }
        Ok(status)
    }
}
