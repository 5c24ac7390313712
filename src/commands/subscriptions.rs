//! `subscribe` / `unsubscribe` commands.
//!
//! Accepts the browser's `PushSubscription.toJSON()` output as-is
//! (`{endpoint, expirationTime, keys: {p256dh, auth}}`) or the flat
//! `{endpoint, p256dh, auth}` form used in the subscriptions file.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::notifications::push::{BrowserSubscription, PushSubscription};
use crate::notifications::store::FileSubscriptionStore;

/// Parse a subscription in either accepted JSON form.
pub fn parse_subscription(json: &str) -> Result<PushSubscription> {
    let value: serde_json::Value =
        serde_json::from_str(json).context("Subscription is not valid JSON")?;

    if value.get("keys").is_some() {
        let browser: BrowserSubscription =
            serde_json::from_value(value).context("Malformed browser subscription")?;
        Ok(browser.into())
    } else {
        serde_json::from_value(value).context("Subscription needs endpoint, p256dh and auth")
    }
}

/// Register the subscription in `file` for `recipient_id`, returning its id.
pub async fn subscribe(config: &Config, recipient_id: &str, file: &Path) -> Result<String> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let subscription = parse_subscription(&json)?;

    let store = FileSubscriptionStore::open(&config.subscriptions_path)?;
    let id = store.upsert(recipient_id, subscription).await?;
    log::info!("[WebPush] Registered subscription {} for recipient {}", id, recipient_id);
    Ok(id)
}

/// Remove a subscription by id. Returns whether it existed.
pub async fn unsubscribe(config: &Config, id: &str) -> Result<bool> {
    let store = FileSubscriptionStore::open(&config.subscriptions_path)?;
    let removed = store.remove(id).await?;
    if removed {
        log::info!("[WebPush] Removed subscription {}", id);
    } else {
        log::warn!("[WebPush] No subscription with id {}", id);
    }
    Ok(removed)
}
