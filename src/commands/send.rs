//! `send` command: dispatch one notification.
//!
//! Reads a request object from a file or stdin:
//!
//! ```json
//! {"recipientId": "patient-42", "title": "Reminder", "body": "Tomorrow at 10:00",
//!  "tag": "appointment-7", "url": "/appointments/7"}
//! ```
//!
//! `userId` is accepted in place of `recipientId`.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::notifications::store::FileSubscriptionStore;
use crate::notifications::transport::ReqwestHttpClient;
use crate::notifications::{DispatchOutcome, DispatchRequest, Dispatcher};

/// Parse a dispatch request from JSON.
pub fn parse_request(json: &str) -> Result<DispatchRequest> {
    serde_json::from_str(json).context("Request is not a valid JSON object")
}

/// Read a request from `path`, or from stdin when `path` is `None`.
pub fn read_request(path: Option<&Path>) -> Result<DispatchRequest> {
    let json = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    parse_request(&json)
}

/// Build a dispatcher from configuration.
///
/// Fails fast on invalid VAPID configuration before any subscription is
/// read.
pub fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let identity = config
        .vapid_identity()
        .context("VAPID configuration is invalid")?;
    let store = FileSubscriptionStore::open(&config.subscriptions_path)?;
    let http = ReqwestHttpClient::new()?;

    Ok(Dispatcher::new(identity, Arc::new(http), Arc::new(store))
        .with_options(config.dispatcher_options()))
}

/// Dispatch the request read from `path` (or stdin).
pub async fn run(config: &Config, path: Option<&Path>) -> Result<DispatchOutcome> {
    let dispatcher = build_dispatcher(config)?;
    let request = read_request(path)?;
    let outcome = dispatcher
        .dispatch(&request)
        .await
        .context("Dispatch failed")?;
    Ok(outcome)
}
