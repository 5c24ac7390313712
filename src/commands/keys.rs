//! VAPID key commands.
//!
//! `generate-keys` prints a fresh pair in the `{publicKey, privateKey}` form
//! expected by `VAPID_PUBLIC_KEY` / `VAPID_PRIVATE_KEY`. Nothing is stored;
//! the operator decides where the private key lives.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::notifications::provider::RustCryptoProvider;
use crate::notifications::{VapidKeyPair, VapidKeys};

/// Generate a new VAPID key pair.
pub fn generate() -> Result<VapidKeys> {
    VapidKeys::generate(&RustCryptoProvider).context("Failed to generate VAPID keys")
}

/// Validate the configured VAPID identity, returning the public key.
///
/// Goes one step further than [`Config::vapid_identity`] by importing the
/// key pair, which catches a private key that does not match the public
/// key.
pub fn check_config(config: &Config) -> Result<String> {
    let identity = config
        .vapid_identity()
        .context("VAPID configuration is invalid")?;
    let key_pair = VapidKeyPair::import(Arc::new(RustCryptoProvider), &identity.keys)
        .context("VAPID keys could not be imported")?;

    log::info!(
        "[WebPush] VAPID configuration OK (subject {}, subscriptions at {:?})",
        identity.subject,
        config.subscriptions_path
    );
    Ok(key_pair.public_key_base64url())
}
