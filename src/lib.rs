//! Clinic Push - Web Push delivery for appointment reminders.
//!
//! This crate encrypts notification payloads for browser push subscriptions
//! (RFC 8291, `aes128gcm`), authenticates to push services with VAPID
//! (RFC 8292), and fans a notification out to every browser a recipient has
//! registered.
//!
//! # Modules
//!
//! - [`notifications`] - Encryption, VAPID, subscriptions and dispatch
//! - [`config`] - Configuration loading/saving
//! - [`commands`] - CLI subcommand implementations
//! - [`constants`] - Protocol sizes and dispatch defaults

pub mod commands;
pub mod config;
pub mod constants;
pub mod notifications;

// Re-export commonly used types
pub use config::Config;
pub use notifications::{
    DispatchOutcome, DispatchRequest, Dispatcher, NotificationPayload, PushSubscription,
    VapidIdentity, VapidKeys, WebPushError,
};
