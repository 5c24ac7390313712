//! CLI subcommand implementations for clinic-push.
//!
//! Commands are organized into submodules by domain:
//!
//! - [`send`] - Dispatch a notification to a recipient
//! - [`subscriptions`] - Register and remove browser subscriptions
//! - [`keys`] - VAPID key generation and configuration checks
//!
//! # Usage
//!
//! Commands are invoked from the main CLI dispatcher:
//!
//! ```ignore
//! use clinic_push::commands;
//!
//! let outcome = commands::send::run(&config, Some(&request_path)).await?;
//! commands::keys::check_config(&config)?;
//! ```

pub mod keys;
pub mod send;
pub mod subscriptions;

// Re-export commonly used functions for convenience
#[doc(inline)]
pub use keys::{check_config, generate as generate_keys};
#[doc(inline)]
pub use subscriptions::{subscribe, unsubscribe};
