//! Clinic Push CLI - sends Web Push notifications to patients' browsers.
//!
//! This is the main binary entry point. See the `clinic_push` library
//! for the core functionality. Results are printed to stdout as JSON;
//! logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use clinic_push::{commands, Config};
use mimalloc::MiMalloc;
use std::path::PathBuf;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "clinic-push")]
#[command(version)]
#[command(about = "Encrypted Web Push delivery for clinic reminders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a notification to every subscription of a recipient
    Send {
        /// JSON request file (reads stdin when omitted)
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Register a browser push subscription for a recipient
    Subscribe {
        /// Recipient the subscription belongs to
        #[arg(long)]
        recipient: String,
        /// File containing the browser's PushSubscription JSON
        #[arg(long)]
        subscription: PathBuf,
    },
    /// Remove a stored subscription
    Unsubscribe {
        /// Subscription id printed by `subscribe`
        #[arg(long)]
        id: String,
    },
    /// Print a freshly generated VAPID key pair (not stored)
    GenerateKeys,
    /// Validate the configuration and print the VAPID public key
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CLINIC_PUSH_LOG", "info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send { request } => {
            let config = Config::load()?;
            let outcome = commands::send::run(&config, request.as_deref()).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Commands::Subscribe {
            recipient,
            subscription,
        } => {
            let config = Config::load()?;
            let id = commands::subscribe(&config, &recipient, &subscription).await?;
            println!("{}", serde_json::json!({ "id": id }));
        }
        Commands::Unsubscribe { id } => {
            let config = Config::load()?;
            let removed = commands::unsubscribe(&config, &id).await?;
            println!("{}", serde_json::json!({ "removed": removed }));
        }
        Commands::GenerateKeys => {
            let keys = commands::generate_keys()?;
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }
        Commands::CheckConfig => {
            let config = Config::load()?;
            let public_key = commands::check_config(&config)?;
            println!("{}", serde_json::json!({ "publicKey": public_key }));
        }
    }

    Ok(())
}
