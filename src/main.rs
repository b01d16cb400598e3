// src/main.rs

//! # OID4VCI Issuance Ceremony - Main Entry Point
//!
//! Drives one holder through a complete credential issuance against a
//! locally running issuer agent and authorization server.
//!
//! ## Architecture Overview
//! 1. **Services Layer**: issuer preparation, discovery, authorization and
//!    the ceremony orchestrator
//! 2. **Wallet Layer**: holder keys and proof-of-possession tokens
//! 3. **Models**: agent resources, offers, metadata and session state
//! 4. **Utils**: HTTP response handling, polling, base64url
//!
//! ## Configuration
//! Defaults match the local demo deployment. Override them with a
//! `vci-ceremony.toml` file (or the path in `VCI_CONFIG`) or with `VCI_*`
//! environment variables, e.g.:
//! - `VCI_AGENT__BASE_URL`: issuer agent root
//! - `VCI_AGENT__API_KEY`: (Optional) agent API key
//! - `VCI_AUTHORIZATION_SERVER__URL`: authorization server realm URL
//! - `VCI_HOLDER__KEY__MODE`: `fixed` or `ephemeral`
//! - `VCI_POLLING__REDIRECT_TIMEOUT_SECS`: how long to wait for the login

use crate::models::credential::Claims;
use crate::services::ceremony::Ceremony;
use crate::settings::Settings;
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;

// Module declarations (organized by functional domain)
mod error;         // Error taxonomy
mod models;        // Data structures
mod services;      // Ceremony steps and HTTP collaborators
mod settings;      // Layered configuration
mod utils;         // Helper functions
mod wallet;        // Holder keys and proofs

/// Claims of the demo university degree credential.
fn demo_claims() -> Claims {
    let mut claims = Claims::new();
    claims.insert("firstName".to_string(), json!("Alice"));
    claims.insert("degree".to_string(), json!("ChemicalEngineering"));
    claims.insert("grade".to_string(), json!(3.2));
    claims
}

/// Main application entry point
///
/// # Sequence
/// 1. Load `.env`, initialise logging and configuration
/// 2. Build the holder key and ceremony components
/// 3. Run the ceremony, cancelling the waits on Ctrl-C
/// 4. Print the issued credential
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load configuration")?;
    let ceremony = Ceremony::from_settings(&settings).context("failed to prepare the holder key")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling the ceremony");
            on_interrupt.cancel();
        }
    });

    info!("starting issuance ceremony against {}", settings.agent.base_url);
    let issued = ceremony
        .run_issuance_ceremony(demo_claims(), &cancel)
        .await
        .context("issuance ceremony failed")?;

    println!("Credential request:");
    println!("{}", serde_json::to_string_pretty(&issued.request)?);
    println!("Issued credential:");
    println!("{}", serde_json::to_string_pretty(&issued.credential)?);
    Ok(())
}
