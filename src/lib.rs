//! Library root for `assistant-bot`.
//!
//! Assistant-bot is a personal assistant that lives in Slack. It:
//! - Answers @-mentions, direct messages and the `/assistant` command
//! - Reads unread mail from Gmail
//! - Lists and creates Google Calendar events
//!
//! The bot integrates with Slack for chat, Google for mail and calendar,
//! and OpenAI for free-form answers. Each integration sits behind a trait
//! so handlers can be exercised without any network.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use service::credential::{CapabilityScope, CredentialManager};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Installs the crypto provider, builds the runtime, and serves Slack events
/// until the process is stopped.
pub async fn start(config: Config) -> Void {
    info!("Starting assistant-bot ...");

    install_crypto_provider()?;

    let runtime = runtime::Runtime::new(config).await?;

    runtime.start().await?;

    Ok(())
}

/// Obtain (or refresh) the credential for `scope` and persist it.
///
/// Runs the browser consent flow when no usable credential is on disk.
pub async fn authorize(config: Config, scope: CapabilityScope) -> Void {
    install_crypto_provider()?;

    let credentials = CredentialManager::new(&config, reqwest::Client::new());
    let path = scope.token_path(&config);

    let credential = credentials.acquire(scope, &path).await?;

    info!("Credential for {:?} stored at {} (expires {:?}).", scope, path.display(), credential.expires_at);

    Ok(())
}

fn install_crypto_provider() -> Void {
    // Already installed is fine.
    if crypto::CryptoProvider::get_default().is_some() {
        return Ok(());
    }

    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install the rustls crypto provider."))
}
