//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod preview;
pub mod profile;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use afflyt_core::api::{ApiClient, User};
use afflyt_core::config::Config;
use afflyt_core::session::{AccessRequirement, AuthSession, RedirectDecision};
use afflyt_core::storage::{FileStore, KeyValueStore};
use anyhow::{Context, Result};

pub(crate) fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::with_timeout(&config.api_base_url, config.request_timeout())
}

pub(crate) fn local_store() -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::open_default())
}

/// Builds the session over the on-disk store and runs the bootstrap.
pub(crate) async fn open_session(config: &Config) -> Result<AuthSession> {
    let session = AuthSession::new(api_client(config)?, local_store());
    session.bootstrap().await;
    Ok(session)
}

/// Returns the signed-in user, or fails with a hint on how to sign in.
pub(crate) fn require_user(session: &AuthSession, config: &Config) -> Result<User> {
    let requirement = AccessRequirement::authenticated(&config.redirects);
    match session.gate().decide(&requirement) {
        RedirectDecision::Stay => session
            .snapshot()
            .user()
            .cloned()
            .context("session has no user"),
        RedirectDecision::Redirect { to } => {
            tracing::debug!(%to, "authenticated command without session");
            anyhow::bail!("Not signed in. Run `afflyt login` or `afflyt magic-link send` first.")
        }
        RedirectDecision::Wait => anyhow::bail!("Session is still initializing"),
    }
}

/// Prints `question [y/N]` and reads the answer from stdin.
pub(crate) fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().lock().read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

/// True unless `AFFLYT_NO_BROWSER` is set.
pub(crate) fn browser_enabled() -> bool {
    std::env::var_os("AFFLYT_NO_BROWSER").is_none()
}
