//! Auth command handlers.

use afflyt_core::config::{Config, paths};
use afflyt_core::logging::mask_token;
use afflyt_core::session::{AccessRequirement, AuthSession, RedirectDecision, SessionPhase};
use anyhow::Result;

use super::{confirm, open_session};

pub async fn status(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let state = session.snapshot();

    match (state.phase(), state.credentials()) {
        (SessionPhase::Authenticated, Some(credentials)) => {
            let user = &credentials.user;
            println!("Signed in as {} <{}>", user.display_name(), user.email);
            if let Some(role) = &user.role {
                println!("  Role: {role}");
            }
            println!("  Token: {}", mask_token(&credentials.token));
        }
        _ => println!("Not signed in."),
    }
    Ok(())
}

pub async fn login(config: &Config, email: &str, password: Option<&str>) -> Result<()> {
    let session = open_session(config).await?;
    if !confirm_replace(&session, config)? {
        println!("Login cancelled.");
        return Ok(());
    }

    let user = session.login(email, password).await?;
    println!("✓ Signed in as {} <{}>", user.display_name(), user.email);
    println!("  Session saved to: {}", paths::storage_path().display());
    Ok(())
}

pub async fn send_magic_link(config: &Config, email: &str) -> Result<()> {
    let session = open_session(config).await?;
    session.send_magic_link(email).await?;
    println!("✓ Magic link sent. Check your inbox and run:");
    println!("  afflyt magic-link verify <LINK>");
    Ok(())
}

pub async fn verify_magic_link(config: &Config, input: &str) -> Result<()> {
    let session = open_session(config).await?;
    if !confirm_replace(&session, config)? {
        println!("Login cancelled.");
        return Ok(());
    }

    let token = token_from_input(input);
    let user = session.verify_magic_link(&token).await?;
    println!("✓ Signed in as {} <{}>", user.display_name(), user.email);
    println!("  Session saved to: {}", paths::storage_path().display());
    Ok(())
}

pub async fn logout(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let was_signed_in = session.snapshot().is_authenticated();

    if let Some(notify) = session.logout() {
        // The local session is already gone; this only waits for the ping.
        if let Err(e) = notify.await {
            tracing::debug!(error = %e, "logout notification task failed");
        }
    }

    if was_signed_in {
        println!("✓ Signed out");
        println!("  Session removed from: {}", paths::storage_path().display());
    } else {
        println!("Not signed in (no session found).");
    }
    Ok(())
}

/// Sign-in commands are guest-only; an existing session is replaced only
/// after confirmation.
fn confirm_replace(session: &AuthSession, config: &Config) -> Result<bool> {
    let requirement = AccessRequirement::guest(&config.redirects);
    match session.gate().decide(&requirement) {
        RedirectDecision::Redirect { to } => {
            tracing::debug!(%to, "sign-in requested with an active session");
            let state = session.snapshot();
            let name = state.user().map_or("unknown user", |u| u.display_name());
            println!("Already signed in as {name}.");
            confirm("Do you want to replace the existing session?")
        }
        RedirectDecision::Stay | RedirectDecision::Wait => Ok(true),
    }
}

/// Accepts either the bare token or the full link from the email.
fn token_from_input(input: &str) -> String {
    let input = input.trim();
    url::Url::parse(input)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_else(|| input.to_string())
}
