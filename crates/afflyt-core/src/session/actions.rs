//! Auth actions: login, magic link, logout, profile update, refresh.

use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;

use super::{AuthSession, Credentials};
use crate::api::{AuthError, AuthResponse, AuthResult, User, UserUpdate};
use crate::logging::mask_token;
use crate::validation;

impl AuthSession {
    /// Signs in with email and optional password.
    ///
    /// On failure the shared `error` is set and the error is returned; any
    /// previous session is left as it was.
    ///
    /// # Errors
    /// Validation errors (never sent to the backend), backend rejections,
    /// network and storage failures.
    pub async fn login(&self, email: &str, password: Option<&str>) -> AuthResult<User> {
        let email = validation::normalize_email(email)?;
        let _guard = self.op_lock.lock().await;
        let epoch = self.begin_operation();
        let result = self.api.login(&email, password).await;
        self.finish_sign_in("login", epoch, result)
    }

    /// Asks the backend to email a magic link. Credentials are untouched.
    ///
    /// # Errors
    /// A 429 comes back as `RateLimited` with the retry-after in the message.
    pub async fn send_magic_link(&self, email: &str) -> AuthResult<()> {
        let email = validation::normalize_email(email)?;
        let _guard = self.op_lock.lock().await;
        self.begin_operation();
        match self.api.send_magic_link(&email).await {
            Ok(()) => {
                tracing::info!("magic link requested");
                self.update(|s| s.is_loading = false);
                Ok(())
            }
            Err(err) => self.fail("send_magic_link", err),
        }
    }

    /// Exchanges a magic-link token for a session.
    ///
    /// # Errors
    /// Expired and already-used links return `MagicLinkExpired` /
    /// `MagicLinkUsed` with their own messages.
    pub async fn verify_magic_link(&self, token: &str) -> AuthResult<User> {
        let token = validation::magic_link_token(token)?;
        let _guard = self.op_lock.lock().await;
        let epoch = self.begin_operation();
        let result = self.api.verify_magic_link(token).await;
        self.finish_sign_in("verify_magic_link", epoch, result)
    }

    /// Clears the session immediately and pings the backend in the background.
    ///
    /// Idempotent. The returned handle (present only when there was a token
    /// and a tokio runtime) may be awaited or dropped; the ping's outcome never
    /// affects the local state.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let token = self.current_token();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_session();
        self.update(|s| s.error = None);

        let token = token?;
        tracing::info!(token = %mask_token(&token), "signed out");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no runtime, skipping logout notification");
            return None;
        };
        let api = self.api.clone();
        Some(runtime.spawn(async move {
            if let Err(err) = api.logout(&token).await {
                tracing::debug!(
                    kind = %err.kind,
                    details = err.details.as_deref().unwrap_or(""),
                    "logout notification failed"
                );
            }
        }))
    }

    /// Sends a partial profile update and merges the answer into the user.
    ///
    /// # Errors
    /// `Unauthenticated` without a session (no request is sent). A rejected
    /// token clears the session and is returned without setting `error`.
    pub async fn update_profile(&self, update: &UserUpdate) -> AuthResult<User> {
        let _guard = self.op_lock.lock().await;
        let Some(token) = self.current_token() else {
            return self.fail("update_profile", AuthError::unauthenticated());
        };

        let epoch = self.begin_operation();
        let result = self.api.update_profile(&token, update).await;
        if !self.is_current(epoch) {
            self.update(|s| s.is_loading = false);
            return Err(AuthError::cancelled());
        }

        let fields = match result {
            Ok(fields) => fields,
            Err(err) if err.is_invalid_session() => {
                tracing::info!("token rejected during profile update, signing out");
                self.clear_session();
                self.update(|s| s.is_loading = false);
                return Err(err);
            }
            Err(err) => return self.fail("update_profile", err),
        };

        let Some(current) = self.snapshot().user().cloned() else {
            return self.fail("update_profile", AuthError::unauthenticated());
        };
        let merged = match current.merged_with(&fields) {
            Ok(user) => user,
            Err(e) => return self.fail("update_profile", AuthError::parse(e.to_string())),
        };
        if let Err(err) = self.persist_user(&merged) {
            return self.fail("update_profile", err);
        }

        let user = merged.clone();
        self.update(|s| {
            if let Some(credentials) = s.credentials.as_mut() {
                credentials.user = merged;
            }
            s.is_loading = false;
        });
        tracing::info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    /// Re-fetches the user in the background.
    ///
    /// Never sets `error` and never fails; returns the fresh user when the
    /// refresh went through. A rejected token still clears the session.
    pub async fn refresh_user(&self) -> Option<User> {
        let _guard = self.op_lock.lock().await;
        let token = self.current_token()?;
        let epoch = self.current_epoch();

        match self.api.me(&token).await {
            Ok(user) if self.is_current(epoch) => {
                if let Err(err) = self.persist_user(&user) {
                    tracing::warn!(
                        details = err.details.as_deref().unwrap_or(""),
                        "failed to persist refreshed user"
                    );
                }
                let fresh = user.clone();
                self.update(|s| {
                    if let Some(credentials) = s.credentials.as_mut() {
                        credentials.user = user;
                    }
                });
                Some(fresh)
            }
            Ok(_) => None,
            Err(err) if err.is_invalid_session() => {
                tracing::info!("token rejected during refresh, signing out");
                self.clear_session();
                None
            }
            Err(err) => {
                tracing::warn!(
                    kind = %err.kind,
                    details = err.details.as_deref().unwrap_or(""),
                    "user refresh failed"
                );
                None
            }
        }
    }

    /// Applies the outcome of login / magic-link verification.
    fn finish_sign_in(
        &self,
        operation: &'static str,
        epoch: u64,
        result: AuthResult<AuthResponse>,
    ) -> AuthResult<User> {
        let response = match result {
            Ok(response) => response,
            Err(err) => return self.fail(operation, err),
        };
        if !self.is_current(epoch) {
            self.update(|s| s.is_loading = false);
            return Err(AuthError::cancelled());
        }

        let credentials = Credentials {
            user: response.user,
            token: response.token,
        };
        if let Err(err) = self.persist_credentials(&credentials) {
            return self.fail(operation, err);
        }

        tracing::info!(
            operation,
            user_id = %credentials.user.id,
            token = %mask_token(&credentials.token),
            "signed in"
        );
        let user = credentials.user.clone();
        self.update(|s| {
            s.credentials = Some(credentials);
            s.is_loading = false;
            s.error = None;
        });
        Ok(user)
    }
}
