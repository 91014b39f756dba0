//! One-time session bootstrap.

use std::sync::atomic::Ordering;

use super::{AuthSession, Credentials, SessionState, TOKEN_KEY, USER_KEY};
use crate::api::User;
use crate::logging::mask_token;

impl AuthSession {
    /// Establishes the initial auth state from persisted credentials.
    ///
    /// Runs once per session; later calls return the current state. A stored
    /// token the backend does not accept (for any reason, network errors
    /// included) silently downgrades to logged out and never sets `error`.
    pub async fn bootstrap(&self) -> SessionState {
        let _guard = self.op_lock.lock().await;
        if self.bootstrap_started.swap(true, Ordering::SeqCst) {
            return self.snapshot();
        }

        let Some(token) = self.stored_token() else {
            tracing::debug!("no stored session");
            self.discard_leftovers();
            self.finish_bootstrap();
            return self.snapshot();
        };

        if let Some(stale) = self.stored_user() {
            tracing::debug!(user_id = %stale.id, "revalidating stored session");
        }

        let epoch = self.current_epoch();
        self.update(|s| {
            s.bootstrapping = true;
            s.is_loading = true;
        });

        match self.api.me(&token).await {
            Ok(user) if self.is_current(epoch) => {
                if let Err(err) = self.persist_user(&user) {
                    tracing::warn!(
                        details = err.details.as_deref().unwrap_or(""),
                        "failed to refresh user snapshot"
                    );
                }
                tracing::info!(user_id = %user.id, token = %mask_token(&token), "session restored");
                self.update(|s| s.credentials = Some(Credentials { user, token }));
            }
            Ok(_) => tracing::debug!("session revalidated after logout, discarding"),
            Err(err) => {
                tracing::info!(
                    kind = %err.kind,
                    details = err.details.as_deref().unwrap_or(""),
                    "stored session rejected, signing out"
                );
                self.clear_session();
            }
        }

        self.finish_bootstrap();
        self.snapshot()
    }

    fn finish_bootstrap(&self) {
        self.update(|s| {
            s.bootstrapping = false;
            s.is_initialized = true;
            s.is_loading = false;
        });
    }

    /// Removes a half-written session, e.g. a user snapshot without a token.
    fn discard_leftovers(&self) {
        let leftover = [TOKEN_KEY, USER_KEY]
            .iter()
            .any(|key| matches!(self.store.get(key), Ok(Some(_))));
        if !leftover {
            return;
        }
        tracing::debug!("discarding incomplete stored session");
        if let Err(err) = self.store.remove_many(&[TOKEN_KEY, USER_KEY]) {
            tracing::warn!(error = %format!("{err:#}"), "failed to clear stored session");
        }
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to read stored token");
                None
            }
        }
    }

    fn stored_user(&self) -> Option<User> {
        let raw = self.store.get(USER_KEY).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring unreadable user snapshot");
                None
            }
        }
    }
}
