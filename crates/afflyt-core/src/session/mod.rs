//! Client session: state container, bootstrap, auth actions, redirect gate.
//!
//! [`AuthSession`] owns the single source of truth for the signed-in user.
//! State is published through a `watch` channel; every mutation that touches
//! credentials writes the storage pair and the in-memory state together.

mod actions;
mod bootstrap;
mod gate;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};

pub use gate::{AccessRequirement, RedirectDecision, RedirectGate};

use crate::api::{ApiClient, AuthError, AuthResult, User};
use crate::storage::KeyValueStore;

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "afflyt_token";
/// Storage key of the JSON user snapshot.
pub const USER_KEY: &str = "afflyt_user";

/// A user together with the token that authenticates them.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user: User,
    pub token: String,
}

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Observable session state.
///
/// User and token only exist together, so `is_authenticated()` is exactly
/// "user and token are both set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    credentials: Option<Credentials>,
    is_loading: bool,
    is_initialized: bool,
    bootstrapping: bool,
    error: Option<String>,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.token.as_str())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// True while an auth operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// True once bootstrap has concluded; never reverts.
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Message of the most recent failed user-initiated operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.is_initialized, self.bootstrapping, self.is_authenticated()) {
            (true, _, true) => SessionPhase::Authenticated,
            (true, _, false) => SessionPhase::Unauthenticated,
            (false, true, _) => SessionPhase::Initializing,
            (false, false, _) => SessionPhase::Uninitialized,
        }
    }
}

/// Injectable session container.
///
/// Mutating operations are serialized: a second `login` issued while the
/// first is in flight waits for it instead of racing it. `logout` bypasses
/// the queue and bumps the epoch, so results of requests started before it
/// are dropped instead of resurrecting the session.
pub struct AuthSession {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
    bootstrap_started: AtomicBool,
    epoch: AtomicU64,
}

impl AuthSession {
    pub fn new(api: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            api,
            store,
            state,
            op_lock: Mutex::new(()),
            bootstrap_started: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Redirect gate over the current state.
    pub fn gate(&self) -> RedirectGate {
        RedirectGate::from(&*self.state.borrow())
    }

    /// Resolves once bootstrap has concluded.
    pub async fn wait_until_initialized(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(SessionState::is_initialized).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Resets the shared error message.
    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    fn update(&self, mutate: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(mutate);
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    fn current_token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// Writes token and user snapshot in one storage call.
    fn persist_credentials(&self, credentials: &Credentials) -> AuthResult<()> {
        let user_json = serde_json::to_string(&credentials.user)
            .map_err(|e| AuthError::parse(format!("serialize user snapshot: {e}")))?;
        self.store
            .set_many(&[
                (TOKEN_KEY, credentials.token.as_str()),
                (USER_KEY, user_json.as_str()),
            ])
            .map_err(|e| AuthError::storage(&e))
    }

    fn persist_user(&self, user: &User) -> AuthResult<()> {
        let user_json = serde_json::to_string(user)
            .map_err(|e| AuthError::parse(format!("serialize user snapshot: {e}")))?;
        self.store
            .set(USER_KEY, &user_json)
            .map_err(|e| AuthError::storage(&e))
    }

    /// Drops credentials from storage and memory together.
    fn clear_session(&self) {
        if let Err(err) = self.store.remove_many(&[TOKEN_KEY, USER_KEY]) {
            tracing::warn!(error = %format!("{err:#}"), "failed to clear stored session");
        }
        self.update(|s| s.credentials = None);
    }

    /// Marks a user-initiated operation as started.
    fn begin_operation(&self) -> u64 {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        self.current_epoch()
    }

    /// Records a failed user-initiated operation and hands the error back.
    fn fail<T>(&self, operation: &'static str, err: AuthError) -> AuthResult<T> {
        tracing::warn!(
            operation,
            kind = %err.kind,
            details = err.details.as_deref().unwrap_or(""),
            "auth operation failed"
        );
        let message = err.message.clone();
        self.update(|s| {
            s.is_loading = false;
            s.error = Some(message);
        });
        Err(err)
    }
}
