//! Error type shared by the API client and the session actions.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Generic message for failures that should not be shown raw.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Categories of auth/API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Input rejected before any request was sent
    Validation,
    /// Operation needs a session and there is none
    Unauthenticated,
    /// Backend rejected the bearer token (401/403)
    InvalidSession,
    /// Backend answered 429
    RateLimited { retry_after_secs: u64 },
    /// Magic link is past its expiry
    MagicLinkExpired,
    /// Magic link was already exchanged
    MagicLinkUsed,
    /// Any other non-2xx answer from the backend
    Api,
    /// Connection, DNS, TLS or timeout failure
    Network,
    /// Response body did not match the expected shape
    Parse,
    /// Local persistence failed
    Storage,
    /// Result discarded because the session was logged out meanwhile
    Cancelled,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::Validation => write!(f, "validation"),
            AuthErrorKind::Unauthenticated => write!(f, "unauthenticated"),
            AuthErrorKind::InvalidSession => write!(f, "invalid_session"),
            AuthErrorKind::RateLimited { .. } => write!(f, "rate_limited"),
            AuthErrorKind::MagicLinkExpired => write!(f, "magic_link_expired"),
            AuthErrorKind::MagicLinkUsed => write!(f, "magic_link_used"),
            AuthErrorKind::Api => write!(f, "api"),
            AuthErrorKind::Network => write!(f, "network"),
            AuthErrorKind::Parse => write!(f, "parse"),
            AuthErrorKind::Storage => write!(f, "storage"),
            AuthErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured error with a user-facing message.
///
/// `message` is safe to display; raw bodies and transport errors only ever
/// go to `details`, which is meant for logs.
#[derive(Debug, Clone)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Validation, message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            AuthErrorKind::Unauthenticated,
            "You need to sign in to do that.",
        )
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        let secs = retry_after.as_secs();
        let unit = if secs == 1 { "second" } else { "seconds" };
        Self::new(
            AuthErrorKind::RateLimited {
                retry_after_secs: secs,
            },
            format!("Too many requests. Please try again in {secs} {unit}."),
        )
    }

    pub fn magic_link_expired() -> Self {
        Self::new(
            AuthErrorKind::MagicLinkExpired,
            "This magic link has expired. Request a new one to sign in.",
        )
    }

    pub fn magic_link_used() -> Self {
        Self::new(
            AuthErrorKind::MagicLinkUsed,
            "This magic link has already been used. Request a new one to sign in.",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(
            AuthErrorKind::Cancelled,
            "The request was cancelled because you signed out.",
        )
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "The server took too long to respond. Please try again."
        } else {
            "Unable to reach the server. Check your connection and try again."
        };
        Self::new(AuthErrorKind::Network, message).with_details(err.to_string())
    }

    pub fn parse(details: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Parse, GENERIC_ERROR_MESSAGE).with_details(details)
    }

    pub fn storage(err: &anyhow::Error) -> Self {
        Self::new(
            AuthErrorKind::Storage,
            "Could not save your session on this device.",
        )
        .with_details(format!("{err:#}"))
    }

    /// Builds an error from a non-2xx response.
    ///
    /// Uses the backend's `message`/`error` field when present, otherwise the
    /// generic fallback. 401/403 map to [`AuthErrorKind::InvalidSession`].
    pub fn http_status(status: u16, body: &str) -> Self {
        let backend_message = backend_message(body);
        let kind = match status {
            401 | 403 => AuthErrorKind::InvalidSession,
            _ => AuthErrorKind::Api,
        };
        let message = backend_message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
        let details = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        Self::new(kind, message).with_details(details)
    }

    /// Returns true for errors meaning the stored token is no longer valid.
    pub fn is_invalid_session(&self) -> bool {
        self.kind == AuthErrorKind::InvalidSession
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            AuthErrorKind::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(retry_after_secs))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AuthError {}

/// Result type for auth operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Extracts a human-readable message from a JSON error body.
pub(crate) fn backend_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .map(ToString::to_string)
}

/// Extracts a machine-readable error code from a JSON error body.
pub(crate) fn backend_code(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("code")
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase)
}
