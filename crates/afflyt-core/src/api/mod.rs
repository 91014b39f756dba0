//! HTTP client for the Afflyt backend.
//!
//! Every call returns [`AuthResult`]; non-2xx answers are classified into
//! [`AuthErrorKind`] so callers never have to look at raw bodies.

mod error;
mod types;

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use url::Url;

pub use error::{AuthError, AuthErrorKind, AuthResult, GENERIC_ERROR_MESSAGE};
use error::{backend_code, backend_message};
pub use types::{
    AuthResponse, Branding, ClickEvent, LinkOwner, PublicLink, PublicLinkData, User, UserUpdate,
};
use types::{LoginRequest, MagicLinkRequest, MagicLinkVerifyRequest, unwrap_envelope};

pub const USER_AGENT: &str = concat!("afflyt/", env!("CARGO_PKG_VERSION"));

/// Used when a 429 carries no usable retry hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Classifies a non-2xx response before the generic mapping runs.
type ErrorClassifier = fn(StatusCode, &str) -> Option<AuthError>;

/// Afflyt backend client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a client without request timeout.
    ///
    /// # Panics
    /// In test builds (`#[cfg(test)]`), panics if `base_url` is the production API.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, reqwest::Client::new())
    }

    /// Creates a client with an optional request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self::with_http(base_url, http))
    }

    fn with_http(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        #[cfg(test)]
        assert!(
            base_url != crate::config::Config::DEFAULT_API_BASE_URL,
            "Tests must not use the production Afflyt API! Point the client to a mock server."
        );

        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/user/me`
    ///
    /// # Errors
    /// 401/403 come back as [`AuthErrorKind::InvalidSession`].
    pub async fn me(&self, token: &str) -> AuthResult<User> {
        let request = self.http.get(self.url("/api/user/me")).bearer_auth(token);
        let value = send_json(request, None).await?;
        decode(unwrap_envelope(&value, "user"))
    }

    /// `POST /api/v1/auth/login`
    ///
    /// # Errors
    /// Returns the backend's message on rejected credentials.
    pub async fn login(&self, email: &str, password: Option<&str>) -> AuthResult<AuthResponse> {
        let request = self
            .http
            .post(self.url("/api/v1/auth/login"))
            .json(&LoginRequest { email, password });
        let value = send_json(request, Some(classify_login_error)).await?;
        decode(unwrap_envelope(&value, "auth"))
    }

    /// `POST /api/v1/auth/magic-link`
    ///
    /// # Errors
    /// A 429 becomes [`AuthErrorKind::RateLimited`] with the parsed retry-after.
    pub async fn send_magic_link(&self, email: &str) -> AuthResult<()> {
        let request = self
            .http
            .post(self.url("/api/v1/auth/magic-link"))
            .json(&MagicLinkRequest { email });
        send_json(request, None).await?;
        Ok(())
    }

    /// `POST /api/v1/auth/magic-link/verify`
    ///
    /// # Errors
    /// Expired and already-used links map to their own error kinds.
    pub async fn verify_magic_link(&self, token: &str) -> AuthResult<AuthResponse> {
        let request = self
            .http
            .post(self.url("/api/v1/auth/magic-link/verify"))
            .json(&MagicLinkVerifyRequest { token });
        let value = send_json(request, Some(classify_magic_link_error)).await?;
        decode(unwrap_envelope(&value, "auth"))
    }

    /// `POST /api/v1/auth/logout`; the response body is ignored.
    ///
    /// # Errors
    /// Returns transport and status errors; callers treat them as best-effort.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        let request = self
            .http
            .post(self.url("/api/v1/auth/logout"))
            .bearer_auth(token);
        send_json(request, None).await?;
        Ok(())
    }

    /// `PUT /api/user/me`; returns the fields the backend sent back.
    ///
    /// # Errors
    /// 401/403 come back as [`AuthErrorKind::InvalidSession`].
    pub async fn update_profile(
        &self,
        token: &str,
        update: &UserUpdate,
    ) -> AuthResult<Map<String, Value>> {
        let request = self
            .http
            .put(self.url("/api/user/me"))
            .bearer_auth(token)
            .json(update);
        let value = send_json(request, None).await?;
        match unwrap_envelope(&value, "user") {
            Value::Object(fields) => Ok(fields.clone()),
            Value::Null => Ok(Map::new()),
            other => Err(AuthError::parse(format!(
                "expected a user object, got {other}"
            ))),
        }
    }

    /// `GET /api/public/links/{hash}`
    ///
    /// # Errors
    /// A 404 becomes an [`AuthErrorKind::Api`] error with a "not found" message.
    pub async fn public_link(&self, hash: &str) -> AuthResult<PublicLinkData> {
        let request = self
            .http
            .get(self.url(&format!("/api/public/links/{hash}")));
        let value = send_json(request, Some(classify_public_link_error)).await?;
        decode(unwrap_envelope(&value, "preview"))
    }

    /// `POST /api/public/track/click`
    ///
    /// # Errors
    /// Returns transport and status errors; callers treat them as best-effort.
    pub async fn track_click(&self, event: &ClickEvent) -> AuthResult<()> {
        let request = self
            .http
            .post(self.url("/api/public/track/click"))
            .json(event);
        send_json(request, None).await?;
        Ok(())
    }

    /// Builds `GET /api/public/pixel?hash=&t=`.
    ///
    /// # Errors
    /// Returns a parse error if the base URL is not a valid URL.
    pub fn pixel_url(&self, hash: &str, timestamp_ms: i64) -> AuthResult<Url> {
        let mut url = Url::parse(&self.url("/api/public/pixel"))
            .map_err(|e| AuthError::parse(format!("invalid pixel URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("hash", hash)
            .append_pair("t", &timestamp_ms.to_string());
        Ok(url)
    }

    /// Requests the tracking pixel; the image body is discarded.
    ///
    /// # Errors
    /// Returns transport and status errors; callers treat them as best-effort.
    pub async fn pixel(&self, hash: &str, timestamp_ms: i64) -> AuthResult<()> {
        let url = self.pixel_url(hash, timestamp_ms)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::network(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::http_status(status.as_u16(), ""));
        }
        Ok(())
    }
}

/// Sends a request and decodes its JSON body (empty bodies become `Null`).
async fn send_json(
    request: reqwest::RequestBuilder,
    classifier: Option<ErrorClassifier>,
) -> AuthResult<Value> {
    let response = request
        .header("accept", "application/json")
        .send()
        .await
        .map_err(|e| AuthError::network(&e))?;

    let status = response.status();
    let retry_header = retry_after_header(response.headers());
    let body = response.text().await.map_err(|e| AuthError::network(&e))?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_header
            .or_else(|| retry_after_body(&body))
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(AuthError::rate_limited(retry_after).with_details(format!("HTTP 429: {body}")));
    }

    if !status.is_success() {
        if let Some(err) = classifier.and_then(|classify| classify(status, &body)) {
            return Err(err.with_details(format!("HTTP {}: {body}", status.as_u16())));
        }
        return Err(AuthError::http_status(status.as_u16(), &body));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| AuthError::parse(format!("{e}: {body}")))
}

fn decode<T: DeserializeOwned>(value: &Value) -> AuthResult<T> {
    T::deserialize(value).map_err(|e| AuthError::parse(format!("{e}: {value}")))
}

/// Reads `Retry-After` when it carries delta-seconds.
fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Reads `retryAfter` (seconds, number or numeric string) from a JSON body.
fn retry_after_body(body: &str) -> Option<Duration> {
    let json: Value = serde_json::from_str(body).ok()?;
    let value = ["retryAfter", "retry_after", "retryAfterSeconds"]
        .iter()
        .find_map(|key| json.get(*key))?;
    let secs = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    Some(Duration::from_secs(secs))
}

fn classify_login_error(status: StatusCode, body: &str) -> Option<AuthError> {
    if status != StatusCode::UNAUTHORIZED {
        return None;
    }
    let message =
        backend_message(body).unwrap_or_else(|| "Invalid email or password.".to_string());
    Some(AuthError::new(AuthErrorKind::Api, message))
}

fn classify_magic_link_error(status: StatusCode, body: &str) -> Option<AuthError> {
    let code = backend_code(body).unwrap_or_default();
    let message = backend_message(body)
        .unwrap_or_default()
        .to_lowercase();

    if code.contains("USED") || code.contains("CONSUMED") || message.contains("already used") {
        return Some(AuthError::magic_link_used());
    }
    if code.contains("EXPIRED") || message.contains("expired") || status == StatusCode::GONE {
        return Some(AuthError::magic_link_expired());
    }
    if status.is_client_error() {
        let message = backend_message(body)
            .unwrap_or_else(|| "This magic link is not valid. Request a new one.".to_string());
        return Some(AuthError::new(AuthErrorKind::Api, message));
    }
    None
}

fn classify_public_link_error(status: StatusCode, _body: &str) -> Option<AuthError> {
    (status == StatusCode::NOT_FOUND).then(|| {
        AuthError::new(
            AuthErrorKind::Api,
            "This link does not exist or is no longer active.",
        )
    })
}
