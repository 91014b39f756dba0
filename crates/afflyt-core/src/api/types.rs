//! Wire types of the Afflyt backend (camelCase JSON).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated user as returned by `/api/user/me` and the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub balance: f64,
    /// Legacy Amazon integration field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_associate_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Fields this client does not model, kept so snapshots round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Returns a copy with the fields of `patch` laid over this user.
    ///
    /// Only keys present in `patch` change; everything else is kept.
    ///
    /// # Errors
    /// Returns an error if the merged object no longer describes a user.
    pub fn merged_with(&self, patch: &Map<String, Value>) -> serde_json::Result<User> {
        let mut base = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            let key = if key == "_id" { "id" } else { key.as_str() };
            base.insert(key.to_string(), value.clone());
        }
        serde_json::from_value(Value::Object(base))
    }

    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Partial profile update for `PUT /api/user/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_associate_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.amazon_associate_tag.is_none() && self.website_url.is_none()
    }
}

/// `{ user, token }` returned by login and magic-link verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MagicLinkRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MagicLinkVerifyRequest<'a> {
    pub token: &'a str,
}

/// Link data behind a public preview page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLink {
    pub hash: String,
    #[serde(alias = "originalUrl", alias = "url")]
    pub destination_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Owner-defined branding of the preview page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branding {
    pub display_name: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub custom_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkOwner {
    pub name: Option<String>,
    pub website_url: Option<String>,
}

/// Response of `GET /api/public/links/{hash}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicLinkData {
    pub link: PublicLink,
    #[serde(default)]
    pub branding: Option<Branding>,
    #[serde(default)]
    pub owner: Option<LinkOwner>,
}

/// Body of `POST /api/public/track/click`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Peels the `{ "data": ... }` / `{ "user": ... }` envelopes some endpoints use.
pub(crate) fn unwrap_envelope<'a>(value: &'a Value, key: &str) -> &'a Value {
    let value = match value.get("data") {
        Some(data) if data.is_object() => data,
        _ => value,
    };
    match value.get(key) {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}
