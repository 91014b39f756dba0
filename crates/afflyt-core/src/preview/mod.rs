//! Public link preview and redirect flow.
//!
//! A visitor who has never passed the interstitial for a hash sees the
//! preview page; a returning visitor is redirected after a short delay. The
//! "seen" flag is a Visit Record in the visitor's local store.

mod navigator;
mod runner;
mod security_check;
mod tracking;

use std::fmt;
use std::sync::Arc;

pub use navigator::{NavigationOutcome, Navigator, navigate_same_tab, open_in_new_context};
pub use runner::{PreviewRunner, PreviewUpdate};
pub use security_check::{MAX_INCREMENT, MIN_INCREMENT, SecurityCheck, SecurityStage};
pub use tracking::Tracker;

use crate::api::PublicLinkData;
use crate::storage::KeyValueStore;

/// Label shown when the destination URL cannot be parsed.
pub const UNKNOWN_DESTINATION: &str = "destinazione sconosciuta";

const VISIT_KEY_PREFIX: &str = "afflyt_preview_seen_";

pub const AFFILIATE_DISCLOSURE: &str = "This is an affiliate link: the link owner may earn a commission on qualifying purchases, at no extra cost to you.";

/// Storage key of the Visit Record for `hash`.
pub fn visit_key(hash: &str) -> String {
    format!("{VISIT_KEY_PREFIX}{hash}")
}

/// Host of `url` without a leading `www.`, or [`UNKNOWN_DESTINATION`].
pub fn domain_label(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| UNKNOWN_DESTINATION.to_string())
}

/// The two calls to action of the preview page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallToAction {
    /// Continue through the simulated security check.
    Primary,
    /// Open the destination in a new tab right away.
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewPhase {
    Initial,
    ShowingPreview,
    AutoRedirecting,
    SecurityCheck(SecurityCheck),
    ImmediateRedirect,
}

impl PreviewPhase {
    fn name(&self) -> &'static str {
        match self {
            PreviewPhase::Initial => "initial",
            PreviewPhase::ShowingPreview => "showing_preview",
            PreviewPhase::AutoRedirecting => "auto_redirecting",
            PreviewPhase::SecurityCheck(_) => "security_check",
            PreviewPhase::ImmediateRedirect => "immediate_redirect",
        }
    }
}

/// Transition requested from a phase that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: &'static str,
    pub action: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} while {}", self.action, self.from)
    }
}

impl std::error::Error for InvalidTransition {}

/// Per-visit preview state machine.
pub struct PreviewFlow {
    hash: String,
    destination_url: String,
    domain: String,
    phase: PreviewPhase,
    store: Arc<dyn KeyValueStore>,
}

impl PreviewFlow {
    pub fn new(
        hash: impl Into<String>,
        destination_url: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let destination_url = destination_url.into();
        Self {
            hash: hash.into(),
            domain: domain_label(&destination_url),
            destination_url,
            phase: PreviewPhase::Initial,
            store,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn destination_url(&self) -> &str {
        &self.destination_url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn phase(&self) -> &PreviewPhase {
        &self.phase
    }

    /// True if this visitor already passed the preview for this hash.
    pub fn has_seen(&self) -> bool {
        match self.store.get(&visit_key(&self.hash)) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                tracing::debug!(error = %format!("{err:#}"), "visit record unreadable");
                false
            }
        }
    }

    /// Picks the branch for this visit. Only acts from `Initial`.
    pub fn start(&mut self) -> &PreviewPhase {
        if self.phase == PreviewPhase::Initial {
            self.phase = if self.has_seen() {
                PreviewPhase::AutoRedirecting
            } else {
                PreviewPhase::ShowingPreview
            };
            tracing::debug!(hash = %self.hash, phase = self.phase.name(), "preview started");
        }
        &self.phase
    }

    /// Handles a call to action on the preview page.
    ///
    /// The Visit Record is written before the transition so the next visit
    /// skips the preview even if navigation never happens.
    ///
    /// # Errors
    /// Returns [`InvalidTransition`] unless the preview is showing.
    pub fn activate(&mut self, cta: CallToAction) -> Result<&PreviewPhase, InvalidTransition> {
        if self.phase != PreviewPhase::ShowingPreview {
            return Err(InvalidTransition {
                from: self.phase.name(),
                action: match cta {
                    CallToAction::Primary => "continue",
                    CallToAction::Secondary => "open in new tab",
                },
            });
        }

        self.mark_seen();
        self.phase = match cta {
            CallToAction::Primary => PreviewPhase::SecurityCheck(SecurityCheck::new()),
            CallToAction::Secondary => PreviewPhase::ImmediateRedirect,
        };
        Ok(&self.phase)
    }

    /// Running security check, if any.
    pub fn security_check_mut(&mut self) -> Option<&mut SecurityCheck> {
        match &mut self.phase {
            PreviewPhase::SecurityCheck(check) => Some(check),
            _ => None,
        }
    }

    fn mark_seen(&self) {
        if let Err(err) = self.store.set(&visit_key(&self.hash), "true") {
            tracing::warn!(hash = %self.hash, error = %format!("{err:#}"), "failed to save visit record");
        }
    }
}

/// What the preview page shows, derived from the public link data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPage {
    pub hash: String,
    pub title: String,
    pub brand_name: Option<String>,
    pub brand_message: Option<String>,
    pub owner_name: Option<String>,
    pub destination_url: String,
    pub destination_domain: String,
    pub disclosure: &'static str,
    pub primary_label: &'static str,
    pub secondary_label: &'static str,
}

impl From<&PublicLinkData> for PreviewPage {
    fn from(data: &PublicLinkData) -> Self {
        let branding = data.branding.clone().unwrap_or_default();
        let owner_name = data.owner.as_ref().and_then(|o| o.name.clone());
        let destination_domain = domain_label(&data.link.destination_url);
        let title = data
            .link
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("You are about to visit {destination_domain}"));

        Self {
            hash: data.link.hash.clone(),
            title,
            brand_name: branding.display_name.or_else(|| owner_name.clone()),
            brand_message: branding.custom_message,
            owner_name,
            destination_url: data.link.destination_url.clone(),
            destination_domain,
            disclosure: AFFILIATE_DISCLOSURE,
            primary_label: "Continue to the site",
            secondary_label: "Open in a new tab",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStore;

    fn flow(store: &Arc<MemoryStore>, hash: &str) -> PreviewFlow {
        let store: Arc<dyn KeyValueStore> = store.clone();
        PreviewFlow::new(hash, "https://www.amazon.it/dp/B000", store)
    }

    #[test]
    fn test_domain_label() {
        assert_eq!(domain_label("https://www.amazon.it/dp/B000?tag=x"), "amazon.it");
        assert_eq!(domain_label("http://shop.example.com:8080/a"), "shop.example.com");
        assert_eq!(domain_label("not a url"), UNKNOWN_DESTINATION);
        assert_eq!(domain_label(""), UNKNOWN_DESTINATION);
        assert_eq!(domain_label("mailto:someone@example.com"), UNKNOWN_DESTINATION);
    }

    #[test]
    fn test_first_visit_shows_preview_then_returning_visit_redirects() {
        let store = Arc::new(MemoryStore::new());

        let mut first = flow(&store, "abc");
        assert_eq!(first.start(), &PreviewPhase::ShowingPreview);
        assert!(!first.has_seen());
        first.activate(CallToAction::Primary).unwrap();
        assert!(matches!(first.phase(), PreviewPhase::SecurityCheck(_)));
        assert_eq!(
            store.get(&visit_key("abc")).unwrap().as_deref(),
            Some("true")
        );

        let mut second = flow(&store, "abc");
        assert_eq!(second.start(), &PreviewPhase::AutoRedirecting);

        let mut other_hash = flow(&store, "xyz");
        assert_eq!(other_hash.start(), &PreviewPhase::ShowingPreview);
    }

    #[test]
    fn test_secondary_cta_marks_seen() {
        let store = Arc::new(MemoryStore::new());
        let mut flow = flow(&store, "abc");
        flow.start();
        assert_eq!(
            flow.activate(CallToAction::Secondary).unwrap(),
            &PreviewPhase::ImmediateRedirect
        );
        assert!(flow.has_seen());
    }

    #[test]
    fn test_activate_outside_preview_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut flow = flow(&store, "abc");

        let err = flow.activate(CallToAction::Primary).unwrap_err();
        assert_eq!(err.from, "initial");
        assert!(store.is_empty());

        flow.start();
        flow.activate(CallToAction::Primary).unwrap();
        assert!(flow.activate(CallToAction::Secondary).is_err());
    }

    #[test]
    fn test_start_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut flow = flow(&store, "abc");
        flow.start();
        flow.activate(CallToAction::Secondary).unwrap();
        assert_eq!(flow.start(), &PreviewPhase::ImmediateRedirect);
    }

    #[test]
    fn test_page_from_link_data() {
        let data: PublicLinkData = serde_json::from_value(json!({
            "link": { "hash": "abc", "destinationUrl": "not a url" },
            "owner": { "name": "Mario" }
        }))
        .unwrap();

        let page = PreviewPage::from(&data);
        assert_eq!(page.destination_domain, UNKNOWN_DESTINATION);
        assert_eq!(page.brand_name.as_deref(), Some("Mario"));
        assert_eq!(page.title, "You are about to visit destinazione sconosciuta");
        assert_eq!(page.disclosure, AFFILIATE_DISCLOSURE);
    }
}
