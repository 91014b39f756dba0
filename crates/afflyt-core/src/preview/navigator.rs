//! Navigation to the destination URL, with fallbacks.

use anyhow::Result;

/// Something that can take the visitor to a URL.
pub trait Navigator: Send + Sync {
    /// Replaces the current page.
    ///
    /// # Errors
    /// Returns an error if navigation was blocked.
    fn navigate(&self, url: &str) -> Result<()>;

    /// Opens the URL in a new browsing context (tab/window).
    ///
    /// # Errors
    /// Returns an error if the new context could not be opened.
    fn open_new_context(&self, url: &str) -> Result<()>;
}

/// How the visitor ended up leaving the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    SameTab,
    NewContext,
    /// Same-tab navigation failed, a new context was opened instead.
    FellBackToNewContext,
    /// New context was blocked, the current page navigated instead.
    FellBackToSameTab,
    /// Both ways failed; the caller should offer a manual link.
    ManualFallback { url: String },
}

/// Navigates in place, falling back to a new context.
pub fn navigate_same_tab(navigator: &dyn Navigator, url: &str) -> NavigationOutcome {
    match navigator.navigate(url) {
        Ok(()) => NavigationOutcome::SameTab,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "same-tab navigation failed");
            match navigator.open_new_context(url) {
                Ok(()) => NavigationOutcome::FellBackToNewContext,
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "navigation blocked");
                    NavigationOutcome::ManualFallback {
                        url: url.to_string(),
                    }
                }
            }
        }
    }
}

/// Opens a new context, falling back to in-place navigation.
pub fn open_in_new_context(navigator: &dyn Navigator, url: &str) -> NavigationOutcome {
    match navigator.open_new_context(url) {
        Ok(()) => NavigationOutcome::NewContext,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "opening new context failed");
            match navigator.navigate(url) {
                Ok(()) => NavigationOutcome::FellBackToSameTab,
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "navigation blocked");
                    NavigationOutcome::ManualFallback {
                        url: url.to_string(),
                    }
                }
            }
        }
    }
}
