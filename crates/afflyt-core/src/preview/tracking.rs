//! Fire-and-forget visit tracking.
//!
//! Both calls are spawned on the current tokio runtime and their errors are
//! dropped after a debug log: tracking must never delay or break a redirect.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::api::{ApiClient, ClickEvent};

#[derive(Debug, Clone)]
pub struct Tracker {
    api: ApiClient,
    pixel_delay: Duration,
}

impl Tracker {
    pub fn new(api: ApiClient, pixel_delay: Duration) -> Self {
        Self { api, pixel_delay }
    }

    /// Requests the tracking pixel for `hash` after the pixel delay.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn fire_pixel(&self, hash: &str) -> JoinHandle<()> {
        let api = self.api.clone();
        let hash = hash.to_string();
        let delay = self.pixel_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let timestamp = chrono::Utc::now().timestamp_millis();
            match api.pixel(&hash, timestamp).await {
                Ok(()) => tracing::trace!(%hash, "pixel sent"),
                Err(err) => tracing::debug!(
                    %hash,
                    details = err.details.as_deref().unwrap_or(""),
                    "pixel request failed"
                ),
            }
        })
    }

    /// Registers a click on `hash`.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn register_click(&self, event: ClickEvent) -> JoinHandle<()> {
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(err) = api.track_click(&event).await {
                tracing::debug!(
                    hash = %event.hash,
                    details = err.details.as_deref().unwrap_or(""),
                    "click registration failed"
                );
            }
        })
    }
}
