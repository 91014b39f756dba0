//! Timed driver of the preview flow.

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::navigator::{NavigationOutcome, Navigator, navigate_same_tab, open_in_new_context};
use super::security_check::{SecurityCheck, SecurityStage};
use super::{CallToAction, InvalidTransition, PreviewFlow, PreviewPhase};
use crate::config::PreviewConfig;

/// Progress reported to whoever renders the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewUpdate {
    Progress(u8),
    StageReached(SecurityStage),
    Redirecting { url: String },
}

pub struct PreviewRunner<N> {
    flow: PreviewFlow,
    navigator: N,
    timings: PreviewConfig,
    rng: StdRng,
}

impl<N: Navigator> PreviewRunner<N> {
    pub fn new(flow: PreviewFlow, navigator: N, timings: PreviewConfig) -> Self {
        Self {
            flow,
            navigator,
            timings,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the random source (deterministic tests).
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn flow(&self) -> &PreviewFlow {
        &self.flow
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn start(&mut self) -> PreviewPhase {
        self.flow.start().clone()
    }

    /// Returning visitor: waits the auto-redirect delay, then navigates.
    ///
    /// # Errors
    /// Returns [`InvalidTransition`] unless the flow is auto-redirecting.
    pub async fn run_auto_redirect(
        &mut self,
        mut on_update: impl FnMut(PreviewUpdate),
    ) -> Result<NavigationOutcome, InvalidTransition> {
        if self.flow.phase() != &PreviewPhase::AutoRedirecting {
            return Err(InvalidTransition {
                from: self.flow.phase().name(),
                action: "auto-redirect",
            });
        }

        let url = self.flow.destination_url().to_string();
        on_update(PreviewUpdate::Redirecting { url: url.clone() });
        tokio::time::sleep(self.timings.auto_redirect_delay()).await;
        Ok(navigate_same_tab(&self.navigator, &url))
    }

    /// Primary call to action: security check, short pause, same-tab navigation.
    ///
    /// # Errors
    /// Returns [`InvalidTransition`] unless the preview is showing.
    pub async fn run_primary(
        &mut self,
        mut on_update: impl FnMut(PreviewUpdate),
    ) -> Result<NavigationOutcome, InvalidTransition> {
        self.flow.activate(CallToAction::Primary)?;
        on_update(PreviewUpdate::Progress(0));

        let tick = self.timings.tick();
        loop {
            let Some(check) = self.flow.security_check_mut() else {
                break;
            };
            if check.is_complete() {
                break;
            }
            tokio::time::sleep(tick).await;

            let increment = SecurityCheck::random_increment(&mut self.rng);
            let Some(check) = self.flow.security_check_mut() else {
                break;
            };
            let stages = check.advance(increment);
            on_update(PreviewUpdate::Progress(check.progress()));
            for stage in stages {
                on_update(PreviewUpdate::StageReached(stage));
            }
        }

        tokio::time::sleep(self.timings.completion_pause()).await;
        let url = self.flow.destination_url().to_string();
        on_update(PreviewUpdate::Redirecting { url: url.clone() });
        Ok(navigate_same_tab(&self.navigator, &url))
    }

    /// Secondary call to action: new context right away, no check.
    ///
    /// # Errors
    /// Returns [`InvalidTransition`] unless the preview is showing.
    pub fn run_secondary(
        &mut self,
        mut on_update: impl FnMut(PreviewUpdate),
    ) -> Result<NavigationOutcome, InvalidTransition> {
        self.flow.activate(CallToAction::Secondary)?;
        let url = self.flow.destination_url().to_string();
        on_update(PreviewUpdate::Redirecting { url: url.clone() });
        Ok(open_in_new_context(&self.navigator, &url))
    }
}
