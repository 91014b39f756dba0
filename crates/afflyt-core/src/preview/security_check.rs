//! Simulated security check shown before redirecting.
//!
//! Purely cosmetic: nothing is validated, the progress only moves forward in
//! random steps until it reaches exactly 100.

use rand::Rng;

pub const MIN_INCREMENT: u8 = 5;
pub const MAX_INCREMENT: u8 = 20;

/// Staged confirmations displayed while the check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityStage {
    LinkVerified,
    DestinationScanned,
    ConnectionSecured,
}

impl SecurityStage {
    pub const ALL: [SecurityStage; 3] = [
        SecurityStage::LinkVerified,
        SecurityStage::DestinationScanned,
        SecurityStage::ConnectionSecured,
    ];

    /// Percentage at which the stage is reported.
    pub fn threshold(self) -> u8 {
        match self {
            SecurityStage::LinkVerified => 20,
            SecurityStage::DestinationScanned => 50,
            SecurityStage::ConnectionSecured => 80,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SecurityStage::LinkVerified => "Link verified",
            SecurityStage::DestinationScanned => "Destination checked",
            SecurityStage::ConnectionSecured => "Secure connection ready",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityCheck {
    progress: u8,
    reached: Vec<SecurityStage>,
}

impl SecurityCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100
    }

    pub fn reached_stages(&self) -> &[SecurityStage] {
        &self.reached
    }

    /// Moves the progress forward, clamped at 100.
    ///
    /// Returns the stages crossed by this step, in threshold order.
    pub fn advance(&mut self, increment: u8) -> Vec<SecurityStage> {
        self.progress = self.progress.saturating_add(increment).min(100);

        let newly: Vec<SecurityStage> = SecurityStage::ALL
            .into_iter()
            .filter(|stage| self.progress >= stage.threshold() && !self.reached.contains(stage))
            .collect();
        self.reached.extend(&newly);
        newly
    }

    /// Draws one tick's increment.
    pub fn random_increment(rng: &mut impl Rng) -> u8 {
        rng.gen_range(MIN_INCREMENT..=MAX_INCREMENT)
    }
}
