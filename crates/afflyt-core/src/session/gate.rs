//! Redirect gate.
//!
//! Navigation must not branch on `is_authenticated` before bootstrap has
//! concluded: until then the in-memory default is "logged out" and a page
//! refresh would bounce a signed-in user to the login page.

use super::SessionState;
use crate::config::RedirectsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectGate {
    initialized: bool,
    authenticated: bool,
}

impl From<&SessionState> for RedirectGate {
    fn from(state: &SessionState) -> Self {
        Self {
            initialized: state.is_initialized(),
            authenticated: state.is_authenticated(),
        }
    }
}

/// What a page needs from the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// Signed-in users only; others go to `login_path`.
    Authenticated { login_path: String },
    /// Signed-out users only (sign-in pages); others go to `home_path`.
    Guest { home_path: String },
}

impl AccessRequirement {
    pub fn authenticated(redirects: &RedirectsConfig) -> Self {
        Self::Authenticated {
            login_path: redirects.login_path.clone(),
        }
    }

    pub fn guest(redirects: &RedirectsConfig) -> Self {
        Self::Guest {
            home_path: redirects.home_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Bootstrap still running; render a placeholder.
    Wait,
    /// Requirement met.
    Stay,
    Redirect { to: String },
}

impl RedirectGate {
    pub fn is_initializing(&self) -> bool {
        !self.initialized
    }

    pub fn can_redirect(&self) -> bool {
        self.initialized
    }

    pub fn decide(&self, requirement: &AccessRequirement) -> RedirectDecision {
        if !self.can_redirect() {
            return RedirectDecision::Wait;
        }
        match requirement {
            AccessRequirement::Authenticated { login_path } if !self.authenticated => {
                RedirectDecision::Redirect {
                    to: login_path.clone(),
                }
            }
            AccessRequirement::Guest { home_path } if self.authenticated => {
                RedirectDecision::Redirect {
                    to: home_path.clone(),
                }
            }
            _ => RedirectDecision::Stay,
        }
    }
}
