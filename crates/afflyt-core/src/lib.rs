//! Core Afflyt client library (session, auth, preview flow, API, storage, config).

pub mod api;
pub mod config;
pub mod logging;
pub mod preview;
pub mod session;
pub mod storage;
pub mod validation;
