//! Utilities Module
//!
//! Logging and retry helpers shared across the crate.

pub mod logging;
pub mod retry;
