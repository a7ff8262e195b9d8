//! Session-level orchestration.
//!
//! This module owns the coordinator loop that serializes surface callbacks,
//! external commands, and deferred completions, plus the recurring cookie
//! mirror job the coordinator starts and stops. Driver layers talk to a
//! session through channels only.

mod coordinator;
mod mirror;

pub use coordinator::{SessionCoordinator, SessionParams};
