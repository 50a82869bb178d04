//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the relay shared by
//! every media-stream connection.

use callrelay_core::Relay;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
}
