//! Call Relay API Library Crate
//!
//! The web service around `callrelay-core`: configuration, the telephony
//! webhook, the media-stream WebSocket and the OpenAI realtime connector.
//! The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
