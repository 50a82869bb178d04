//! WebSocket plumbing
//!
//! - `session`: upgrades the telephony media stream and hands it to the relay.
//! - `provider`: opens the connection to the realtime AI service.

pub mod provider;
pub mod session;

pub use session::ws_handler;
