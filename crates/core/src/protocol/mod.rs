//! Wire formats of the two relayed connections.

pub mod realtime;
pub mod telephony;

pub use realtime::{AudioFormat, ClientEvent, ServerEvent, SessionConfig, TurnDetection};
pub use telephony::{OutboundMedia, TelephonyEvent};
