//! Duplex relay between a telephony media stream and a realtime AI session.
//!
//! A [`Relay`] takes an accepted telephony connection, opens and configures
//! a connection to the AI service, and forwards audio both ways until either
//! side ends:
//!
//! - `ingest`: telephony events → `input_audio_buffer.append` on the AI side.
//! - `egress`: AI audio deltas → telephony media frames; AI text → call log.
//!
//! Both directions read into a bounded channel drained by a forwarder, and
//! share a cancellation token the coordinator fires when the first one ends.

pub mod config;
pub mod configurator;
pub mod connection;
mod egress;
pub mod error;
mod ingest;
pub mod log_sink;
mod pipe;
pub mod protocol;
pub mod relay;
pub mod session;

pub use config::{EarlyAudioPolicy, RelayOptions};
pub use connection::{Connection, RealtimeConnector, TextSink, TextStream};
pub use egress::EgressReport;
pub use error::RelayError;
pub use ingest::IngestReport;
pub use log_sink::{CallLog, CallLogFactory, FileCallLogFactory, NullCallLog};
pub use pipe::TaskEnd;
pub use protocol::SessionConfig;
pub use relay::{CallSummary, Relay, Side};
pub use session::{CallId, CallSession, CallState};
