//! Per-call session state shared by the two relay directions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

static CALL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifies a call. Derived from the local start time plus a process-wide
/// sequence number, and used to name the call's log files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(String);

impl CallId {
    pub fn generate() -> Self {
        let seq = CALL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
        Self(format!("{}-{:04}", stamp, seq % 10_000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a call. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallState {
    Initializing,
    Active,
    Closing,
    Closed,
}

/// State of one relayed call.
///
/// The relay coordinator owns the session and is the only party allowed to
/// move its state. The stream id is written once through the
/// [`StreamSidWriter`] handed to the telephony ingest task.
#[derive(Debug)]
pub struct CallSession {
    call_id: CallId,
    stream_sid: watch::Receiver<Option<String>>,
    state: watch::Sender<CallState>,
}

impl CallSession {
    /// Creates a session in `Initializing` state, together with the single
    /// writer of its stream id.
    pub fn new() -> (Arc<Self>, StreamSidWriter) {
        let (sid_tx, sid_rx) = watch::channel(None);
        let (state_tx, _) = watch::channel(CallState::Initializing);
        let session = Arc::new(Self {
            call_id: CallId::generate(),
            stream_sid: sid_rx,
            state: state_tx,
        });
        (session, StreamSidWriter { tx: sid_tx })
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// The stream id, if the telephony side has already started streaming.
    pub fn stream_sid(&self) -> Option<String> {
        self.stream_sid.borrow().clone()
    }

    /// Waits until the stream id is known.
    ///
    /// Never resolves if the writer is dropped without ever setting one.
    pub async fn wait_for_stream_sid(&self) -> String {
        let mut rx = self.stream_sid.clone();
        let sid = match rx.wait_for(Option::is_some).await {
            Ok(sid) => sid.clone(),
            Err(_) => None,
        };
        match sid {
            Some(sid) => sid,
            None => std::future::pending().await,
        }
    }

    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    pub(crate) fn transition(&self, next: CallState) {
        self.state.send_if_modified(|current| {
            if next > *current {
                debug!(from = ?*current, to = ?next, "Call state transition");
                *current = next;
                true
            } else {
                warn!(from = ?*current, to = ?next, "Ignoring backward call state transition");
                false
            }
        });
    }
}

/// The only handle able to assign a session's stream id.
#[derive(Debug)]
pub struct StreamSidWriter {
    tx: watch::Sender<Option<String>>,
}

impl StreamSidWriter {
    /// Stores the stream id. Returns `false` and leaves the stored value
    /// untouched if one was already assigned.
    pub fn set(&self, sid: &str) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(sid.to_string());
                true
            }
        })
    }
}
