//! Building blocks shared by both relay directions: a cancellable, optionally
//! idle-bounded read, and the forwarder that drains a bounded channel into a
//! peer connection.

use crate::{
    connection::{TextSink, TextStream},
    error::RelayError,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a relay task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEnd {
    /// The peer closed its connection or signalled the end of the stream.
    Finished,
    /// The coordinator stopped the task.
    Cancelled,
    /// No inbound frame arrived within the configured idle limit.
    Idle,
    /// A read or forward failed.
    Failed(String),
}

pub(crate) enum Next {
    Frame(String),
    Closed,
    Idle,
    Cancelled,
    Failed(RelayError),
}

/// Waits for the next inbound frame, the cancellation signal, or the idle
/// limit, whichever comes first.
pub(crate) async fn next_frame(
    stream: &mut TextStream,
    cancel: &CancellationToken,
    max_idle: Option<Duration>,
) -> Next {
    let read = async {
        match max_idle {
            Some(limit) => tokio::time::timeout(limit, stream.next()).await.ok(),
            None => Some(stream.next().await),
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Next::Cancelled,
        item = read => match item {
            None => Next::Idle,
            Some(None) => Next::Closed,
            Some(Some(Ok(text))) => Next::Frame(text),
            Some(Some(Err(e))) => Next::Failed(e),
        },
    }
}

/// Queues a frame for the forwarder. Returns `false` once the forwarder is
/// gone or the call is being torn down.
pub(crate) async fn enqueue(
    tx: &mpsc::Sender<String>,
    frame: String,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(frame) => sent.is_ok(),
    }
}

/// Drains `rx` into `sink` in order until the channel closes or `cancel`
/// fires. On a send failure, `on_failure` is cancelled so the matching reader
/// stops too. The sink is closed when `close_sink` is set, and handed back
/// either way along with the number of frames delivered.
pub(crate) async fn forward_frames(
    mut rx: mpsc::Receiver<String>,
    mut sink: TextSink,
    cancel: CancellationToken,
    on_failure: CancellationToken,
    peer: &'static str,
    close_sink: bool,
) -> (usize, Result<(), RelayError>, TextSink) {
    let mut forwarded = 0usize;
    let result = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            frame = rx.recv() => frame,
        };
        let Some(frame) = frame else {
            break Ok(());
        };
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            sent = sink.send(frame) => sent,
        };
        match sent {
            Ok(()) => forwarded += 1,
            Err(e) => {
                warn!(peer, error = %e, "Failed to forward frame");
                on_failure.cancel();
                break Err(e);
            }
        }
    };
    if close_sink {
        if let Err(e) = sink.close().await {
            debug!(peer, error = %e, "Error while closing connection");
        }
    }
    debug!(peer, forwarded, "Forwarder finished");
    (forwarded, result, sink)
}
