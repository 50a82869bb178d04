//! AI → telephony direction.

use crate::{
    config::{EarlyAudioPolicy, RelayOptions},
    connection::{TextSink, TextStream},
    log_sink::{AudioDirection, CallLog},
    pipe::{Next, TaskEnd, enqueue, forward_frames, next_frame},
    protocol::{OutboundMedia, ServerEvent},
    session::CallSession,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of the AI egress task.
#[derive(Debug, Clone)]
pub struct EgressReport {
    pub end: TaskEnd,
    /// Media frames delivered to the telephony connection.
    pub forwarded: usize,
    /// Early audio deltas discarded because no stream id was known.
    pub dropped_early: usize,
}

pub(crate) struct Egress {
    pub realtime: TextStream,
    pub telephony: TextSink,
    pub session: Arc<CallSession>,
    pub log: Arc<dyn CallLog>,
    pub cancel: CancellationToken,
    pub options: RelayOptions,
}

impl Egress {
    /// Runs until the AI stream ends, fails, or the call is cancelled.
    ///
    /// The telephony sink is not closed here; it is handed back so the
    /// coordinator can close it.
    pub(crate) async fn run(self) -> (EgressReport, TextSink) {
        let Egress {
            realtime,
            telephony,
            session,
            log,
            cancel,
            options,
        } = self;

        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let local = cancel.child_token();
        let reader = AiReader {
            session,
            log,
            tx,
            cancel: local.clone(),
            policy: options.early_audio,
            pending: VecDeque::new(),
            dropped_early: 0,
        };
        let read = reader.run(realtime, options.max_idle);
        let forwarder = forward_frames(rx, telephony, cancel, local, "telephony", false);
        let ((end, dropped_early), (forwarded, result, telephony)) =
            tokio::join!(read, forwarder);

        let end = match result {
            Err(e) => TaskEnd::Failed(e.to_string()),
            Ok(()) => end,
        };
        info!(?end, forwarded, dropped_early, "AI egress finished");
        let report = EgressReport {
            end,
            forwarded,
            dropped_early,
        };
        (report, telephony)
    }
}

struct AiReader {
    session: Arc<CallSession>,
    log: Arc<dyn CallLog>,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    policy: EarlyAudioPolicy,
    /// Audio payloads waiting for the stream id, oldest first.
    pending: VecDeque<String>,
    dropped_early: usize,
}

impl AiReader {
    /// Reads until the AI stream ends. Consumes the reader so its sender is
    /// dropped and the forwarder can drain and finish.
    async fn run(
        mut self,
        mut realtime: TextStream,
        max_idle: Option<Duration>,
    ) -> (TaskEnd, usize) {
        let end = self.read_loop(&mut realtime, max_idle).await;
        let mut dropped = self.dropped_early;
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Discarding AI audio that never received a stream id"
            );
            dropped += self.pending.len();
        }
        (end, dropped)
    }

    async fn read_loop(
        &mut self,
        realtime: &mut TextStream,
        max_idle: Option<Duration>,
    ) -> TaskEnd {
        loop {
            let next = if self.pending.is_empty() {
                next_frame(realtime, &self.cancel, max_idle).await
            } else {
                let session = self.session.clone();
                tokio::select! {
                    sid = session.wait_for_stream_sid() => {
                        if !self.flush_pending(&sid).await {
                            return self.stopped();
                        }
                        continue;
                    }
                    next = next_frame(realtime, &self.cancel, max_idle) => next,
                }
            };

            let text = match next {
                Next::Frame(text) => text,
                Next::Closed => {
                    info!("AI connection closed");
                    return TaskEnd::Finished;
                }
                Next::Idle => {
                    warn!("AI connection idle, ending call");
                    return TaskEnd::Idle;
                }
                Next::Cancelled => return TaskEnd::Cancelled,
                Next::Failed(e) => {
                    warn!(error = %e, "Error receiving from AI service");
                    return TaskEnd::Failed(e.to_string());
                }
            };

            let event = match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed AI message");
                    continue;
                }
            };

            if !self.handle(event).await {
                return self.stopped();
            }
        }
    }

    /// Applies one AI event. Returns `false` when the telephony forwarder is
    /// gone.
    async fn handle(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::ResponseAudioDelta { delta } => {
                if delta.is_empty() {
                    debug!("Ignoring audio delta without payload");
                    return true;
                }
                match self.session.stream_sid() {
                    Some(sid) => {
                        if !self.pending.is_empty() && !self.flush_pending(&sid).await {
                            return false;
                        }
                        self.send_audio(&sid, delta).await
                    }
                    None => {
                        self.hold_early(delta);
                        true
                    }
                }
            }
            ServerEvent::ResponseText { text }
            | ServerEvent::AudioTranscriptDone { transcript: text } => {
                if !text.is_empty() {
                    info!(text = %text, "AI response");
                    if let Err(e) = self.log.record_text(&text).await {
                        warn!(error = %e, "Failed to write text log");
                    }
                }
                true
            }
            ServerEvent::Error { error } => {
                warn!(
                    error_type = ?error.error_type,
                    code = ?error.code,
                    message = ?error.message,
                    "AI service reported an error"
                );
                true
            }
            event if event.is_diagnostic() => {
                debug!(kind = event.kind(), "AI event");
                true
            }
            _ => true,
        }
    }

    fn hold_early(&mut self, delta: String) {
        match self.policy {
            EarlyAudioPolicy::Drop => {
                self.dropped_early += 1;
                warn!("Dropping AI audio received before the stream started");
            }
            EarlyAudioPolicy::Buffer { max_frames } => {
                if self.pending.len() >= max_frames.max(1) {
                    self.pending.pop_front();
                    self.dropped_early += 1;
                    warn!(max_frames, "Early audio buffer full, dropping oldest frame");
                }
                self.pending.push_back(delta);
                debug!(pending = self.pending.len(), "Holding AI audio until the stream starts");
            }
        }
    }

    async fn flush_pending(&mut self, sid: &str) -> bool {
        debug!(count = self.pending.len(), "Flushing held AI audio");
        while let Some(delta) = self.pending.pop_front() {
            if !self.send_audio(sid, delta).await {
                return false;
            }
        }
        true
    }

    async fn send_audio(&mut self, sid: &str, delta: String) -> bool {
        let frame = OutboundMedia::new(sid, delta);
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode media frame");
                return true;
            }
        };
        if !enqueue(&self.tx, text, &self.cancel).await {
            return false;
        }
        if let Err(e) = self
            .log
            .record_audio(AudioDirection::Sent, &frame.media.payload)
            .await
        {
            warn!(error = %e, "Failed to write audio log");
        }
        true
    }

    fn stopped(&self) -> TaskEnd {
        if self.cancel.is_cancelled() {
            TaskEnd::Cancelled
        } else {
            TaskEnd::Failed("telephony forwarder stopped".to_string())
        }
    }
}
