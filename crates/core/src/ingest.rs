//! Telephony → AI direction.

use crate::{
    config::RelayOptions,
    connection::{TextSink, TextStream},
    log_sink::{AudioDirection, CallLog},
    pipe::{Next, TaskEnd, enqueue, forward_frames, next_frame},
    protocol::{ClientEvent, TelephonyEvent},
    session::StreamSidWriter,
};
use base64::Engine;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of the telephony ingest task.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub end: TaskEnd,
    /// Append messages delivered to the AI connection.
    pub forwarded: usize,
}

pub(crate) struct Ingest {
    pub telephony: TextStream,
    pub realtime: TextSink,
    pub stream_sid: StreamSidWriter,
    pub log: Arc<dyn CallLog>,
    pub cancel: CancellationToken,
    pub options: RelayOptions,
}

impl Ingest {
    /// Runs until the telephony stream ends, fails, or the call is cancelled.
    /// The AI connection is closed on the way out.
    pub(crate) async fn run(self) -> IngestReport {
        let Ingest {
            telephony,
            realtime,
            stream_sid,
            log,
            cancel,
            options,
        } = self;

        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let local = cancel.child_token();
        let reader = read_telephony(telephony, tx, stream_sid, log, local.clone(), options);
        let forwarder = forward_frames(rx, realtime, cancel, local, "realtime", true);
        let (end, (forwarded, result, _)) = tokio::join!(reader, forwarder);

        let end = match result {
            Err(e) => TaskEnd::Failed(e.to_string()),
            Ok(()) => end,
        };
        info!(?end, forwarded, "Telephony ingest finished");
        IngestReport { end, forwarded }
    }
}

async fn read_telephony(
    mut telephony: TextStream,
    tx: mpsc::Sender<String>,
    stream_sid: StreamSidWriter,
    log: Arc<dyn CallLog>,
    cancel: CancellationToken,
    options: RelayOptions,
) -> TaskEnd {
    loop {
        let text = match next_frame(&mut telephony, &cancel, options.max_idle).await {
            Next::Frame(text) => text,
            Next::Closed => {
                info!("Telephony connection closed");
                return TaskEnd::Finished;
            }
            Next::Idle => {
                warn!("Telephony connection idle, ending call");
                return TaskEnd::Idle;
            }
            Next::Cancelled => return TaskEnd::Cancelled,
            Next::Failed(e) => {
                warn!(error = %e, "Error receiving from telephony");
                return TaskEnd::Failed(e.to_string());
            }
        };

        let event = match serde_json::from_str::<TelephonyEvent>(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed telephony message");
                continue;
            }
        };

        match &event {
            TelephonyEvent::Start { .. } => match event.stream_sid() {
                Some(sid) => {
                    if stream_sid.set(sid) {
                        info!(stream_sid = %sid, "Incoming stream has started");
                    } else {
                        warn!(stream_sid = %sid, "Ignoring repeated start event");
                    }
                }
                None => warn!("Start event without a stream id"),
            },
            TelephonyEvent::Media { media } => {
                if let Err(e) = base64::engine::general_purpose::STANDARD.decode(&media.payload) {
                    warn!(error = %e, "Dropping media event with invalid payload");
                    continue;
                }
                let append = ClientEvent::InputAudioBufferAppend {
                    audio: media.payload.clone(),
                };
                let frame = match serde_json::to_string(&append) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode audio append");
                        continue;
                    }
                };
                if !enqueue(&tx, frame, &cancel).await {
                    return if cancel.is_cancelled() {
                        TaskEnd::Cancelled
                    } else {
                        TaskEnd::Failed("realtime forwarder stopped".to_string())
                    };
                }
                if let Err(e) = log
                    .record_audio(AudioDirection::Received, &media.payload)
                    .await
                {
                    warn!(error = %e, "Failed to write audio log");
                }
            }
            TelephonyEvent::Stop => {
                info!("Telephony stream stopped");
                return TaskEnd::Finished;
            }
            TelephonyEvent::Other => debug!("Ignoring telephony event"),
        }
    }
}
