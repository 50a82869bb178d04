//! The relay coordinator: owns a call from the accepted telephony connection
//! to teardown.

use crate::{
    config::RelayOptions,
    configurator::configure_session,
    connection::{Connection, RealtimeConnector, TextSink},
    egress::{Egress, EgressReport},
    error::RelayError,
    ingest::{Ingest, IngestReport},
    log_sink::{CallLog, CallLogFactory, NullCallLog},
    pipe::TaskEnd,
    protocol::SessionConfig,
    session::{CallId, CallSession, CallState, StreamSidWriter},
};
use futures::SinkExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// The side whose task ended first and triggered teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Telephony,
    Realtime,
}

/// What happened during a relayed call.
#[derive(Debug, Clone)]
pub struct CallSummary {
    pub call_id: CallId,
    pub stream_sid: Option<String>,
    pub ended_by: Side,
    pub telephony_end: TaskEnd,
    pub realtime_end: TaskEnd,
    /// Audio appends delivered to the AI service.
    pub frames_to_realtime: usize,
    /// Media frames delivered to the telephony provider.
    pub frames_to_telephony: usize,
    pub dropped_early_audio: usize,
}

/// Relays calls between the telephony provider and the realtime AI service.
///
/// Cheap to clone; every call gets its own session, connections and logs.
#[derive(Clone)]
pub struct Relay {
    connector: Arc<dyn RealtimeConnector>,
    logs: Arc<dyn CallLogFactory>,
    session_config: Arc<SessionConfig>,
    options: RelayOptions,
}

impl Relay {
    pub fn new(
        connector: Arc<dyn RealtimeConnector>,
        logs: Arc<dyn CallLogFactory>,
        session_config: SessionConfig,
        options: RelayOptions,
    ) -> Self {
        Self {
            connector,
            logs,
            session_config: Arc::new(session_config),
            options,
        }
    }

    /// Relays one call until either side ends.
    ///
    /// Returns an error, without starting any relay task, when the AI
    /// connection cannot be opened or configured. The telephony connection
    /// is closed in every case.
    pub async fn run_call(&self, telephony: Connection) -> Result<CallSummary, RelayError> {
        let (session, stream_sid) = CallSession::new();
        let span = info_span!("call", call_id = %session.call_id());
        self.relay(session, stream_sid, telephony)
            .instrument(span)
            .await
    }

    async fn relay(
        &self,
        session: Arc<CallSession>,
        stream_sid: StreamSidWriter,
        telephony: Connection,
    ) -> Result<CallSummary, RelayError> {
        let Connection {
            sink: mut telephony_sink,
            stream: telephony_stream,
        } = telephony;

        info!("Opening realtime connection");
        let realtime = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Could not open realtime connection, aborting call");
                close_quietly(&mut telephony_sink, "telephony").await;
                return Err(e);
            }
        };
        let Connection {
            sink: mut realtime_sink,
            stream: realtime_stream,
        } = realtime;

        if let Err(e) = configure_session(&mut realtime_sink, &self.session_config).await {
            error!(error = %e, "Could not configure realtime session, aborting call");
            close_quietly(&mut realtime_sink, "realtime").await;
            close_quietly(&mut telephony_sink, "telephony").await;
            return Err(e);
        }

        let log: Arc<dyn CallLog> = match self.logs.open(session.call_id()).await {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "Could not open call logs, continuing without them");
                Arc::new(NullCallLog)
            }
        };

        session.transition(CallState::Active);
        let cancel = CancellationToken::new();
        let span = tracing::Span::current();
        let mut ingest = tokio::spawn(
            Ingest {
                telephony: telephony_stream,
                realtime: realtime_sink,
                stream_sid,
                log: log.clone(),
                cancel: cancel.clone(),
                options: self.options.clone(),
            }
            .run()
            .instrument(span.clone()),
        );
        let mut egress = tokio::spawn(
            Egress {
                realtime: realtime_stream,
                telephony: telephony_sink,
                session: session.clone(),
                log: log.clone(),
                cancel: cancel.clone(),
                options: self.options.clone(),
            }
            .run()
            .instrument(span),
        );
        info!("Relay active");

        let mut ingest_done = None;
        let mut egress_done = None;
        let ended_by = tokio::select! {
            res = &mut ingest => {
                ingest_done = Some(res);
                Side::Telephony
            }
            res = &mut egress => {
                egress_done = Some(res);
                Side::Realtime
            }
        };
        session.transition(CallState::Closing);
        info!(?ended_by, "Relay direction ended, tearing down call");
        cancel.cancel();

        let ingest_res = match ingest_done {
            Some(res) => res,
            None => ingest.await,
        };
        let egress_res = match egress_done {
            Some(res) => res,
            None => egress.await,
        };

        let ingest_report = ingest_res.unwrap_or_else(|e| {
            error!(error = %e, "Telephony ingest task panicked");
            IngestReport {
                end: TaskEnd::Failed(e.to_string()),
                forwarded: 0,
            }
        });
        let egress_report = match egress_res {
            Ok((report, mut sink)) => {
                close_quietly(&mut sink, "telephony").await;
                report
            }
            Err(e) => {
                error!(error = %e, "AI egress task panicked");
                EgressReport {
                    end: TaskEnd::Failed(e.to_string()),
                    forwarded: 0,
                    dropped_early: 0,
                }
            }
        };

        session.transition(CallState::Closed);
        if let Err(e) = log.close().await {
            warn!(error = %e, "Failed to close call logs");
        }

        let summary = CallSummary {
            call_id: session.call_id().clone(),
            stream_sid: session.stream_sid(),
            ended_by,
            telephony_end: ingest_report.end,
            realtime_end: egress_report.end,
            frames_to_realtime: ingest_report.forwarded,
            frames_to_telephony: egress_report.forwarded,
            dropped_early_audio: egress_report.dropped_early,
        };
        info!(
            ended_by = ?summary.ended_by,
            to_realtime = summary.frames_to_realtime,
            to_telephony = summary.frames_to_telephony,
            "Call closed"
        );
        Ok(summary)
    }
}

async fn close_quietly(sink: &mut TextSink, peer: &'static str) {
    if let Err(e) = sink.close().await {
        info!(peer, error = %e, "Connection was already closed");
    }
}
