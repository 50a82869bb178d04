//! Manages the telephony media-stream WebSocket of a call.

use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use callrelay_core::{Connection, RelayError};
use futures_util::{SinkExt, StreamExt, TryStreamExt, future};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

#[instrument(name = "media_stream", skip_all)]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("Telephony media stream connected");
    match state.relay.run_call(telephony_connection(socket)).await {
        Ok(summary) => info!(
            call_id = %summary.call_id,
            stream_sid = ?summary.stream_sid,
            ended_by = ?summary.ended_by,
            dropped_early_audio = summary.dropped_early_audio,
            "Call finished"
        ),
        Err(e) => error!(error = %e, "Call could not be relayed"),
    }
}

/// Adapts the telephony socket to the relay's text-frame connection.
///
/// Only text frames are relayed. A close frame ends the inbound stream.
pub fn telephony_connection(socket: WebSocket) -> Connection {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e| RelayError::Telephony(e.to_string()))
        .with(|text: String| future::ready(Ok::<_, RelayError>(Message::Text(text.into()))));
    let stream = stream
        .map_err(|e| RelayError::Telephony(e.to_string()))
        .try_take_while(|msg| future::ready(Ok(!matches!(msg, Message::Close(_)))))
        .try_filter_map(|msg| {
            future::ready(Ok(match msg {
                Message::Text(text) => Some(text.as_str().to_owned()),
                _ => None,
            }))
        });
    Connection::new(sink, stream)
}
