//! Sends the one-time `session.update` that configures the AI connection.

use crate::{
    connection::TextSink,
    error::RelayError,
    protocol::{ClientEvent, SessionConfig},
};
use futures::SinkExt;
use tracing::{info, instrument};

/// Sends exactly one `session.update` built from `config`.
///
/// Must run before any audio is forwarded. Any failure is fatal to the call.
#[instrument(skip_all, fields(voice = %config.voice))]
pub async fn configure_session(
    sink: &mut TextSink,
    config: &SessionConfig,
) -> Result<(), RelayError> {
    let event = ClientEvent::SessionUpdate {
        session: config.clone(),
    };
    let text =
        serde_json::to_string(&event).map_err(|e| RelayError::Configure(e.to_string()))?;
    sink.send(text)
        .await
        .map_err(|e| RelayError::Configure(e.to_string()))?;
    info!("Sent session configuration");
    Ok(())
}
