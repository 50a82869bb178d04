//! Handles the real-time WebSocket connection to OpenAI.

use crate::config::Config;
use async_trait::async_trait;
use callrelay_core::{Connection, RealtimeConnector, RelayError};
use futures_util::{SinkExt, StreamExt, TryStreamExt, future};
use std::fmt;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        handshake::client::Request,
        http::HeaderValue,
        protocol::Message as WsMessage,
    },
};
use tracing::{info, instrument};

/// Opens one realtime WebSocket per call.
#[derive(Clone)]
pub struct OpenAiConnector {
    url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for OpenAiConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConnector")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiConnector {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.realtime_url.clone(),
            config.realtime_model.clone(),
            config.openai_api_key.clone(),
        )
    }

    /// The endpoint with the model selected through the query string.
    pub fn endpoint(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, separator, self.model)
    }

    /// Builds the upgrade request with the bearer token and beta header.
    pub fn build_request(&self) -> Result<Request, RelayError> {
        let mut request = self
            .endpoint()
            .into_client_request()
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| RelayError::Connect(format!("invalid API key: {}", e)))?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }
}

#[async_trait]
impl RealtimeConnector for OpenAiConnector {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn connect(&self) -> Result<Connection, RelayError> {
        let request = self.build_request()?;
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        info!("Connected to OpenAI Realtime API.");

        let (sink, stream) = ws_stream.split();
        let sink = sink
            .sink_map_err(|e| RelayError::Realtime(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, RelayError>(WsMessage::Text(text.into()))));
        let stream = stream
            .map_err(|e| RelayError::Realtime(e.to_string()))
            .try_take_while(|msg| future::ready(Ok(!msg.is_close())))
            .try_filter_map(|msg| {
                future::ready(Ok(match msg {
                    WsMessage::Text(text) => Some(text.as_str().to_owned()),
                    _ => None,
                }))
            });
        Ok(Connection::new(sink, stream))
    }
}
