//! OpenAI Realtime API message types.
//!
//! Client events (sent to the service):
//! - `session.update` - one-time session configuration
//! - `input_audio_buffer.append` - caller audio
//!
//! Server events are discriminated by `type`. The relay acts on audio deltas
//! and text responses; a fixed set of lifecycle events is only logged.

use serde::{Deserialize, Serialize};

/// Audio encodings understood by the realtime service.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

/// Turn detection mode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        silence_duration_ms: Option<u32>,
    },
}

impl Default for TurnDetection {
    fn default() -> Self {
        TurnDetection::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

/// The `session` object of a `session.update` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub turn_detection: TurnDetection,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    pub voice: String,
    pub instructions: String,
    pub modalities: Vec<String>,
    pub temperature: f32,
}

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful and friendly voice assistant answering a phone call. \
Keep your answers short and conversational.";

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_detection: TurnDetection::default(),
            input_audio_format: AudioFormat::G711Ulaw,
            output_audio_format: AudioFormat::G711Ulaw,
            voice: "alloy".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            modalities: vec!["text".to_string(), "audio".to_string()],
            temperature: 0.8,
        }
    }
}

/// Events sent to the realtime service.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

/// Error details carried by a server `error` event.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ServerError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Events received from the realtime service.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A chunk of assistant audio, base64 encoded.
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta {
        #[serde(alias = "data", default)]
        delta: String,
    },
    /// A text response.
    #[serde(rename = "response.text", alias = "response.text.done")]
    ResponseText {
        #[serde(default)]
        text: String,
    },
    /// The full transcript of a spoken response.
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ServerError,
    },
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated,
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted,
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "response.content.done")]
    ResponseContentDone,
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// The wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::ResponseAudioDelta { .. } => "response.audio.delta",
            ServerEvent::ResponseText { .. } => "response.text",
            ServerEvent::AudioTranscriptDone { .. } => "response.audio_transcript.done",
            ServerEvent::Error { .. } => "error",
            ServerEvent::SessionCreated => "session.created",
            ServerEvent::SessionUpdated => "session.updated",
            ServerEvent::RateLimitsUpdated => "rate_limits.updated",
            ServerEvent::InputAudioBufferCommitted => "input_audio_buffer.committed",
            ServerEvent::SpeechStarted => "input_audio_buffer.speech_started",
            ServerEvent::SpeechStopped => "input_audio_buffer.speech_stopped",
            ServerEvent::ResponseDone => "response.done",
            ServerEvent::ResponseContentDone => "response.content.done",
            ServerEvent::Other => "other",
        }
    }

    /// Whether the event is only of diagnostic interest.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            ServerEvent::SessionCreated
                | ServerEvent::SessionUpdated
                | ServerEvent::RateLimitsUpdated
                | ServerEvent::InputAudioBufferCommitted
                | ServerEvent::SpeechStarted
                | ServerEvent::SpeechStopped
                | ServerEvent::ResponseDone
                | ServerEvent::ResponseContentDone
        )
    }
}
