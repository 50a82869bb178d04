//! Twilio Media Streams message types.
//!
//! Inbound frames carry an `event` discriminator. Only `start`, `media` and
//! `stop` drive the relay; everything else is parsed as [`TelephonyEvent::Other`].

use serde::{Deserialize, Serialize};

/// An event received from the telephony media stream.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// The media stream has started and now has a stream id.
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        start: StreamStart,
    },
    /// A chunk of caller audio.
    Media { media: MediaChunk },
    /// The media stream has ended.
    Stop,
    /// `connected`, `mark`, `dtmf` and any future event kinds.
    #[serde(other)]
    Other,
}

impl TelephonyEvent {
    /// The stream id carried by a `start` event.
    ///
    /// The nested `start.streamSid` wins over the top-level field.
    pub fn stream_sid(&self) -> Option<&str> {
        match self {
            TelephonyEvent::Start { stream_sid, start } => {
                start.stream_sid.as_deref().or(stream_sid.as_deref())
            }
            _ => None,
        }
    }
}

/// Metadata of a `start` event.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    #[serde(default)]
    pub stream_sid: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
}

/// Audio carried by a `media` event.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MediaChunk {
    /// Base64 encoded audio.
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A media frame sent back to the telephony provider.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutboundMedia {
    event: &'static str,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    pub media: OutboundPayload,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutboundPayload {
    pub payload: String,
}

impl OutboundMedia {
    pub fn new(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event: "media",
            stream_sid: stream_sid.into(),
            media: OutboundPayload {
                payload: payload.into(),
            },
        }
    }
}
