//! Tuning knobs of the relay.

use std::time::Duration;

/// What the AI egress task does with assistant audio that arrives before the
/// telephony stream id is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyAudioPolicy {
    /// Hold frames until the stream id is known, then send them in order.
    /// When more than `max_frames` are waiting, the oldest is dropped.
    Buffer { max_frames: usize },
    /// Drop each early frame with a warning.
    Drop,
}

impl Default for EarlyAudioPolicy {
    fn default() -> Self {
        EarlyAudioPolicy::Buffer { max_frames: 500 }
    }
}

/// Per-call relay options.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Capacity of the bounded channel between the reader and the forwarder
    /// of each direction.
    pub channel_capacity: usize,
    /// Ends a direction when its connection stays silent for this long.
    /// `None` waits forever.
    pub max_idle: Option<Duration>,
    pub early_audio: EarlyAudioPolicy,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            max_idle: None,
            early_audio: EarlyAudioPolicy::default(),
        }
    }
}
