//! In-memory stand-ins for the telephony connection, the realtime service and
//! the call logs.

#![allow(dead_code)]

use async_trait::async_trait;
use callrelay_core::{
    CallId, CallLog, CallLogFactory, Connection, RealtimeConnector, RelayError,
    log_sink::AudioDirection,
};
use futures::{
    SinkExt, StreamExt,
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// The remote end of a [`Connection`] handed to the relay.
pub struct Peer {
    inbound: Option<UnboundedSender<Result<String, RelayError>>>,
    outbound: UnboundedReceiver<String>,
}

impl Peer {
    /// Delivers a JSON frame to the relay.
    pub fn send(&self, value: Value) {
        self.send_text(value.to_string());
    }

    pub fn send_text(&self, text: impl Into<String>) {
        self.inbound
            .as_ref()
            .expect("peer already disconnected")
            .unbounded_send(Ok(text.into()))
            .expect("relay stopped reading");
    }

    /// Closes the peer's side of the connection.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Everything the relay wrote to this peer. Only returns once the relay
    /// has closed or dropped its sink.
    pub async fn received(self) -> Vec<Value> {
        let Peer { outbound, .. } = self;
        outbound
            .map(|text| serde_json::from_str(&text).expect("relay wrote invalid JSON"))
            .collect()
            .await
    }
}

pub fn connection_pair() -> (Connection, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded::<Result<String, RelayError>>();
    let (out_tx, out_rx) = mpsc::unbounded::<String>();
    let sink = out_tx.sink_map_err(|e| RelayError::Telephony(e.to_string()));
    (
        Connection::new(sink, in_rx),
        Peer {
            inbound: Some(in_tx),
            outbound: out_rx,
        },
    )
}

/// Hands out a prepared connection once, or refuses to connect.
pub struct FakeConnector {
    conn: Mutex<Option<Connection>>,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new(conn: Connection) -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(Some(conn)),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeConnector for FakeConnector {
    async fn connect(&self) -> Result<Connection, RelayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.conn
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RelayError::Connect("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingLog {
    audio: Mutex<Vec<(AudioDirection, String)>>,
    text: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl RecordingLog {
    pub fn audio(&self) -> Vec<(AudioDirection, String)> {
        self.audio.lock().unwrap().clone()
    }

    pub fn text(&self) -> Vec<String> {
        self.text.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallLog for RecordingLog {
    async fn record_audio(
        &self,
        direction: AudioDirection,
        payload: &str,
    ) -> Result<(), RelayError> {
        self.audio
            .lock()
            .unwrap()
            .push((direction, payload.to_string()));
        Ok(())
    }

    async fn record_text(&self, text: &str) -> Result<(), RelayError> {
        self.text.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLogs {
    opened: Mutex<Vec<(CallId, Arc<RecordingLog>)>>,
}

impl RecordingLogs {
    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    /// The log of the only call opened so far.
    pub fn single(&self) -> Arc<RecordingLog> {
        let opened = self.opened.lock().unwrap();
        assert_eq!(opened.len(), 1, "expected exactly one call log");
        opened[0].1.clone()
    }
}

#[async_trait]
impl CallLogFactory for RecordingLogs {
    async fn open(&self, call_id: &CallId) -> Result<Arc<dyn CallLog>, RelayError> {
        let log = Arc::new(RecordingLog::default());
        self.opened
            .lock()
            .unwrap()
            .push((call_id.clone(), log.clone()));
        Ok(log)
    }
}

pub fn start(sid: &str) -> Value {
    serde_json::json!({"event": "start", "start": {"streamSid": sid}})
}

pub fn media(payload: &str) -> Value {
    serde_json::json!({"event": "media", "media": {"payload": payload}})
}

pub fn stop() -> Value {
    serde_json::json!({"event": "stop"})
}

pub fn audio_delta(payload: &str) -> Value {
    serde_json::json!({"type": "response.audio.delta", "delta": payload})
}
