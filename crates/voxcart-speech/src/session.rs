//! One speech-to-speech session per call.
//!
//! The session owns the vendor connection. A pump task decodes vendor events
//! into [`SessionEvent`]s for the call manager, keeps the conversation log,
//! and re-establishes a dropped connection within a fixed retry budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxcart_core::config::SpeechConfig;
use voxcart_core::types::{CallId, ConversationEntry, Role};

use crate::conversation::ConversationLog;
use crate::error::SpeechError;
use crate::prompt::session_config;
use crate::protocol::{ClientEvent, ConversationItem, ServerEvent};
use crate::transport::RealtimeTransport;

/// What the session reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The caller started talking.
    SpeechStarted,
    SpeechStopped,
    /// Final transcript of one caller utterance.
    UserTranscript(String),
    AssistantTranscriptDelta(String),
    /// Final transcript of one assistant response.
    AssistantTranscript(String),
    /// Decoded assistant audio, ready for the telephony leg.
    Audio(Vec<u8>),
    ResponseDone,
    /// Vendor-reported or connection error. The session carries on.
    Error(String),
    Reconnected { attempt: u32 },
    /// The reconnect budget is spent. No further events follow.
    Fatal(String),
}

struct SessionInner {
    outbound: Option<mpsc::UnboundedSender<ClientEvent>>,
    log: ConversationLog,
    pump: Option<JoinHandle<()>>,
}

pub struct SpeechSession {
    call_id: CallId,
    config: SpeechConfig,
    transport: Arc<dyn RealtimeTransport>,
    inner: Mutex<SessionInner>,
    stopped: AtomicBool,
}

impl SpeechSession {
    /// Connect, configure the vendor session, and start pumping events.
    ///
    /// Fails if the first connection attempt fails; the retry budget only
    /// covers connections lost mid-call.
    pub async fn start(
        call_id: CallId,
        config: SpeechConfig,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>), SpeechError> {
        let conn = transport.connect().await?;
        let session_update = ClientEvent::SessionUpdate {
            session: session_config(&config),
        };
        conn.outbound
            .send(session_update)
            .map_err(|_| SpeechError::Connect("connection closed during setup".to_string()))?;

        let session = Arc::new(Self {
            call_id,
            config,
            transport,
            inner: Mutex::new(SessionInner {
                outbound: Some(conn.outbound),
                log: ConversationLog::new(),
                pump: None,
            }),
            stopped: AtomicBool::new(false),
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(Arc::clone(&session).pump(conn.inbound, events_tx));
        session.lock().pump = Some(pump);

        tracing::info!(call_id = %session.call_id, "Speech session started");
        Ok((session, events_rx))
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn is_connected(&self) -> bool {
        self.lock().outbound.is_some()
    }

    /// Snapshot of the conversation so far.
    pub fn context(&self) -> Vec<ConversationEntry> {
        self.lock().log.snapshot()
    }

    fn send(&self, event: ClientEvent) -> bool {
        let inner = self.lock();
        match inner.outbound.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Forward one chunk of caller audio. Dropped with a warning when the
    /// session is not connected.
    pub fn send_audio(&self, chunk: &[u8]) {
        let audio = STANDARD.encode(chunk);
        if !self.send(ClientEvent::InputAudioBufferAppend { audio }) {
            tracing::warn!(call_id = %self.call_id, bytes = chunk.len(), "Speech session not connected, audio dropped");
        }
    }

    /// Inject `text` as a system message and ask the model to respond to it.
    pub fn update_context(&self, text: &str) {
        self.lock().log.push(Role::System, text);
        let item = ClientEvent::ConversationItemCreate {
            item: ConversationItem::system_text(text),
        };
        if !self.send(item) || !self.send(ClientEvent::ResponseCreate) {
            tracing::warn!(call_id = %self.call_id, "Speech session not connected, context update dropped");
            return;
        }
        tracing::debug!(call_id = %self.call_id, chars = text.len(), "Context update sent");
    }

    /// Cancel the response currently being spoken.
    pub fn interrupt(&self) {
        if self.send(ClientEvent::ResponseCancel) {
            tracing::debug!(call_id = %self.call_id, "Response interrupted");
        }
    }

    /// Close the connection and stop the pump. Safe to call more than once.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let pump = {
            let mut inner = self.lock();
            inner.outbound = None;
            inner.pump.take()
        };
        if let Some(pump) = pump {
            pump.abort();
        }
        tracing::info!(call_id = %self.call_id, "Speech session stopped");
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn pump(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<ServerEvent>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        loop {
            while let Some(event) = inbound.recv().await {
                if let Some(out) = self.dispatch(event) {
                    let _ = events.send(out);
                }
            }
            if self.is_stopped() {
                return;
            }
            match self.reconnect(&events).await {
                Some(next) => inbound = next,
                None => return,
            }
        }
    }

    fn dispatch(&self, event: ServerEvent) -> Option<SessionEvent> {
        match event {
            ServerEvent::SessionCreated { .. } => {
                tracing::debug!(call_id = %self.call_id, "Vendor session created");
                None
            }
            ServerEvent::SessionUpdated { .. } => {
                tracing::debug!(call_id = %self.call_id, "Vendor session configured");
                None
            }
            ServerEvent::SpeechStarted { .. } => Some(SessionEvent::SpeechStarted),
            ServerEvent::SpeechStopped { .. } => Some(SessionEvent::SpeechStopped),
            ServerEvent::InputAudioCommitted { item_id } => {
                tracing::trace!(call_id = %self.call_id, item_id = %item_id, "Input audio committed");
                None
            }
            ServerEvent::InputTranscriptionCompleted { transcript, .. } => {
                let text = transcript.trim();
                if text.is_empty() {
                    return None;
                }
                self.lock().log.push(Role::User, text);
                tracing::info!(call_id = %self.call_id, transcript = %text, "User transcript");
                Some(SessionEvent::UserTranscript(text.to_string()))
            }
            ServerEvent::AudioTranscriptDelta { delta, .. } => {
                Some(SessionEvent::AssistantTranscriptDelta(delta))
            }
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                self.lock().log.push(Role::Assistant, transcript.as_str());
                tracing::info!(call_id = %self.call_id, transcript = %transcript, "Assistant transcript");
                Some(SessionEvent::AssistantTranscript(transcript))
            }
            ServerEvent::AudioDelta { delta, .. } => match STANDARD.decode(delta.as_bytes()) {
                Ok(bytes) => Some(SessionEvent::Audio(bytes)),
                Err(e) => {
                    tracing::warn!(call_id = %self.call_id, error = %e, "Undecodable audio delta");
                    None
                }
            },
            ServerEvent::ResponseDone { .. } => Some(SessionEvent::ResponseDone),
            ServerEvent::ConversationItemCreated { .. } => None,
            ServerEvent::Error { error } => {
                tracing::warn!(
                    call_id = %self.call_id,
                    kind = %error.kind,
                    code = ?error.code,
                    "Vendor error: {}",
                    error.message
                );
                Some(SessionEvent::Error(error.message))
            }
            ServerEvent::Unknown => None,
        }
    }

    /// Re-establish the connection with linear backoff. Returns the new
    /// inbound stream, or `None` once stopped or out of attempts.
    async fn reconnect(
        &self,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Option<mpsc::UnboundedReceiver<ServerEvent>> {
        self.lock().outbound = None;
        let max_attempts = self.config.max_reconnect_attempts;
        tracing::warn!(call_id = %self.call_id, max_attempts, "Speech connection lost");

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.config.reconnect_backoff() * attempt).await;
            if self.is_stopped() {
                return None;
            }

            let conn = match self.transport.connect().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(call_id = %self.call_id, attempt, error = %e, "Reconnect failed");
                    let _ = events.send(SessionEvent::Error(e.to_string()));
                    continue;
                }
            };

            let session_update = ClientEvent::SessionUpdate {
                session: session_config(&self.config),
            };
            if conn.outbound.send(session_update).is_err() {
                continue;
            }
            {
                let mut inner = self.lock();
                if self.is_stopped() {
                    return None;
                }
                inner.outbound = Some(conn.outbound);
            }
            tracing::info!(call_id = %self.call_id, attempt, "Speech connection re-established");
            let _ = events.send(SessionEvent::Reconnected { attempt });
            return Some(conn.inbound);
        }

        let reason = format!(
            "Speech vendor unreachable after {} reconnect attempts",
            max_attempts
        );
        tracing::error!(call_id = %self.call_id, "{}", reason);
        let _ = events.send(SessionEvent::Fatal(reason));
        None
    }
}
