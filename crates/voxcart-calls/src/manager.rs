//! Call session manager.
//!
//! One task per call consumes that call's speech events in order, so the
//! transcripts of a call are classified and routed sequentially. A single
//! dispatcher task consumes orchestrator events for all calls and turns
//! them into context updates on the owning call's speech session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use voxcart_agents::{
    AgentOrchestrator, AgentState, AgentType, IntentDetector, OrchestratorEvent,
};
use voxcart_core::config::SpeechConfig;
use voxcart_core::events::CallEvent;
use voxcart_core::types::{CallId, CallStatus, Role, Timestamp};
use voxcart_speech::{RealtimeTransport, SessionEvent, SpeechSession};
use voxcart_storage::CallRepository;

use crate::error::CallError;
use crate::routing::{route_transcript, Route, AGENT_ERROR_CONTEXT, CANCELLED_CONTEXT};

const EVENT_CAPACITY: usize = 256;

/// Instructions for the telephony leg of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyOutput {
    /// Assistant audio to play to the caller.
    Audio(Vec<u8>),
    /// Drop audio queued for playback (barge-in).
    ClearBuffer,
    Hangup,
}

/// Summary of a live call.
#[derive(Debug, Clone, Serialize)]
pub struct CallInfo {
    pub call_id: CallId,
    pub started_at: Timestamp,
    pub duration_secs: u64,
    pub agent_type: Option<AgentType>,
    pub agent_state: Option<AgentState>,
}

struct CallHandle {
    session: Arc<SpeechSession>,
    outbound: mpsc::UnboundedSender<TelephonyOutput>,
    started: Instant,
    started_at: Timestamp,
    task: JoinHandle<()>,
}

pub struct CallSessionManager {
    orchestrator: Arc<AgentOrchestrator>,
    detector: IntentDetector,
    transport: Arc<dyn RealtimeTransport>,
    speech_config: SpeechConfig,
    calls_repo: Option<CallRepository>,
    calls: Mutex<HashMap<CallId, CallHandle>>,
    events: broadcast::Sender<CallEvent>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl CallSessionManager {
    /// Create the manager and start the orchestrator event dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        orchestrator: Arc<AgentOrchestrator>,
        transport: Arc<dyn RealtimeTransport>,
        speech_config: SpeechConfig,
        calls_repo: Option<CallRepository>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let agent_events = orchestrator.subscribe();
        let manager = Arc::new(Self {
            orchestrator,
            detector: IntentDetector::new(),
            transport,
            speech_config,
            calls_repo,
            calls: Mutex::new(HashMap::new()),
            events,
            dispatcher: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        });

        let dispatcher = tokio::spawn(dispatch_agent_events(
            Arc::downgrade(&manager),
            agent_events,
        ));
        *manager
            .dispatcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(dispatcher);
        manager
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallId, CallHandle>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Domain events for every call.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: CallEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn orchestrator(&self) -> &Arc<AgentOrchestrator> {
        &self.orchestrator
    }

    /// Open a speech session for a newly connected telephony leg.
    pub async fn start_call(
        self: &Arc<Self>,
        call_id: CallId,
        outbound: mpsc::UnboundedSender<TelephonyOutput>,
    ) -> Result<(), CallError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(CallError::ShuttingDown);
        }
        if self.lock().contains_key(&call_id) {
            return Err(CallError::DuplicateCall(call_id));
        }

        let (session, speech_events) = SpeechSession::start(
            call_id.clone(),
            self.speech_config.clone(),
            Arc::clone(&self.transport),
        )
        .await?;

        if let Some(repo) = &self.calls_repo {
            if let Err(e) = repo.create(&call_id) {
                tracing::warn!(call_id = %call_id, error = %e, "Failed to persist call record");
            }
        }

        {
            let mut calls = self.lock();
            if calls.contains_key(&call_id) {
                session.stop();
                return Err(CallError::DuplicateCall(call_id));
            }
            let task = tokio::spawn(run_call(
                Arc::downgrade(self),
                call_id.clone(),
                Arc::clone(&session),
                speech_events,
                outbound.clone(),
            ));
            calls.insert(
                call_id.clone(),
                CallHandle {
                    session,
                    outbound,
                    started: Instant::now(),
                    started_at: Timestamp::now(),
                    task,
                },
            );
        }

        tracing::info!(call_id = %call_id, "Call started");
        self.publish(CallEvent::CallStarted {
            call_id,
            timestamp: Timestamp::now(),
        });
        Ok(())
    }

    /// Forward one chunk of caller audio.
    pub fn handle_audio(&self, call_id: &CallId, chunk: &[u8]) -> Result<(), CallError> {
        let session = self
            .lock()
            .get(call_id)
            .map(|handle| Arc::clone(&handle.session))
            .ok_or_else(|| CallError::UnknownCall(call_id.clone()))?;
        session.send_audio(chunk);
        Ok(())
    }

    /// Tear down a call after the telephony leg disconnected.
    pub fn end_call(&self, call_id: &CallId) -> Result<(), CallError> {
        if self.finish_call(call_id, CallStatus::Completed) {
            Ok(())
        } else {
            Err(CallError::UnknownCall(call_id.clone()))
        }
    }

    fn finish_call(&self, call_id: &CallId, status: CallStatus) -> bool {
        let Some(handle) = self.lock().remove(call_id) else {
            return false;
        };

        self.orchestrator.cancel_agent(call_id);
        handle.session.stop();
        handle.task.abort();

        if let Some(repo) = &self.calls_repo {
            if let Err(e) = repo.update_status(call_id, status) {
                tracing::warn!(call_id = %call_id, error = %e, "Failed to persist call status");
            }
        }

        let duration_secs = handle.started.elapsed().as_secs();
        tracing::info!(call_id = %call_id, duration_secs, status = %status, "Call ended");
        self.publish(CallEvent::CallEnded {
            call_id: call_id.clone(),
            duration_secs,
            timestamp: Timestamp::now(),
        });
        true
    }

    /// Live calls ordered by call id.
    pub fn active_calls(&self) -> Vec<CallInfo> {
        let mut calls: Vec<CallInfo> = self
            .lock()
            .iter()
            .map(|(call_id, handle)| {
                let agent = self.orchestrator.get_agent(call_id);
                CallInfo {
                    call_id: call_id.clone(),
                    started_at: handle.started_at,
                    duration_secs: handle.started.elapsed().as_secs(),
                    agent_type: agent.as_ref().map(|a| a.agent_type()),
                    agent_state: agent.as_ref().map(|a| a.state()),
                }
            })
            .collect();
        calls.sort_by(|a, b| a.call_id.cmp(&b.call_id));
        calls
    }

    pub fn is_active(&self, call_id: &CallId) -> bool {
        self.lock().contains_key(call_id)
    }

    /// Hang up every call and stop accepting new ones. Returns how many
    /// calls were ended.
    pub fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::SeqCst);
        let call_ids: Vec<CallId> = self.lock().keys().cloned().collect();
        let mut ended = 0;
        for call_id in &call_ids {
            if let Some(handle) = self.lock().get(call_id) {
                let _ = handle.outbound.send(TelephonyOutput::Hangup);
            }
            if self.finish_call(call_id, CallStatus::Completed) {
                ended += 1;
            }
        }
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.abort();
        }
        tracing::info!(calls = ended, "Call manager shut down");
        ended
    }

    fn session(&self, call_id: &CallId) -> Option<Arc<SpeechSession>> {
        self.lock()
            .get(call_id)
            .map(|handle| Arc::clone(&handle.session))
    }

    fn record_turn(&self, call_id: &CallId, role: Role, text: &str) {
        if let Some(repo) = &self.calls_repo {
            if let Err(e) = repo.record_turn(call_id) {
                tracing::warn!(call_id = %call_id, error = %e, "Failed to record turn");
            }
        }
        self.publish(CallEvent::TranscriptReceived {
            call_id: call_id.clone(),
            role,
            text_length: text.chars().count(),
            timestamp: Timestamp::now(),
        });
    }

    /// Classify a final caller utterance and act on it.
    fn handle_transcript(&self, call_id: &CallId, session: &SpeechSession, text: &str) {
        let context = session.context();
        let result = self.detector.detect(text, &context);
        tracing::info!(
            call_id = %call_id,
            intent = %result.intent,
            confidence = result.confidence,
            entities = result.entities.len(),
            "Intent detected"
        );
        self.publish(CallEvent::IntentDetected {
            call_id: call_id.clone(),
            intent: result.intent.to_string(),
            confidence: f64::from(result.confidence),
            timestamp: Timestamp::now(),
        });

        let waiting = self
            .orchestrator
            .get_agent(call_id)
            .filter(|agent| agent.state() == AgentState::WaitingForInfo)
            .and_then(|agent| agent.pending_field().map(|f| (agent.agent_type(), f)));
        let waiting_ref = waiting.as_ref().map(|(t, f)| (*t, f.as_str()));

        match route_transcript(result, waiting_ref, text) {
            Route::Cancel => {
                if self.orchestrator.cancel_agent(call_id) {
                    session.update_context(CANCELLED_CONTEXT);
                }
            }
            Route::Launch(agent_type, data) => {
                match self.orchestrator.launch_agent(call_id, agent_type, data) {
                    Ok(_) => self.publish(CallEvent::AgentLaunched {
                        call_id: call_id.clone(),
                        agent_type: agent_type.name().to_string(),
                        timestamp: Timestamp::now(),
                    }),
                    Err(e) => {
                        tracing::error!(call_id = %call_id, agent_type = %agent_type, error = %e, "Agent launch failed");
                        session.update_context(AGENT_ERROR_CONTEXT);
                    }
                }
            }
            Route::Update(data) => {
                tracing::debug!(call_id = %call_id, fields = data.len(), "Feeding waiting agent");
                self.orchestrator.update_agent(call_id, data);
            }
            Route::Converse => {}
        }
    }

    /// Surface an orchestrator event on the owning call's speech session.
    fn handle_agent_event(&self, event: OrchestratorEvent) {
        let call_id = event.call_id().clone();
        let agent_type = event.agent_type();
        let Some(session) = self.session(&call_id) else {
            tracing::debug!(call_id = %call_id, event = event.event_name(), "Agent event for ended call");
            return;
        };

        let finished = |outcome: &str, success: bool| CallEvent::AgentFinished {
            call_id: call_id.clone(),
            agent_type: agent_type.name().to_string(),
            outcome: outcome.to_string(),
            success,
            timestamp: Timestamp::now(),
        };

        match event {
            OrchestratorEvent::AgentNeedsInfo { field, prompt, .. } => {
                tracing::debug!(call_id = %call_id, field = %field, "Agent needs info");
                session.update_context(&prompt);
            }
            OrchestratorEvent::AgentCompleted { result, .. } => {
                session.update_context(&result.context_update);
                self.publish(finished("completed", result.success));
            }
            OrchestratorEvent::AgentError { error, .. } => {
                tracing::warn!(call_id = %call_id, agent_type = %agent_type, error = %error, "Agent error");
                session.update_context(AGENT_ERROR_CONTEXT);
                self.publish(finished("error", false));
            }
            OrchestratorEvent::AgentCancelled { .. } => {
                self.publish(finished("cancelled", false));
            }
        }
    }
}

async fn dispatch_agent_events(
    manager: Weak<CallSessionManager>,
    mut events: broadcast::Receiver<OrchestratorEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                manager.handle_agent_event(event);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Agent event dispatcher lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Per-call loop over speech events.
async fn run_call(
    manager: Weak<CallSessionManager>,
    call_id: CallId,
    session: Arc<SpeechSession>,
    mut speech_events: mpsc::UnboundedReceiver<SessionEvent>,
    outbound: mpsc::UnboundedSender<TelephonyOutput>,
) {
    // Assistant audio sent since the caller last spoke, and whether a
    // response is still being generated.
    let mut audio_in_flight = false;
    let mut responding = false;

    while let Some(event) = speech_events.recv().await {
        let Some(manager) = manager.upgrade() else {
            return;
        };
        match event {
            SessionEvent::SpeechStarted => {
                if responding {
                    session.interrupt();
                    responding = false;
                }
                if audio_in_flight {
                    tracing::debug!(call_id = %call_id, "Barge-in, clearing playback");
                    let _ = outbound.send(TelephonyOutput::ClearBuffer);
                    audio_in_flight = false;
                }
            }
            SessionEvent::Audio(bytes) => {
                audio_in_flight = true;
                responding = true;
                let _ = outbound.send(TelephonyOutput::Audio(bytes));
            }
            SessionEvent::AssistantTranscriptDelta(_) => responding = true,
            SessionEvent::ResponseDone => responding = false,
            SessionEvent::UserTranscript(text) => {
                manager.record_turn(&call_id, Role::User, &text);
                manager.handle_transcript(&call_id, &session, &text);
            }
            SessionEvent::AssistantTranscript(text) => {
                manager.record_turn(&call_id, Role::Assistant, &text);
            }
            SessionEvent::Error(message) => {
                tracing::warn!(call_id = %call_id, error = %message, "Speech session error");
            }
            SessionEvent::Reconnected { attempt } => {
                manager.publish(CallEvent::SpeechReconnected {
                    call_id: call_id.clone(),
                    attempt,
                    timestamp: Timestamp::now(),
                });
            }
            SessionEvent::Fatal(reason) => {
                tracing::error!(call_id = %call_id, reason = %reason, "Speech session lost, ending call");
                manager.publish(CallEvent::SpeechFailed {
                    call_id: call_id.clone(),
                    reason,
                    timestamp: Timestamp::now(),
                });
                let _ = outbound.send(TelephonyOutput::Hangup);
                manager.finish_call(&call_id, CallStatus::Failed);
                return;
            }
            SessionEvent::SpeechStopped => {}
        }
    }
}
