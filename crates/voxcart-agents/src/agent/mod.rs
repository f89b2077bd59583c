//! Generic agent engine.
//!
//! An [`Agent`] owns the lifecycle of one task for one call: it collects
//! required fields, runs its descriptor's `execute` under a timeout, and
//! reports progress on an unbounded event channel. Per-type behavior lives
//! in the [`AgentHandler`](crate::handler::AgentHandler) descriptors.

pub mod context;
pub mod state_machine;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voxcart_core::types::CallId;

use crate::error::AgentError;
use crate::handler::AgentHandler;
use crate::types::{AgentEvent, AgentOutcome, AgentResult, AgentState, AgentType, FieldMap};

pub use context::{AgentContext, AgentDeps, AgentPolicy};
pub use state_machine::validate_transition;

struct AgentInner {
    state: AgentState,
    data: FieldMap,
    result: Option<AgentResult>,
    pending_field: Option<String>,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
    timer: Option<JoinHandle<()>>,
}

impl AgentInner {
    /// Move to `to` if the lifecycle allows it.
    fn transition(&mut self, to: AgentState) -> Result<(), AgentError> {
        validate_transition(self.state, to)?;
        self.state = to;
        if to != AgentState::WaitingForInfo {
            self.pending_field = None;
        }
        Ok(())
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means the owner stopped listening.
            let _ = tx.send(event);
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// One agent instance bound to a call.
pub struct Agent {
    call_id: CallId,
    handler: Arc<dyn AgentHandler>,
    deps: AgentDeps,
    timeout: Duration,
    inner: Mutex<AgentInner>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("call_id", &self.call_id)
            .field("agent_type", &self.agent_type())
            .field("state", &self.state())
            .finish()
    }
}

impl Agent {
    /// Create an agent in `Initializing` with the given seed data.
    ///
    /// The returned receiver yields the agent's events until it reaches a
    /// terminal state.
    pub fn new(
        call_id: CallId,
        handler: Arc<dyn AgentHandler>,
        data: FieldMap,
        deps: AgentDeps,
        timeout: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Arc::new(Self {
            call_id,
            handler,
            deps,
            timeout,
            inner: Mutex::new(AgentInner {
                state: AgentState::Initializing,
                data,
                result: None,
                pending_field: None,
                events: Some(tx),
                timer: None,
            }),
        });
        (agent, rx)
    }

    fn lock(&self) -> MutexGuard<'_, AgentInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn agent_type(&self) -> AgentType {
        self.handler.agent_type()
    }

    pub fn state(&self) -> AgentState {
        self.lock().state
    }

    pub fn data(&self) -> FieldMap {
        self.lock().data.clone()
    }

    pub fn result(&self) -> Option<AgentResult> {
        self.lock().result.clone()
    }

    /// Field the agent last asked the caller for.
    pub fn pending_field(&self) -> Option<String> {
        self.lock().pending_field.clone()
    }

    pub fn has_required_data(&self) -> bool {
        self.first_missing(&self.lock().data).is_none()
    }

    fn first_missing(&self, data: &FieldMap) -> Option<&'static str> {
        self.handler.required_fields().iter().copied().find(|field| {
            data.get(*field)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        })
    }

    fn prompt_for(&self, field: &str) -> String {
        self.handler
            .prompt_for_field(field)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} required", field))
    }

    /// Begin work: ask for the first missing field, or run.
    pub fn start(self: &Arc<Self>) {
        if self.state() != AgentState::Initializing {
            tracing::debug!(call_id = %self.call_id, "Agent already started");
            return;
        }
        self.proceed();
    }

    /// Ask the caller for the first missing required field.
    ///
    /// Returns the field asked for, or `None` when nothing is missing or the
    /// agent can no longer wait for input.
    pub fn request_missing_info(&self) -> Option<String> {
        let mut inner = self.lock();
        let field = self.first_missing(&inner.data)?;
        let prompt = self.prompt_for(field);
        self.ask_locked(&mut inner, field.to_string(), prompt)
            .then(|| field.to_string())
    }

    fn ask_locked(&self, inner: &mut AgentInner, field: String, prompt: String) -> bool {
        if inner.state != AgentState::WaitingForInfo {
            if let Err(e) = inner.transition(AgentState::WaitingForInfo) {
                tracing::debug!(call_id = %self.call_id, error = %e, "Cannot wait for info");
                return false;
            }
        }
        inner.stop_timer();
        inner.pending_field = Some(field.clone());
        tracing::debug!(
            call_id = %self.call_id,
            agent_type = %self.agent_type(),
            field = %field,
            "Agent needs info"
        );
        inner.emit(AgentEvent::NeedInfo { field, prompt });
        true
    }

    fn proceed(self: &Arc<Self>) {
        let mut inner = self.lock();
        if let Some(field) = self.first_missing(&inner.data) {
            let prompt = self.prompt_for(field);
            self.ask_locked(&mut inner, field.to_string(), prompt);
            return;
        }
        if let Err(e) = inner.transition(AgentState::Running) {
            tracing::debug!(call_id = %self.call_id, error = %e, "Agent not runnable");
            return;
        }

        let weak = Arc::downgrade(self);
        let deadline = tokio::time::sleep(self.timeout);
        inner.timer = Some(tokio::spawn(async move {
            deadline.await;
            if let Some(agent) = weak.upgrade() {
                agent.on_timeout();
            }
        }));

        let ctx = AgentContext::new(
            self.call_id.clone(),
            self.agent_type(),
            self.handler.confidence(),
            inner.data.clone(),
            self.deps.clone(),
        );
        drop(inner);

        tracing::info!(
            call_id = %self.call_id,
            agent_type = %self.agent_type(),
            "Agent running"
        );
        let agent = Arc::clone(self);
        tokio::spawn(async move { agent.run(ctx).await });
    }

    async fn run(self: Arc<Self>, ctx: AgentContext) {
        let handler = Arc::clone(&self.handler);
        let execution = tokio::spawn(async move {
            let outcome = handler.execute(&ctx).await;
            if let Err(e) = &outcome {
                ctx.abandon_action(e).await;
            }
            outcome
        });

        match execution.await {
            Ok(Ok(AgentOutcome::Completed(result))) => {
                self.complete(result);
            }
            Ok(Ok(AgentOutcome::NeedInfo { field, prompt })) => {
                let mut inner = self.lock();
                if inner.state == AgentState::Running {
                    self.ask_locked(&mut inner, field, prompt);
                }
            }
            Ok(Err(e)) => {
                self.handle_error(e);
            }
            Err(join_err) => {
                self.handle_error(AgentError::Panicked(join_err.to_string()));
            }
        }
    }

    fn on_timeout(&self) {
        let mut inner = self.lock();
        if inner.state != AgentState::Running {
            return;
        }
        // This is the timer task itself; detach rather than abort.
        inner.timer = None;
        drop(inner);
        self.handle_error(AgentError::Timeout(self.timeout.as_secs()));
    }

    /// Merge new field values. Resumes a waiting agent once complete.
    ///
    /// Returns `false` when the agent is terminal and the update was ignored.
    pub fn update_data(self: &Arc<Self>, partial: FieldMap) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.data.extend(partial);

        if inner.state != AgentState::WaitingForInfo {
            return true;
        }
        match self.first_missing(&inner.data) {
            None => {
                drop(inner);
                self.proceed();
            }
            Some(field) if inner.pending_field.as_deref() != Some(field) => {
                let prompt = self.prompt_for(field);
                self.ask_locked(&mut inner, field.to_string(), prompt);
            }
            Some(_) => {}
        }
        true
    }

    /// Stop the agent. Nothing further is emitted.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        if let Err(e) = inner.transition(AgentState::Cancelled) {
            tracing::warn!(call_id = %self.call_id, error = %e, "Cancel rejected");
            return false;
        }
        inner.stop_timer();
        inner.events = None;
        tracing::info!(
            call_id = %self.call_id,
            agent_type = %self.agent_type(),
            "Agent cancelled"
        );
        true
    }

    /// Record a final result. Ignored once terminal.
    pub fn complete(&self, result: AgentResult) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            tracing::debug!(
                call_id = %self.call_id,
                state = %inner.state,
                message = %result.message,
                "Dropping late agent result"
            );
            return false;
        }
        if let Err(e) = inner.transition(AgentState::Completed) {
            tracing::warn!(call_id = %self.call_id, error = %e, "Completion rejected");
            return false;
        }
        inner.stop_timer();
        inner.result = Some(result.clone());
        tracing::info!(
            call_id = %self.call_id,
            agent_type = %self.agent_type(),
            success = result.success,
            "Agent completed"
        );
        inner.emit(AgentEvent::Completed(result));
        inner.events = None;
        true
    }

    /// Fail the agent. Ignored once terminal.
    pub fn handle_error(&self, error: AgentError) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        if let Err(e) = inner.transition(AgentState::Error) {
            tracing::warn!(call_id = %self.call_id, error = %e, "Error transition rejected");
            return false;
        }
        inner.stop_timer();
        tracing::warn!(
            call_id = %self.call_id,
            agent_type = %self.agent_type(),
            error = %error,
            "Agent failed"
        );
        inner.emit(AgentEvent::Failed(error.to_string()));
        inner.events = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryActionStore, InMemoryCommerce};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoHandler {
        required: &'static [&'static str],
        runs: AtomicUsize,
        behavior: Behavior,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
        Hang,
        AskOnce,
    }

    impl EchoHandler {
        fn new(required: &'static [&'static str], behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                required,
                runs: AtomicUsize::new(0),
                behavior,
            })
        }
    }

    #[async_trait]
    impl AgentHandler for EchoHandler {
        fn agent_type(&self) -> AgentType {
            AgentType::Complaint
        }

        fn required_fields(&self) -> &'static [&'static str] {
            self.required
        }

        fn prompt_for_field(&self, field: &str) -> Option<&'static str> {
            match field {
                "order_id" => Some("What is your order number?"),
                _ => None,
            }
        }

        async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(AgentOutcome::Completed(AgentResult::success(
                    "ok",
                    serde_json::to_value(ctx.data()).unwrap(),
                    "done",
                ))),
                Behavior::Fail => Err(AgentError::InvalidData("bad".to_string())),
                Behavior::Panic => panic!("descriptor blew up"),
                Behavior::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Behavior::AskOnce if run == 0 => Ok(AgentOutcome::NeedInfo {
                    field: "size".to_string(),
                    prompt: "Which size?".to_string(),
                }),
                Behavior::AskOnce => Ok(AgentOutcome::Completed(AgentResult::success(
                    "ok",
                    serde_json::Value::Null,
                    "done",
                ))),
            }
        }
    }

    fn deps() -> AgentDeps {
        AgentDeps {
            commerce: Arc::new(InMemoryCommerce::new()),
            store: Arc::new(InMemoryActionStore::new()),
            policy: Arc::new(AgentPolicy::default()),
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn spawn_agent(
        handler: Arc<EchoHandler>,
        data: FieldMap,
    ) -> (Arc<Agent>, mpsc::UnboundedReceiver<AgentEvent>) {
        Agent::new(
            CallId::from("call-1"),
            handler,
            data,
            deps(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_missing_field_asks_with_prompt() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&["order_id", "reason"], Behavior::Succeed),
            FieldMap::new(),
        );
        agent.start();

        assert_eq!(agent.state(), AgentState::WaitingForInfo);
        assert_eq!(agent.pending_field().as_deref(), Some("order_id"));
        assert_eq!(
            rx.recv().await.unwrap(),
            AgentEvent::NeedInfo {
                field: "order_id".to_string(),
                prompt: "What is your order number?".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_fallback_prompt_and_next_field() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&["order_id", "reason"], Behavior::Succeed),
            FieldMap::new(),
        );
        agent.start();
        rx.recv().await.unwrap();

        assert!(agent.update_data(fields(&[("order_id", "5001")])));
        assert_eq!(
            rx.recv().await.unwrap(),
            AgentEvent::NeedInfo {
                field: "reason".to_string(),
                prompt: "reason required".to_string(),
            }
        );
        assert_eq!(agent.state(), AgentState::WaitingForInfo);
    }

    #[tokio::test]
    async fn test_update_resumes_and_completes() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&["order_id"], Behavior::Succeed),
            FieldMap::new(),
        );
        agent.start();
        rx.recv().await.unwrap();

        agent.update_data(fields(&[("order_id", "5001")]));
        match rx.recv().await.unwrap() {
            AgentEvent::Completed(result) => {
                assert!(result.success);
                assert_eq!(result.data["order_id"], "5001");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(agent.state(), AgentState::Completed);
        let result = agent.result();
        assert!(result.is_some());
        // Sender dropped after the terminal event.
        assert!(rx.recv().await.is_none());

        // Completed is final.
        assert!(!agent.update_data(fields(&[("reason", "late")])));
        assert!(!agent.complete(AgentResult::failure("late", "")));
        assert!(!agent.handle_error(AgentError::InvalidData("late".to_string())));
        assert_eq!(agent.state(), AgentState::Completed);
        assert_eq!(agent.result(), result);
        assert!(!agent.data().contains_key("reason"));
    }

    #[tokio::test]
    async fn test_blank_value_counts_as_missing() {
        let (agent, _rx) = spawn_agent(
            EchoHandler::new(&["order_id"], Behavior::Succeed),
            fields(&[("order_id", "  ")]),
        );
        assert!(!agent.has_required_data());
        agent.start();
        assert_eq!(agent.state(), AgentState::WaitingForInfo);
    }

    #[tokio::test]
    async fn test_execute_error_emits_failed() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&[], Behavior::Fail),
            FieldMap::new(),
        );
        agent.start();
        match rx.recv().await.unwrap() {
            AgentEvent::Failed(msg) => assert!(msg.contains("bad")),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(agent.state(), AgentState::Error);
        let result = agent.result();

        // Error is final.
        assert!(!agent.update_data(fields(&[("order_id", "5001")])));
        assert!(!agent.complete(AgentResult::failure("late", "")));
        assert!(!agent.handle_error(AgentError::InvalidData("again".to_string())));
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(agent.result(), result);
        assert!(!agent.data().contains_key("order_id"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_captured_as_error() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&[], Behavior::Panic),
            FieldMap::new(),
        );
        agent.start();
        assert!(matches!(rx.recv().await.unwrap(), AgentEvent::Failed(_)));
        assert_eq!(agent.state(), AgentState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_running_agent() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&[], Behavior::Hang),
            FieldMap::new(),
        );
        agent.start();

        match rx.recv().await.unwrap() {
            AgentEvent::Failed(msg) => {
                assert_eq!(msg, "Agent execution timed out after 30 seconds")
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(agent.state(), AgentState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_agent_never_times_out() {
        let (agent, _rx) = spawn_agent(
            EchoHandler::new(&["order_id"], Behavior::Succeed),
            FieldMap::new(),
        );
        agent.start();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(agent.state(), AgentState::WaitingForInfo);
    }

    #[tokio::test]
    async fn test_execute_can_request_more_info() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&[], Behavior::AskOnce),
            FieldMap::new(),
        );
        agent.start();
        assert_eq!(
            rx.recv().await.unwrap(),
            AgentEvent::NeedInfo {
                field: "size".to_string(),
                prompt: "Which size?".to_string(),
            }
        );
        assert_eq!(agent.state(), AgentState::WaitingForInfo);

        agent.update_data(fields(&[("size", "M")]));
        assert!(matches!(rx.recv().await.unwrap(), AgentEvent::Completed(_)));
    }

    #[tokio::test]
    async fn test_cancel_is_terminal_and_silent() {
        let (agent, mut rx) = spawn_agent(
            EchoHandler::new(&["order_id"], Behavior::Succeed),
            FieldMap::new(),
        );
        agent.start();
        rx.recv().await.unwrap();

        assert!(agent.cancel());
        assert_eq!(agent.state(), AgentState::Cancelled);
        assert!(!agent.cancel());
        assert!(!agent.update_data(fields(&[("order_id", "1")])));
        assert!(!agent.complete(AgentResult::failure("late", "")));
        assert!(!agent.handle_error(AgentError::InvalidData("late".to_string())));
        assert_eq!(agent.state(), AgentState::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_complete_before_running_is_rejected() {
        let (agent, _rx) = spawn_agent(
            EchoHandler::new(&["order_id"], Behavior::Succeed),
            FieldMap::new(),
        );
        assert!(!agent.complete(AgentResult::failure("early", "")));
        assert_eq!(agent.state(), AgentState::Initializing);
    }

    #[tokio::test]
    async fn test_request_missing_info_when_complete_returns_none() {
        let (agent, _rx) = spawn_agent(
            EchoHandler::new(&["order_id"], Behavior::Succeed),
            fields(&[("order_id", "9")]),
        );
        assert_eq!(agent.request_missing_info(), None);
    }
}
