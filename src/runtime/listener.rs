/// Flow execution listeners
///
/// Listeners observe the pipeline without taking part in it: directors and
/// trigger actors notify them immediately before and after calling into an
/// actor. The notification order is part of the contract, tracing and
/// debugging tools rely on `pre_*` always preceding the matching `post_*`.

use crate::runtime::token::Token;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Debug;

/// Hooks around the calls a director makes into an actor
///
/// Every hook receives the full (dotted) name of the actor.
pub trait FlowExecutionListener: Send + Sync + Debug {
    fn pre_execute(&self, _actor: &str) {}

    fn post_execute(&self, _actor: &str) {}

    fn pre_input(&self, _actor: &str, _token: &Token) {}

    fn post_input(&self, _actor: &str) {}

    fn pre_output(&self, _actor: &str) {}

    fn post_output(&self, _actor: &str, _token: &Token) {}
}

/// Logs every hook at debug level
#[derive(Debug, Default)]
pub struct TracingListener;

impl FlowExecutionListener for TracingListener {
    fn pre_execute(&self, actor: &str) {
        tracing::debug!("▶️ pre-execute: {}", actor);
    }

    fn post_execute(&self, actor: &str) {
        tracing::debug!("⏹️ post-execute: {}", actor);
    }

    fn pre_input(&self, actor: &str, token: &Token) {
        tracing::debug!("📥 pre-input: {} <- {}", actor, token.data_type());
    }

    fn post_input(&self, actor: &str) {
        tracing::trace!("post-input: {}", actor);
    }

    fn pre_output(&self, actor: &str) {
        tracing::trace!("pre-output: {}", actor);
    }

    fn post_output(&self, actor: &str, token: &Token) {
        tracing::debug!("📤 post-output: {} -> {}", actor, token.data_type());
    }
}

/// A single recorded notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "hook", content = "actor", rename_all = "snake_case")]
pub enum ExecutionEvent {
    PreExecute(String),
    PostExecute(String),
    PreInput(String),
    PostInput(String),
    PreOutput(String),
    PostOutput(String),
}

/// Keeps every notification in order, used for run traces and tests
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().clone()
    }

    /// Only the execute hooks, which is what most traces care about
    pub fn execute_events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    ExecutionEvent::PreExecute(_) | ExecutionEvent::PostExecute(_)
                )
            })
            .cloned()
            .collect()
    }

    fn push(&self, event: ExecutionEvent) {
        self.events.lock().push(event);
    }
}

impl FlowExecutionListener for RecordingListener {
    fn pre_execute(&self, actor: &str) {
        self.push(ExecutionEvent::PreExecute(actor.to_string()));
    }

    fn post_execute(&self, actor: &str) {
        self.push(ExecutionEvent::PostExecute(actor.to_string()));
    }

    fn pre_input(&self, actor: &str, _token: &Token) {
        self.push(ExecutionEvent::PreInput(actor.to_string()));
    }

    fn post_input(&self, actor: &str) {
        self.push(ExecutionEvent::PostInput(actor.to_string()));
    }

    fn pre_output(&self, actor: &str) {
        self.push(ExecutionEvent::PreOutput(actor.to_string()));
    }

    fn post_output(&self, actor: &str, _token: &Token) {
        self.push(ExecutionEvent::PostOutput(actor.to_string()));
    }
}

/// Forwards every hook to several listeners in registration order
#[derive(Debug, Default)]
pub struct MultiListener {
    listeners: Vec<std::sync::Arc<dyn FlowExecutionListener>>,
}

impl MultiListener {
    pub fn new(listeners: Vec<std::sync::Arc<dyn FlowExecutionListener>>) -> Self {
        Self { listeners }
    }
}

impl FlowExecutionListener for MultiListener {
    fn pre_execute(&self, actor: &str) {
        self.listeners.iter().for_each(|l| l.pre_execute(actor));
    }

    fn post_execute(&self, actor: &str) {
        self.listeners.iter().for_each(|l| l.post_execute(actor));
    }

    fn pre_input(&self, actor: &str, token: &Token) {
        self.listeners.iter().for_each(|l| l.pre_input(actor, token));
    }

    fn post_input(&self, actor: &str) {
        self.listeners.iter().for_each(|l| l.post_input(actor));
    }

    fn pre_output(&self, actor: &str) {
        self.listeners.iter().for_each(|l| l.pre_output(actor));
    }

    fn post_output(&self, actor: &str, token: &Token) {
        self.listeners.iter().for_each(|l| l.post_output(actor, token));
    }
}
