/// Per-flow execution context
///
/// Everything an actor needs from the flow it runs in is reachable through a
/// `FlowContext`: the root stop handle, the error-handling mode, the named
/// event actors, the optional execution listener and the error log. The
/// context is created by the root flow and handed down explicitly, there is
/// no process-wide state.

use crate::runtime::{
    actor::SharedActor,
    error::ActorError,
    listener::FlowExecutionListener,
    stop::StopHandle,
    token::Token,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

/// How the flow reacts to actor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Any error stops the whole flow
    ActorsAlwaysStopOnError,
    /// Only actors with `stop_flow_on_error` stop the flow, other errors are
    /// logged and the current token is dropped
    #[default]
    ActorsDecideToStopOnError,
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorHandling::ActorsAlwaysStopOnError => write!(f, "actors_always_stop_on_error"),
            ErrorHandling::ActorsDecideToStopOnError => write!(f, "actors_decide_to_stop_on_error"),
        }
    }
}

impl std::str::FromStr for ErrorHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actors_always_stop_on_error" | "always" => Ok(ErrorHandling::ActorsAlwaysStopOnError),
            "actors_decide_to_stop_on_error" | "decide" => Ok(ErrorHandling::ActorsDecideToStopOnError),
            other => Err(format!("unknown error handling mode: {}", other)),
        }
    }
}

/// One recorded actor error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub generated: DateTime<Utc>,
    /// Full name of the actor the error was reported for
    pub source: String,
    /// Error category (configuration, resolution, execution, ...)
    pub kind: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(source: &str, error: &ActorError) -> Self {
        Self {
            generated: Utc::now(),
            source: source.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Knobs that apply to every actor of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionSettings {
    /// Upper bound for external commands; `None` waits until stopped
    pub command_timeout: Option<Duration>,
}

/// Shared execution context of a flow
#[derive(Clone, Debug)]
pub struct FlowContext {
    inner: Arc<ContextInner>,
    /// Errors go back to the caller untouched, see `catching_errors`
    catch_errors: bool,
}

#[derive(Debug)]
struct ContextInner {
    flow_name: String,
    flow_stop: StopHandle,
    error_handling: ErrorHandling,
    events: HashMap<String, SharedActor>,
    listener: Option<Arc<dyn FlowExecutionListener>>,
    log: Mutex<Vec<LogEntry>>,
    settings: ExecutionSettings,
}

impl FlowContext {
    pub fn builder(flow_name: impl Into<String>) -> FlowContextBuilder {
        FlowContextBuilder::new(flow_name)
    }

    /// Context without events or listener, e.g. for actors run on their own
    pub fn detached(flow_name: impl Into<String>) -> Self {
        Self::builder(flow_name).build()
    }

    pub fn flow_name(&self) -> &str {
        &self.inner.flow_name
    }

    /// Stop handle of the root flow
    pub fn flow_stop(&self) -> &StopHandle {
        &self.inner.flow_stop
    }

    pub fn is_flow_stopped(&self) -> bool {
        self.inner.flow_stop.is_stopped()
    }

    /// Stop the entire flow, the message is kept as the reason
    pub fn stop_flow(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("🛑 Stopping flow '{}': {}", self.inner.flow_name, message);
        self.inner.flow_stop.stop(Some(message));
    }

    /// Same flow, but actor errors are handed back to the caller instead of
    /// being logged or stopping the flow. Used by `try_catch`.
    pub fn catching_errors(&self) -> FlowContext {
        FlowContext {
            inner: self.inner.clone(),
            catch_errors: true,
        }
    }

    pub fn catches_errors(&self) -> bool {
        self.catch_errors
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.inner.error_handling
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.inner.settings
    }

    /// Look up an event actor by name
    pub fn event(&self, name: &str) -> Option<SharedActor> {
        self.inner.events.get(name).cloned()
    }

    pub fn listener(&self) -> Option<&Arc<dyn FlowExecutionListener>> {
        self.inner.listener.as_ref()
    }

    /// Add an error to the flow's log
    pub fn record_error(&self, source: &str, error: &ActorError) {
        self.inner.log.lock().push(LogEntry::new(source, error));
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.inner.log.lock().clone()
    }

    pub fn notify_pre_execute(&self, actor: &str) {
        if let Some(listener) = &self.inner.listener {
            listener.pre_execute(actor);
        }
    }

    pub fn notify_post_execute(&self, actor: &str) {
        if let Some(listener) = &self.inner.listener {
            listener.post_execute(actor);
        }
    }

    pub fn notify_pre_input(&self, actor: &str, token: &Token) {
        if let Some(listener) = &self.inner.listener {
            listener.pre_input(actor, token);
        }
    }

    pub fn notify_post_input(&self, actor: &str) {
        if let Some(listener) = &self.inner.listener {
            listener.post_input(actor);
        }
    }

    pub fn notify_pre_output(&self, actor: &str) {
        if let Some(listener) = &self.inner.listener {
            listener.pre_output(actor);
        }
    }

    pub fn notify_post_output(&self, actor: &str, token: &Token) {
        if let Some(listener) = &self.inner.listener {
            listener.post_output(actor, token);
        }
    }
}

/// Assembles a `FlowContext`
pub struct FlowContextBuilder {
    flow_name: String,
    flow_stop: Option<StopHandle>,
    error_handling: ErrorHandling,
    events: HashMap<String, SharedActor>,
    listener: Option<Arc<dyn FlowExecutionListener>>,
    settings: ExecutionSettings,
}

impl FlowContextBuilder {
    fn new(flow_name: impl Into<String>) -> Self {
        Self {
            flow_name: flow_name.into(),
            flow_stop: None,
            error_handling: ErrorHandling::default(),
            events: HashMap::new(),
            listener: None,
            settings: ExecutionSettings::default(),
        }
    }

    /// Use an existing handle as the flow's root stop handle
    pub fn stop_handle(mut self, handle: StopHandle) -> Self {
        self.flow_stop = Some(handle);
        self
    }

    pub fn error_handling(mut self, mode: ErrorHandling) -> Self {
        self.error_handling = mode;
        self
    }

    pub fn event(mut self, name: impl Into<String>, actor: SharedActor) -> Self {
        self.events.insert(name.into(), actor);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn FlowExecutionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> FlowContext {
        let flow_stop = self
            .flow_stop
            .unwrap_or_else(|| StopHandle::new(self.flow_name.clone()));
        FlowContext {
            inner: Arc::new(ContextInner {
                flow_name: self.flow_name,
                flow_stop,
                error_handling: self.error_handling,
                events: self.events,
                listener: self.listener,
                log: Mutex::new(Vec::new()),
                settings: self.settings,
            }),
            catch_errors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_handling_parses_long_and_short_names() {
        assert_eq!(
            "actors_always_stop_on_error".parse::<ErrorHandling>().unwrap(),
            ErrorHandling::ActorsAlwaysStopOnError
        );
        assert_eq!("decide".parse::<ErrorHandling>().unwrap(), ErrorHandling::ActorsDecideToStopOnError);
        assert!("sometimes".parse::<ErrorHandling>().is_err());
    }

    #[test]
    fn record_error_and_stop_flow() {
        let ctx = FlowContext::detached("flow");
        ctx.record_error("flow.a", &ActorError::execution("flow.a", "boom"));
        assert_eq!(ctx.log_entries().len(), 1);
        assert_eq!(ctx.log_entries()[0].kind, "execution");

        assert!(!ctx.is_flow_stopped());
        ctx.stop_flow("fatal");
        assert!(ctx.is_flow_stopped());
        assert_eq!(ctx.flow_stop().message().as_deref(), Some("fatal"));
    }

    #[test]
    fn catching_copy_shares_the_flow() {
        let ctx = FlowContext::detached("flow");
        let catching = ctx.catching_errors();
        assert!(catching.catches_errors());
        assert!(!ctx.catches_errors());

        catching.record_error("flow.a", &ActorError::execution("flow.a", "boom"));
        catching.stop_flow("done");
        assert_eq!(ctx.log_entries().len(), 1);
        assert!(ctx.is_flow_stopped());
    }
}
