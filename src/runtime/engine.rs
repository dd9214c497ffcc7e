/// Flow execution engine
///
/// `Flow` is the root actor of every run: it owns the main chain and the
/// event actors and provides the `FlowContext` they share. The
/// `ExecutionEngine` drives one run of a compiled flow from set-up to
/// clean-up and condenses it into an `ExecutionResult`.

use crate::flow::registry::CompiledFlow;
use crate::runtime::{
    actor::{clean_up_children, set_up_children, shared, wrap_up_children, Actor, ActorCore, SharedActor},
    context::{ErrorHandling, ExecutionSettings, FlowContext, LogEntry},
    director::SequentialDirector,
    error::{ActorError, ActorResult},
    factory::{build_actor, build_chain},
    listener::{ExecutionEvent, FlowExecutionListener, MultiListener, RecordingListener, TracingListener},
    stop::StopHandle,
    token::{DataType, Payload, Token},
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashSet, sync::Arc};
use uuid::Uuid;

/// Root actor of a flow
#[derive(Debug)]
pub struct Flow {
    core: ActorCore,
    actors: Vec<Box<dyn Actor>>,
    events: Vec<(String, SharedActor)>,
    director: SequentialDirector,
    input: Option<Token>,
}

impl Flow {
    pub fn new(name: impl Into<String>, actors: Vec<Box<dyn Actor>>, events: Vec<Box<dyn Actor>>) -> Self {
        Self {
            core: ActorCore::new(name),
            actors,
            events: events
                .into_iter()
                .map(|e| (e.name().to_string(), shared(e)))
                .collect(),
            director: SequentialDirector::new(true),
            input: None,
        }
    }

    /// Build a compiled flow; events are kept in reverse trigger order, so
    /// every event is set up before the events that trigger it
    pub fn from_compiled(compiled: &CompiledFlow) -> ActorResult<Self> {
        let definition = &compiled.definition;
        let actors = build_chain(&definition.actors)?;
        let mut events = Vec::with_capacity(definition.events.len());
        for name in compiled.trigger_order.iter().rev() {
            if let Some(event) = definition.events.iter().find(|e| &e.name == name) {
                events.push(build_actor(event)?);
            }
        }
        Ok(Self::new(definition.name.clone(), actors, events))
    }

    /// Flow that runs a single event as its main chain, e.g. an `on_error`
    /// hook; the other events stay available to its triggers
    pub fn for_event(compiled: &CompiledFlow, event: &str) -> ActorResult<Self> {
        let definition = &compiled.definition;
        let hook = definition
            .events
            .iter()
            .find(|e| e.name == event)
            .ok_or_else(|| ActorError::resolution(&definition.name, event))?;
        let mut events = Vec::with_capacity(definition.events.len());
        for name in compiled.trigger_order.iter().rev().filter(|name| *name != event) {
            if let Some(other) = definition.events.iter().find(|e| &e.name == name) {
                events.push(build_actor(other)?);
            }
        }
        Ok(Self::new(definition.name.clone(), vec![build_actor(hook)?], events))
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Context for running this flow, rooted at the flow's own stop handle
    pub fn context(
        &self,
        error_handling: ErrorHandling,
        settings: ExecutionSettings,
        listener: Option<Arc<dyn FlowExecutionListener>>,
    ) -> FlowContext {
        let mut builder = FlowContext::builder(self.core.name())
            .stop_handle(self.core.stop_handle().clone())
            .error_handling(error_handling)
            .settings(settings);
        for (name, event) in &self.events {
            builder = builder.event(name.clone(), event.clone());
        }
        if let Some(listener) = listener {
            builder = builder.listener(listener);
        }
        builder.build()
    }

    pub fn actors(&self) -> &[Box<dyn Actor>] {
        &self.actors
    }

    fn first_active(&self) -> Option<&dyn Actor> {
        self.actors.iter().find(|a| !a.core().skip()).map(|a| a.as_ref())
    }
}

#[async_trait]
impl Actor for Flow {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "flow"
    }

    fn accepts(&self) -> Vec<DataType> {
        self.first_active().map(|a| a.accepts()).unwrap_or_default()
    }

    fn generates(&self) -> Vec<DataType> {
        self.actors
            .iter()
            .rev()
            .find(|a| !a.core().skip())
            .map(|a| a.generates())
            .unwrap_or_default()
    }

    /// Events first, in their stored order, so triggers in the main chain can resolve them
    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let mut names = HashSet::new();
        for (name, event) in &self.events {
            if !names.insert(name.clone()) {
                return Err(ActorError::configuration(
                    self.core.full_name(),
                    format!("duplicate event name '{}'", name),
                ));
            }
            let mut actor = event.lock().await;
            actor.core_mut().set_parent(self.core.full_name());
            actor.set_up(ctx).await?;
            self.core.stop_handle().link(actor.stop_handle());
        }

        set_up_children(&self.core, &mut self.actors, ctx).await
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let input = self.input.take();
        self.director
            .execute(&self.core, &mut self.actors, input, ctx)
            .await
    }

    fn has_pending_output(&self) -> bool {
        self.director.has_output()
    }

    fn output(&mut self) -> Option<Token> {
        self.director.take_output()
    }

    fn on_wrap_up(&mut self) {
        wrap_up_children(&mut self.actors);
        for (name, event) in &self.events {
            match event.try_lock() {
                Ok(mut actor) => actor.wrap_up(),
                Err(_) => tracing::warn!("⚠️ Event '{}' still busy, not wrapped up", name),
            }
        }
        self.director.clear();
        self.input = None;
    }

    /// Main chain first, then the events
    fn on_clean_up(&mut self) {
        clean_up_children(&mut self.actors);
        for (name, event) in &self.events {
            match event.try_lock() {
                Ok(mut actor) => actor.clean_up(),
                Err(_) => tracing::warn!("⚠️ Event '{}' still busy, not cleaned up", name),
            }
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Record listener notifications into the result
    pub trace: bool,
    /// External handle that stops the run when stopped
    pub stop: Option<StopHandle>,
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub flow_id: String,
    /// Tokens that left the last actor of the main chain
    pub outputs: Vec<Value>,
    /// Errors recorded during the run
    pub errors: Vec<LogEntry>,
    /// Error that ended the run early, if any
    pub failure: Option<String>,
    pub stopped: bool,
    pub stop_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<ExecutionEvent>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ExecutionResult {
    /// Neither failed nor stopped
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && !self.stopped
    }
}

/// Runs compiled flows
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    /// Used for flows that do not set their own mode
    error_handling: ErrorHandling,
    settings: ExecutionSettings,
}

impl ExecutionEngine {
    pub fn new(error_handling: ErrorHandling, settings: ExecutionSettings) -> Self {
        Self {
            error_handling,
            settings,
        }
    }

    /// Execute a flow once per input (or once without input)
    ///
    /// Build and set-up failures are returned as errors, after the flow has
    /// been cleaned up. Errors raised while executing end the run and are
    /// reported in the result.
    pub async fn run(
        &self,
        compiled: &CompiledFlow,
        inputs: Vec<Value>,
        options: RunOptions,
    ) -> Result<ExecutionResult> {
        let definition = &compiled.definition;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            "🚀 Run {} of flow '{}' with {} input(s)",
            run_id,
            definition.id,
            inputs.len()
        );

        let mut flow = Flow::from_compiled(compiled)
            .map_err(|e| anyhow::anyhow!("Cannot build flow '{}': {}", definition.id, e))?;
        tracing::debug!("📋 Flow '{}' events in set-up order: {:?}", definition.id, flow.event_names());
        if !inputs.is_empty() && !flow.is_input_consumer() {
            return Err(anyhow::anyhow!(
                "Flow '{}' starts with a source and takes no inputs",
                definition.id
            ));
        }

        let recorder = options.trace.then(|| Arc::new(RecordingListener::new()));
        let listener: Arc<dyn FlowExecutionListener> = match &recorder {
            Some(recorder) => {
                let recording: Arc<dyn FlowExecutionListener> = recorder.clone();
                Arc::new(MultiListener::new(vec![recording, Arc::new(TracingListener)]))
            }
            None => Arc::new(TracingListener),
        };
        let mode = definition.error_handling.unwrap_or(self.error_handling);
        let ctx = flow.context(mode, self.settings.clone(), Some(listener.clone()));

        if let Err(e) = flow.set_up(&ctx).await {
            flow.clean_up();
            return Err(anyhow::anyhow!("Set-up of flow '{}' failed: {}", definition.id, e));
        }
        if let Some(external) = &options.stop {
            external.link(flow.stop_handle());
        }

        let mut outputs = Vec::new();
        let mut failure = None;
        let mut pending: Vec<Option<Token>> = if inputs.is_empty() {
            vec![None]
        } else {
            inputs
                .into_iter()
                .map(|v| Some(Token::new(Payload::from_json(v))))
                .collect()
        };
        pending.reverse();

        while let Some(input) = pending.pop() {
            if ctx.is_flow_stopped() {
                tracing::info!("🛑 Flow '{}' stopped, {} input(s) left", definition.id, pending.len() + 1);
                break;
            }
            let result = match input {
                Some(token) => match flow.input(token) {
                    Ok(()) => flow.execute(&ctx).await,
                    Err(e) => Err(e),
                },
                None => flow.execute(&ctx).await,
            };
            while let Some(token) = flow.output() {
                outputs.push(token.payload().to_json());
            }
            if let Err(e) = result {
                tracing::error!("❌ Run {} of flow '{}' failed: {}", run_id, definition.id, e);
                failure = Some(e.to_string());
                break;
            }
        }

        flow.wrap_up();
        flow.clean_up();

        let mut errors = ctx.log_entries();
        let hooks = [
            definition.on_error.as_deref().filter(|_| failure.is_some()),
            definition.on_finish.as_deref(),
        ];
        for event in hooks.into_iter().flatten() {
            let hook_errors = self
                .run_hook(compiled, event, mode, listener.clone(), options.stop.as_ref())
                .await;
            errors.extend(hook_errors);
        }

        let finished_at = Utc::now();
        let result = ExecutionResult {
            run_id,
            flow_id: definition.id.clone(),
            outputs,
            errors,
            failure,
            stopped: ctx.is_flow_stopped(),
            stop_message: ctx.flow_stop().message(),
            trace: recorder.map(|r| r.events()),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        };
        tracing::info!(
            "✅ Run {} of flow '{}' finished in {}ms: {} output(s), {} error(s)",
            run_id,
            definition.id,
            result.duration_ms,
            result.outputs.len(),
            result.errors.len()
        );
        Ok(result)
    }

    /// Run an event on its own, without input; returns the errors it logged
    ///
    /// The run's external stop handle, if any, also stops the hook.
    async fn run_hook(
        &self,
        compiled: &CompiledFlow,
        event: &str,
        mode: ErrorHandling,
        listener: Arc<dyn FlowExecutionListener>,
        stop: Option<&StopHandle>,
    ) -> Vec<LogEntry> {
        let flow_id = &compiled.definition.id;
        tracing::info!("🪝 Running hook '{}' of flow '{}'", event, flow_id);
        let mut hook = match Flow::for_event(compiled, event) {
            Ok(hook) => hook,
            Err(e) => {
                tracing::error!("❌ Hook '{}' of flow '{}' cannot be built: {}", event, flow_id, e);
                return vec![LogEntry::new(event, &e)];
            }
        };
        let ctx = hook.context(mode, self.settings.clone(), Some(listener));

        let mut errors = Vec::new();
        match hook.set_up(&ctx).await {
            Ok(()) => {
                if let Some(external) = stop {
                    external.link(hook.stop_handle());
                }
                if let Err(e) = hook.execute(&ctx).await {
                    tracing::error!("❌ Hook '{}' of flow '{}' failed: {}", event, flow_id, e);
                }
                while hook.output().is_some() {}
            }
            Err(e) => errors.push(LogEntry::new(hook.full_name(), &e)),
        }
        hook.wrap_up();
        hook.clean_up();

        let mut logged = ctx.log_entries();
        logged.extend(errors);
        logged
    }
}
