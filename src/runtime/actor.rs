/// Actor lifecycle
///
/// An actor is a named unit of flow logic. Its lifecycle is
/// `Created -> SetUp -> (Executing <-> Idle) -> Stopped -> WrappedUp -> CleanedUp`,
/// with `Failed` as the terminal state of an unsuccessful `set_up`.
///
/// Implementations provide the hooks (`configure`, `do_execute`, `on_wrap_up`,
/// `on_clean_up`, and the token slots); the provided lifecycle methods
/// (`set_up`, `execute`, `wrap_up`, `clean_up`, `stop_execution`) enforce the
/// state machine around them and should not be overridden.

use crate::runtime::{
    context::FlowContext,
    error::{ActorError, ActorResult},
    stop::StopHandle,
    token::{DataType, Token},
};
use async_trait::async_trait;
use serde::Serialize;
use std::{collections::HashSet, fmt, fmt::Debug, sync::Arc};

/// Actor that is referenced by name from elsewhere in the flow
pub type SharedActor = Arc<tokio::sync::Mutex<Box<dyn Actor>>>;

/// Wrap an actor so it can be referenced by name (event / callable actor)
pub fn shared(actor: Box<dyn Actor>) -> SharedActor {
    Arc::new(tokio::sync::Mutex::new(actor))
}

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Created,
    SetUp,
    Executing,
    Idle,
    Stopped,
    WrappedUp,
    CleanedUp,
    Failed,
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorState::Created => "created",
            ActorState::SetUp => "set up",
            ActorState::Executing => "executing",
            ActorState::Idle => "idle",
            ActorState::Stopped => "stopped",
            ActorState::WrappedUp => "wrapped up",
            ActorState::CleanedUp => "cleaned up",
            ActorState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// State and options shared by every actor implementation
#[derive(Debug)]
pub struct ActorCore {
    name: String,
    full_name: String,
    skip: bool,
    stop_flow_on_error: bool,
    state: ActorState,
    stop: StopHandle,
}

impl ActorCore {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            stop: StopHandle::new(name.clone()),
            name,
            skip: false,
            stop_flow_on_error: false,
            state: ActorState::Created,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root flow, e.g. `Flow.SubProcess.Display`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Place this actor below a parent with the given full name
    pub fn set_parent(&mut self, parent_full_name: &str) {
        self.full_name = format!("{}.{}", parent_full_name, self.name);
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn set_skip(&mut self, value: bool) {
        self.skip = value;
    }

    pub fn stop_flow_on_error(&self) -> bool {
        self.stop_flow_on_error
    }

    pub fn set_stop_flow_on_error(&mut self, value: bool) {
        self.stop_flow_on_error = value;
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Effective state; a raised stop flag shows as `Stopped` on a live actor
    pub fn state(&self) -> ActorState {
        match self.state {
            ActorState::SetUp | ActorState::Idle | ActorState::Executing if self.stop.is_stopped() => {
                ActorState::Stopped
            }
            other => other,
        }
    }

    fn lifecycle_error(&self, operation: &'static str) -> ActorError {
        ActorError::Lifecycle {
            actor: self.full_name.clone(),
            operation,
            state: self.state().to_string(),
        }
    }

    fn begin_set_up(&mut self) -> ActorResult<()> {
        match self.state {
            ActorState::Failed | ActorState::CleanedUp | ActorState::Executing => {
                Err(self.lifecycle_error("set up"))
            }
            _ => {
                self.stop.reset();
                Ok(())
            }
        }
    }

    fn finish_set_up(&mut self, ok: bool) {
        self.state = if ok { ActorState::SetUp } else { ActorState::Failed };
    }

    fn ensure_live(&self, operation: &'static str) -> ActorResult<()> {
        match self.state {
            ActorState::SetUp | ActorState::Idle => Ok(()),
            ActorState::Executing => Err(ActorError::Reentrant {
                actor: self.full_name.clone(),
            }),
            _ => Err(self.lifecycle_error(operation)),
        }
    }

    fn begin_execute(&mut self) -> ActorResult<()> {
        self.ensure_live("execute")?;
        self.state = ActorState::Executing;
        Ok(())
    }

    fn end_execute(&mut self) {
        if self.state == ActorState::Executing {
            self.state = ActorState::Idle;
        }
    }

    /// Returns whether the wrap-up hook has to run
    fn begin_wrap_up(&mut self) -> bool {
        match self.state {
            ActorState::SetUp | ActorState::Idle | ActorState::Executing => {
                self.state = ActorState::WrappedUp;
                true
            }
            _ => false,
        }
    }

    /// Returns whether the clean-up hook has to run
    fn begin_clean_up(&mut self) -> bool {
        if self.state == ActorState::CleanedUp {
            return false;
        }
        self.state = ActorState::CleanedUp;
        self.stop.unlink_all();
        true
    }
}

/// A configurable unit of flow logic
#[async_trait]
pub trait Actor: Send + Sync + Debug {
    fn core(&self) -> &ActorCore;

    fn core_mut(&mut self) -> &mut ActorCore;

    /// Registry tag of the actor type
    fn type_name(&self) -> &'static str;

    /// Payload types accepted as input; empty for actors without input
    fn accepts(&self) -> Vec<DataType> {
        Vec::new()
    }

    /// Payload types produced as output; empty for actors without output
    fn generates(&self) -> Vec<DataType> {
        Vec::new()
    }

    /// Validate options and resolve references
    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        Ok(())
    }

    /// The actual work of one execution cycle
    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()>;

    /// Store the input token for the next `do_execute`
    fn accept_input(&mut self, _token: Token) -> ActorResult<()> {
        Err(ActorError::execution(
            self.core().full_name(),
            "actor does not accept input",
        ))
    }

    fn has_pending_output(&self) -> bool {
        false
    }

    fn output(&mut self) -> Option<Token> {
        None
    }

    /// Sources return false while they still have data to produce
    fn is_finished(&self) -> bool {
        true
    }

    /// Release transient resources after the last execution
    fn on_wrap_up(&mut self) {}

    /// Release everything; the actor is not used again afterwards
    fn on_clean_up(&mut self) {}

    fn name(&self) -> &str {
        self.core().name()
    }

    fn full_name(&self) -> &str {
        self.core().full_name()
    }

    fn state(&self) -> ActorState {
        self.core().state()
    }

    fn stop_handle(&self) -> StopHandle {
        self.core().stop_handle().clone()
    }

    fn is_input_consumer(&self) -> bool {
        !self.accepts().is_empty()
    }

    fn is_output_producer(&self) -> bool {
        !self.generates().is_empty()
    }

    /// Cooperative stop, reaches every linked actor before returning
    fn stop_execution(&self) {
        self.core().stop_handle().stop(None);
    }

    async fn set_up(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        self.core_mut().begin_set_up()?;
        let result = self.configure(ctx).await;
        self.core_mut().finish_set_up(result.is_ok());
        if let Err(e) = &result {
            tracing::error!("❌ Set-up of '{}' failed: {}", self.full_name(), e);
        }
        result
    }

    /// Type-check and buffer an input token
    fn input(&mut self, token: Token) -> ActorResult<()> {
        self.core().ensure_live("accept input")?;
        let accepted = self.accepts();
        let offered = token.data_type();
        if !DataType::any_compatible(&accepted, &offered) {
            return Err(ActorError::InputType {
                actor: self.full_name().to_string(),
                actual: offered.to_string(),
                expected: DataType::describe(&accepted),
            });
        }
        self.accept_input(token)
    }

    async fn execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        if self.core().skip() {
            return Ok(());
        }
        self.core_mut().begin_execute()?;
        if self.core().is_stopped() {
            self.core_mut().end_execute();
            return Ok(());
        }
        let result = self.do_execute(ctx).await;
        self.core_mut().end_execute();
        result
    }

    fn wrap_up(&mut self) {
        if self.core_mut().begin_wrap_up() {
            self.on_wrap_up();
        }
    }

    fn clean_up(&mut self) {
        if self.core_mut().begin_clean_up() {
            self.on_clean_up();
        }
    }
}

/// Set up owned children below `parent` and link their stop handles
///
/// Sibling names must be unique. Stops at the first failing child and returns
/// its error unchanged.
pub async fn set_up_children(
    parent: &ActorCore,
    children: &mut [Box<dyn Actor>],
    ctx: &FlowContext,
) -> ActorResult<()> {
    let mut names = HashSet::new();
    for child in children.iter() {
        if !names.insert(child.name().to_string()) {
            return Err(ActorError::configuration(
                parent.full_name(),
                format!("duplicate actor name '{}'", child.name()),
            ));
        }
    }

    for child in children.iter_mut() {
        child.core_mut().set_parent(parent.full_name());
        child.set_up(ctx).await?;
        parent.stop_handle().link(child.stop_handle());
    }
    Ok(())
}

pub fn wrap_up_children(children: &mut [Box<dyn Actor>]) {
    for child in children.iter_mut() {
        child.wrap_up();
    }
}

pub fn clean_up_children(children: &mut [Box<dyn Actor>]) {
    for child in children.iter_mut() {
        child.clean_up();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small actors used by the unit tests of the runtime and the control actors

    use super::*;
    use crate::runtime::token::Payload;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every lifecycle hook call
    #[derive(Debug)]
    pub struct Recorder {
        core: ActorCore,
        pub executions: Arc<AtomicUsize>,
        pub wrap_ups: Arc<AtomicUsize>,
        pub clean_ups: Arc<AtomicUsize>,
        pub fail_with: Option<String>,
        pub wait_for_stop: bool,
        input: Option<Token>,
        queue: VecDeque<Token>,
    }

    impl Recorder {
        pub fn new(name: &str) -> Self {
            Self {
                core: ActorCore::new(name),
                executions: Arc::new(AtomicUsize::new(0)),
                wrap_ups: Arc::new(AtomicUsize::new(0)),
                clean_ups: Arc::new(AtomicUsize::new(0)),
                fail_with: None,
                wait_for_stop: false,
                input: None,
                queue: VecDeque::new(),
            }
        }

        pub fn failing(name: &str, message: &str) -> Self {
            let mut recorder = Self::new(name);
            recorder.fail_with = Some(message.to_string());
            recorder
        }

        pub fn stop_on_error(mut self) -> Self {
            self.core.set_stop_flow_on_error(true);
            self
        }
    }

    #[async_trait]
    impl Actor for Recorder {
        fn core(&self) -> &ActorCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ActorCore {
            &mut self.core
        }

        fn type_name(&self) -> &'static str {
            "recorder"
        }

        fn accepts(&self) -> Vec<DataType> {
            vec![DataType::Unknown]
        }

        fn generates(&self) -> Vec<DataType> {
            vec![DataType::Unknown]
        }

        fn accept_input(&mut self, token: Token) -> ActorResult<()> {
            self.input = Some(token);
            Ok(())
        }

        async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.wait_for_stop {
                let handle = self.stop_handle();
                handle.stopped().await;
            }
            if let Some(message) = &self.fail_with {
                self.input = None;
                return Err(ActorError::execution(self.full_name(), message.clone()));
            }
            let token = self
                .input
                .take()
                .unwrap_or_else(|| Token::new(Payload::Text(self.name().to_string())));
            self.queue.push_back(token);
            Ok(())
        }

        fn has_pending_output(&self) -> bool {
            !self.queue.is_empty()
        }

        fn output(&mut self) -> Option<Token> {
            self.queue.pop_front()
        }

        fn on_wrap_up(&mut self) {
            self.wrap_ups.fetch_add(1, Ordering::SeqCst);
            self.queue.clear();
        }

        fn on_clean_up(&mut self) {
            self.clean_ups.fetch_add(1, Ordering::SeqCst);
        }
    }
}
