/// Composite actor running a chain of children for each input token
use crate::runtime::{
    actor::{clean_up_children, set_up_children, wrap_up_children, Actor, ActorCore},
    context::FlowContext,
    director::SequentialDirector,
    error::{ActorError, ActorResult},
    token::{DataType, Token},
};
use async_trait::async_trait;

/// Owns a chain of actors and behaves like a single transformer
///
/// The input is pushed into the first child, whatever leaves the last child
/// becomes the sub-process' output. Lifecycle calls and stops are forwarded to
/// every child.
#[derive(Debug)]
pub struct SubProcess {
    core: ActorCore,
    actors: Vec<Box<dyn Actor>>,
    director: SequentialDirector,
    input: Option<Token>,
}

impl SubProcess {
    pub fn new(name: impl Into<String>, actors: Vec<Box<dyn Actor>>) -> Self {
        Self {
            core: ActorCore::new(name),
            actors,
            director: SequentialDirector::new(true),
            input: None,
        }
    }

    pub fn actors(&self) -> &[Box<dyn Actor>] {
        &self.actors
    }

    fn first_active(&self) -> Option<&dyn Actor> {
        self.actors.iter().find(|a| !a.core().skip()).map(|a| a.as_ref())
    }

    fn last_active(&self) -> Option<&dyn Actor> {
        self.actors.iter().rev().find(|a| !a.core().skip()).map(|a| a.as_ref())
    }
}

#[async_trait]
impl Actor for SubProcess {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "sub_process"
    }

    fn accepts(&self) -> Vec<DataType> {
        self.first_active().map(|a| a.accepts()).unwrap_or_default()
    }

    fn generates(&self) -> Vec<DataType> {
        self.last_active().map(|a| a.generates()).unwrap_or_default()
    }

    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        if self.first_active().is_none() {
            return Err(ActorError::configuration(self.core.full_name(), "no active actors"));
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
        self.director.clear();
        self.input = None;
    }

    fn on_clean_up(&mut self) {
        clean_up_children(&mut self.actors);
    }
}
