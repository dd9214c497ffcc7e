/// Side branch for tokens
use crate::runtime::{
    actor::{clean_up_children, set_up_children, wrap_up_children, Actor, ActorCore},
    context::FlowContext,
    director::SequentialDirector,
    error::{ActorError, ActorResult},
    token::{DataType, Token},
};
use async_trait::async_trait;

/// Feeds a copy of every token into a side chain and forwards the original
#[derive(Debug)]
pub struct Tee {
    core: ActorCore,
    actors: Vec<Box<dyn Actor>>,
    director: SequentialDirector,
    input: Option<Token>,
    output: Option<Token>,
}

impl Tee {
    pub fn new(name: impl Into<String>, actors: Vec<Box<dyn Actor>>) -> Self {
        Self {
            core: ActorCore::new(name),
            actors,
            director: SequentialDirector::new(false),
            input: None,
            output: None,
        }
    }
}

#[async_trait]
impl Actor for Tee {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "tee"
    }

    fn accepts(&self) -> Vec<DataType> {
        self.actors
            .iter()
            .find(|a| !a.core().skip())
            .map(|a| a.accepts())
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| vec![DataType::Unknown])
    }

    fn generates(&self) -> Vec<DataType> {
        self.accepts()
    }

    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        if let Some(source) = self
            .actors
            .iter()
            .find(|a| !a.core().skip() && !a.is_input_consumer())
        {
            return Err(ActorError::configuration(
                self.core.full_name(),
                format!("side chain starts with '{}', which takes no input", source.name()),
            ));
        }
        set_up_children(&self.core, &mut self.actors, ctx).await
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let Some(token) = self.input.take() else {
            return Err(ActorError::execution(self.core.full_name(), "no token to tee"));
        };
        self.director
            .execute(&self.core, &mut self.actors, Some(token.clone()), ctx)
            .await?;
        self.output = Some(token);
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }

    fn on_wrap_up(&mut self) {
        wrap_up_children(&mut self.actors);
        self.input = None;
        self.output = None;
    }

    fn on_clean_up(&mut self) {
        clean_up_children(&mut self.actors);
    }
}
