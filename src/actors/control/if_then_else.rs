/// Two-way branch on a condition
use super::{combined_generates, named_branches, require_input_consumers, Condition};
use crate::runtime::{
    actor::{clean_up_children, set_up_children, wrap_up_children, Actor, ActorCore},
    context::FlowContext,
    director::SequentialDirector,
    error::{ActorError, ActorResult},
    token::{DataType, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const THEN: usize = 0;
const ELSE: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfThenElseParams {
    pub condition: Condition,
}

/// Hands each token to the `then` branch if the condition holds, to `else`
/// otherwise. Output comes from the branch that ran.
#[derive(Debug)]
pub struct IfThenElse {
    core: ActorCore,
    params: IfThenElseParams,
    branches: Vec<Box<dyn Actor>>,
    director: SequentialDirector,
    input: Option<Token>,
}

impl IfThenElse {
    /// Children must be named `then` and `else`
    pub fn new(
        name: impl Into<String>,
        params: IfThenElseParams,
        children: Vec<Box<dyn Actor>>,
    ) -> ActorResult<Self> {
        let name = name.into();
        let branches = named_branches(&name, children, &["then", "else"])?;
        Ok(Self {
            core: ActorCore::new(name),
            params,
            branches,
            director: SequentialDirector::new(true),
            input: None,
        })
    }
}

#[async_trait]
impl Actor for IfThenElse {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "if_then_else"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn generates(&self) -> Vec<DataType> {
        combined_generates(&self.branches)
    }

    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        require_input_consumers(self.core.full_name(), &self.branches)?;
        set_up_children(&self.core, &mut self.branches, ctx).await
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let Some(token) = self.input.take() else {
            return Err(ActorError::execution(self.core.full_name(), "no token to branch on"));
        };
        let holds = self
            .params
            .condition
            .evaluate(&token)
            .map_err(|message| ActorError::execution(self.core.full_name(), message))?;
        let branch = if holds { THEN } else { ELSE };
        tracing::trace!("🔀 '{}' takes '{}'", self.core.full_name(), self.branches[branch].name());

        self.director
            .execute(&self.core, &mut self.branches[branch..=branch], Some(token), ctx)
            .await
    }

    fn has_pending_output(&self) -> bool {
        self.director.has_output()
    }

    fn output(&mut self) -> Option<Token> {
        self.director.take_output()
    }

    fn on_wrap_up(&mut self) {
        wrap_up_children(&mut self.branches);
        self.director.clear();
        self.input = None;
    }

    fn on_clean_up(&mut self) {
        clean_up_children(&mut self.branches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::control::CompareOp;
    use crate::runtime::actor::testing::Recorder;
    use crate::runtime::token::Payload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn positive() -> IfThenElseParams {
        IfThenElseParams {
            condition: Condition::Compare {
                op: CompareOp::Gt,
                value: 0.0,
            },
        }
    }

    fn branches() -> (Vec<Box<dyn Actor>>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let then = Recorder::new("then");
        let otherwise = Recorder::new("else");
        let counts = (then.executions.clone(), otherwise.executions.clone());
        let children: Vec<Box<dyn Actor>> = vec![Box::new(otherwise), Box::new(then)];
        (children, counts.0, counts.1)
    }

    #[tokio::test]
    async fn condition_picks_the_branch() {
        let ctx = FlowContext::detached("flow");
        let (children, then_runs, else_runs) = branches();
        let mut actor = IfThenElse::new("ite", positive(), children).unwrap();
        actor.set_up(&ctx).await.unwrap();

        for value in [3, -1, 5] {
            actor.input(Token::new(Payload::Integer(value))).unwrap();
            actor.execute(&ctx).await.unwrap();
            assert_eq!(actor.output().unwrap().payload(), &Payload::Integer(value));
        }

        assert_eq!(then_runs.load(Ordering::SeqCst), 2);
        assert_eq!(else_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unusable_payload_is_an_execution_error() {
        let ctx = FlowContext::detached("flow");
        let (children, then_runs, else_runs) = branches();
        let mut actor = IfThenElse::new("ite", positive(), children).unwrap();
        actor.set_up(&ctx).await.unwrap();

        actor.input(Token::new(Payload::Text("x".into()))).unwrap();
        let err = actor.execute(&ctx).await.unwrap_err();

        assert!(matches!(err, ActorError::Execution { .. }));
        assert_eq!(then_runs.load(Ordering::SeqCst) + else_runs.load(Ordering::SeqCst), 0);
    }
}
