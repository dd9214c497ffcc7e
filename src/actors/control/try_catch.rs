/// Error recovery for a sub-flow
use super::{combined_generates, named_branches};
use crate::runtime::{
    actor::{clean_up_children, set_up_children, wrap_up_children, Actor, ActorCore},
    context::FlowContext,
    director::SequentialDirector,
    error::{ActorError, ActorResult},
    token::{DataType, Payload, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TRY: usize = 0;
const CATCH: usize = 1;

/// What the `catch` branch receives when it takes input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchInput {
    /// The token that was handed to `try`
    #[default]
    Token,
    /// The error message as text
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TryCatchParams {
    pub catch_input: CatchInput,
}

/// Runs the `try` branch and falls back to the `catch` branch when it fails
///
/// Errors raised anywhere below `try` (nested composites and triggered events
/// included) neither reach the flow's error log nor stop the flow; they end
/// the `try` branch and start `catch`. Output comes from whichever branch ran.
/// Errors in `catch` are handled like any other actor error.
#[derive(Debug)]
pub struct TryCatch {
    core: ActorCore,
    params: TryCatchParams,
    branches: Vec<Box<dyn Actor>>,
    director: SequentialDirector,
    input: Option<Token>,
}

impl TryCatch {
    /// Children must be named `try` and `catch`
    pub fn new(
        name: impl Into<String>,
        params: TryCatchParams,
        children: Vec<Box<dyn Actor>>,
    ) -> ActorResult<Self> {
        let name = name.into();
        let branches = named_branches(&name, children, &["try", "catch"])?;
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
impl Actor for TryCatch {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "try_catch"
    }

    fn accepts(&self) -> Vec<DataType> {
        self.branches[TRY].accepts()
    }

    fn generates(&self) -> Vec<DataType> {
        combined_generates(&self.branches)
    }

    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        if self.branches[TRY].core().skip() {
            return Err(ActorError::configuration(self.core.full_name(), "'try' is skipped"));
        }
        let catch = &self.branches[CATCH];
        if catch.is_input_consumer() {
            let offered = match self.params.catch_input {
                CatchInput::Token => self.branches[TRY].accepts(),
                CatchInput::Error => vec![DataType::Text],
            };
            let accepted = catch.accepts();
            if !offered.is_empty() && !offered.iter().any(|t| DataType::any_compatible(&accepted, t)) {
                return Err(ActorError::configuration(
                    self.core.full_name(),
                    format!(
                        "'catch' accepts [{}] but would receive [{}]",
                        DataType::describe(&accepted),
                        DataType::describe(&offered)
                    ),
                ));
            }
        }
        set_up_children(&self.core, &mut self.branches, ctx).await
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let input = self.input.take();

        let attempt = self
            .director
            .execute(
                &self.core,
                &mut self.branches[TRY..=TRY],
                input.clone(),
                &ctx.catching_errors(),
            )
            .await;
        let error = match attempt {
            Ok(()) => return Ok(()),
            Err(e) if self.core.is_stopped() || ctx.is_flow_stopped() => return Err(e),
            Err(e) => e,
        };

        tracing::warn!("🪤 '{}' caught: {}", self.core.full_name(), error);
        self.director.clear();
        while self.branches[TRY].output().is_some() {}

        let catch = &self.branches[CATCH];
        let catch_input = if catch.is_input_consumer() {
            match self.params.catch_input {
                CatchInput::Token => input,
                CatchInput::Error => Some(Token::new(Payload::Text(error.to_string()))),
            }
        } else {
            None
        };

        self.director
            .execute(&self.core, &mut self.branches[CATCH..=CATCH], catch_input, ctx)
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
    use crate::actors::control::SubProcess;
    use crate::runtime::actor::testing::Recorder;
    use std::sync::atomic::Ordering;

    fn branch(name: &str, recorder: Recorder) -> Box<dyn Actor> {
        Box::new(SubProcess::new(name, vec![Box::new(recorder) as Box<dyn Actor>]))
    }

    fn try_catch(attempt: Recorder, fallback: Recorder, params: TryCatchParams) -> TryCatch {
        TryCatch::new("tc", params, vec![branch("try", attempt), branch("catch", fallback)]).unwrap()
    }

    #[tokio::test]
    async fn successful_try_skips_catch() {
        let ctx = FlowContext::detached("flow");
        let fallback = Recorder::new("fallback");
        let fallback_runs = fallback.executions.clone();
        let mut actor = try_catch(Recorder::new("work"), fallback, TryCatchParams::default());
        actor.set_up(&ctx).await.unwrap();

        actor.input(Token::new(Payload::Integer(4))).unwrap();
        actor.execute(&ctx).await.unwrap();

        assert_eq!(actor.output().unwrap().payload(), &Payload::Integer(4));
        assert_eq!(fallback_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_try_runs_catch_with_the_input() {
        let ctx = FlowContext::detached("flow");
        // even a failure that would stop the flow is contained
        let work = Recorder::failing("work", "disk full").stop_on_error();
        let mut actor = try_catch(work, Recorder::new("fallback"), TryCatchParams::default());
        actor.set_up(&ctx).await.unwrap();

        actor.input(Token::new(Payload::Integer(4))).unwrap();
        actor.execute(&ctx).await.unwrap();

        assert_eq!(actor.output().unwrap().payload(), &Payload::Integer(4));
        assert!(actor.output().is_none());
        assert!(ctx.log_entries().is_empty());
        assert!(!ctx.is_flow_stopped());
    }

    #[tokio::test]
    async fn catch_can_receive_the_error_message() {
        let ctx = FlowContext::detached("flow");
        let params = TryCatchParams {
            catch_input: CatchInput::Error,
        };
        let mut actor = try_catch(Recorder::failing("work", "bad row"), Recorder::new("fallback"), params);
        actor.set_up(&ctx).await.unwrap();

        actor.input(Token::new(Payload::Integer(1))).unwrap();
        actor.execute(&ctx).await.unwrap();

        let token = actor.output().unwrap();
        assert!(matches!(token.payload(), Payload::Text(message) if message.contains("bad row")));
    }

    #[tokio::test]
    async fn catch_failures_follow_the_flow_rules() {
        let ctx = FlowContext::detached("flow");
        let fallback = Recorder::failing("fallback", "also broken").stop_on_error();
        let mut actor = try_catch(Recorder::failing("work", "broken"), fallback, TryCatchParams::default());
        actor.set_up(&ctx).await.unwrap();

        actor.input(Token::new(Payload::Integer(1))).unwrap();
        let err = actor.execute(&ctx).await.unwrap_err();

        assert!(err.to_string().contains("also broken"));
        assert_eq!(ctx.log_entries().len(), 1);
        assert!(ctx.is_flow_stopped());
    }

    #[tokio::test]
    async fn next_token_tries_again() {
        let ctx = FlowContext::detached("flow");
        let work = Recorder::new("work");
        let work_runs = work.executions.clone();
        let mut actor = try_catch(work, Recorder::new("fallback"), TryCatchParams::default());
        actor.set_up(&ctx).await.unwrap();

        for i in 0..3 {
            actor.input(Token::new(Payload::Integer(i))).unwrap();
            actor.execute(&ctx).await.unwrap();
            assert_eq!(actor.output().unwrap().payload(), &Payload::Integer(i));
        }
        assert_eq!(work_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn branches_are_required() {
        let err = TryCatch::new("tc", TryCatchParams::default(), vec![branch("try", Recorder::new("w"))])
            .unwrap_err();
        assert!(err.to_string().contains("catch"));
    }
}
