/// Multi-way branch on a list of conditions
use super::{combined_generates, require_input_consumers, Condition};
use crate::runtime::{
    actor::{clean_up_children, set_up_children, wrap_up_children, Actor, ActorCore},
    context::FlowContext,
    director::SequentialDirector,
    error::{ActorError, ActorResult},
    token::{DataType, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchParams {
    /// One condition per case, in order
    pub conditions: Vec<Condition>,
}

/// Hands each token to the first case whose condition holds
///
/// There is one case per condition, plus an optional last case that takes
/// every token no condition matched. Without that default case such tokens
/// are dropped.
#[derive(Debug)]
pub struct Switch {
    core: ActorCore,
    params: SwitchParams,
    cases: Vec<Box<dyn Actor>>,
    director: SequentialDirector,
    input: Option<Token>,
}

impl Switch {
    pub fn new(name: impl Into<String>, params: SwitchParams, cases: Vec<Box<dyn Actor>>) -> ActorResult<Self> {
        let name = name.into();
        let conditions = params.conditions.len();
        if conditions == 0 {
            return Err(ActorError::configuration(&name, "no conditions"));
        }
        if cases.len() != conditions && cases.len() != conditions + 1 {
            return Err(ActorError::configuration(
                &name,
                format!(
                    "{} condition(s) need {} or {} cases, got {}",
                    conditions,
                    conditions,
                    conditions + 1,
                    cases.len()
                ),
            ));
        }
        Ok(Self {
            core: ActorCore::new(name),
            params,
            cases,
            director: SequentialDirector::new(true),
            input: None,
        })
    }

    fn pick(&self, token: &Token) -> ActorResult<Option<usize>> {
        for (index, condition) in self.params.conditions.iter().enumerate() {
            let holds = condition
                .evaluate(token)
                .map_err(|message| ActorError::execution(self.core.full_name(), message))?;
            if holds {
                return Ok(Some(index));
            }
        }
        let default = self.params.conditions.len();
        Ok((default < self.cases.len()).then_some(default))
    }
}

#[async_trait]
impl Actor for Switch {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "switch"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn generates(&self) -> Vec<DataType> {
        combined_generates(&self.cases)
    }

    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        require_input_consumers(self.core.full_name(), &self.cases)?;
        set_up_children(&self.core, &mut self.cases, ctx).await
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let Some(token) = self.input.take() else {
            return Err(ActorError::execution(self.core.full_name(), "no token to switch on"));
        };
        let Some(case) = self.pick(&token)? else {
            tracing::debug!("'{}' has no case for {}, token dropped", self.core.full_name(), token.payload());
            return Ok(());
        };

        self.director
            .execute(&self.core, &mut self.cases[case..=case], Some(token), ctx)
            .await
    }

    fn has_pending_output(&self) -> bool {
        self.director.has_output()
    }

    fn output(&mut self) -> Option<Token> {
        self.director.take_output()
    }

    fn on_wrap_up(&mut self) {
        wrap_up_children(&mut self.cases);
        self.director.clear();
        self.input = None;
    }

    fn on_clean_up(&mut self) {
        clean_up_children(&mut self.cases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::control::CompareOp;
    use crate::runtime::actor::testing::Recorder;
    use crate::runtime::token::Payload;
    use std::sync::atomic::Ordering;

    fn below(value: f64) -> Condition {
        Condition::Compare {
            op: CompareOp::Lt,
            value,
        }
    }

    #[tokio::test]
    async fn first_matching_case_wins_and_default_takes_the_rest() {
        let ctx = FlowContext::detached("flow");
        let small = Recorder::new("small");
        let medium = Recorder::new("medium");
        let large = Recorder::new("large");
        let runs = [small.executions.clone(), medium.executions.clone(), large.executions.clone()];
        let params = SwitchParams {
            conditions: vec![below(10.0), below(100.0)],
        };
        let cases: Vec<Box<dyn Actor>> = vec![Box::new(small), Box::new(medium), Box::new(large)];
        let mut actor = Switch::new("switch", params, cases).unwrap();
        actor.set_up(&ctx).await.unwrap();

        for value in [1, 50, 500, 5] {
            actor.input(Token::new(Payload::Integer(value))).unwrap();
            actor.execute(&ctx).await.unwrap();
            assert_eq!(actor.output().unwrap().payload(), &Payload::Integer(value));
        }

        let counts: Vec<usize> = runs.iter().map(|r| r.load(Ordering::SeqCst)).collect();
        assert_eq!(counts, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn without_default_unmatched_tokens_are_dropped() {
        let ctx = FlowContext::detached("flow");
        let params = SwitchParams {
            conditions: vec![below(10.0)],
        };
        let cases: Vec<Box<dyn Actor>> = vec![Box::new(Recorder::new("small"))];
        let mut actor = Switch::new("switch", params, cases).unwrap();
        actor.set_up(&ctx).await.unwrap();

        actor.input(Token::new(Payload::Double(42.0))).unwrap();
        actor.execute(&ctx).await.unwrap();

        assert!(!actor.has_pending_output());
        assert!(ctx.log_entries().is_empty());
    }

    #[test]
    fn case_count_must_match_conditions() {
        let params = SwitchParams {
            conditions: vec![below(1.0)],
        };
        let cases: Vec<Box<dyn Actor>> = vec![
            Box::new(Recorder::new("a")),
            Box::new(Recorder::new("b")),
            Box::new(Recorder::new("c")),
        ];
        let err = Switch::new("switch", params, cases).unwrap_err();
        assert!(err.to_string().contains("need 1 or 2 cases, got 3"));
    }
}
