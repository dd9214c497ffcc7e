/// Sequential director
///
/// Drives a chain of actors: tokens produced by one actor are handed to the
/// next one, depth first. Actors that still hold output are revisited before
/// sources are asked for more data, and sources are re-executed until they
/// report `is_finished`. Tokens leaving the last actor of the chain are kept
/// as the chain's final output.

use crate::runtime::{
    actor::{Actor, ActorCore},
    context::{ErrorHandling, FlowContext},
    error::{ActorError, ActorResult},
    token::Token,
};
use std::collections::VecDeque;

/// Executes a chain of actors owned by a composite
#[derive(Debug, Default)]
pub struct SequentialDirector {
    /// Tokens that left the last actor of the chain
    final_output: VecDeque<Token>,
    /// Whether tokens from the last actor are kept
    record_output: bool,
}

impl SequentialDirector {
    pub fn new(record_output: bool) -> Self {
        Self {
            final_output: VecDeque::new(),
            record_output,
        }
    }

    pub fn has_output(&self) -> bool {
        !self.final_output.is_empty()
    }

    pub fn take_output(&mut self) -> Option<Token> {
        self.final_output.pop_front()
    }

    pub fn clear(&mut self) {
        self.final_output.clear();
    }

    /// Run the chain until every source is finished and no output is pending
    ///
    /// `input`, if given, is fed to the first active actor. Fatal errors are
    /// returned unchanged; recoverable ones are logged and the token of that
    /// cycle is dropped.
    pub async fn execute(
        &mut self,
        owner: &ActorCore,
        actors: &mut [Box<dyn Actor>],
        input: Option<Token>,
        ctx: &FlowContext,
    ) -> ActorResult<()> {
        let active: Vec<usize> = actors
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.core().skip())
            .map(|(i, _)| i)
            .collect();
        let (Some(&first), Some(&last)) = (active.first(), active.last()) else {
            tracing::debug!("'{}' has no active actors", owner.full_name());
            return Ok(());
        };

        let mut pending: Vec<usize> = Vec::new();
        let mut not_finished: Option<usize> = Some(first);
        let mut input = input;

        loop {
            if owner.is_stopped() || ctx.is_flow_stopped() {
                break;
            }

            // resume at the actor holding more output, else at the first unfinished one
            let start = match pending.last() {
                Some(&index) => index,
                None => match not_finished.take() {
                    Some(index) => index,
                    None => break,
                },
            };
            tracing::trace!("🔄 '{}' iteration starting at index {}", owner.full_name(), start);

            let mut token = input.take();
            for &i in active.iter().filter(|&&i| i >= start) {
                if owner.is_stopped() || ctx.is_flow_stopped() {
                    break;
                }
                let actor = &mut actors[i];

                match token.take() {
                    None => {
                        if actor.is_output_producer() && actor.has_pending_output() {
                            pending.pop();
                            tracing::trace!("'{}' holds another output token", actor.full_name());
                        } else {
                            if let Err(e) = execute_actor(actor.as_mut(), ctx).await {
                                handle_error(owner, actor.as_ref(), e, ctx)?;
                            }
                            if !actor.is_finished() && not_finished.is_none() {
                                not_finished = Some(i);
                            }
                        }

                        if actor.is_output_producer() && actor.has_pending_output() {
                            token = output_actor(actor.as_mut(), ctx);
                            if actor.has_pending_output() {
                                pending.push(i);
                            }
                        }
                        if actor.is_output_producer() && token.is_none() {
                            tracing::trace!("No token from '{}', skipping rest of chain", actor.full_name());
                            break;
                        }
                    }
                    Some(current) => {
                        if let Err(e) = input_actor(actor.as_mut(), current, ctx) {
                            handle_error(owner, actor.as_ref(), e, ctx)?;
                            break;
                        }
                        if let Err(e) = execute_actor(actor.as_mut(), ctx).await {
                            handle_error(owner, actor.as_ref(), e, ctx)?;
                        }
                        if !actor.is_finished() && not_finished.is_none() {
                            not_finished = Some(i);
                        }

                        if actor.is_output_producer() && actor.has_pending_output() {
                            token = output_actor(actor.as_mut(), ctx);
                            if actor.has_pending_output() {
                                pending.push(i);
                            }
                        }
                        if token.is_none() {
                            break;
                        }
                    }
                }

                if i == last {
                    if let Some(done) = token.take() {
                        if self.record_output {
                            self.final_output.push_back(done);
                        }
                    }
                }
            }

            if not_finished.is_none() && pending.is_empty() {
                break;
            }
        }

        Ok(())
    }
}

/// Execute one actor wrapped in the listener hooks
pub async fn execute_actor(actor: &mut dyn Actor, ctx: &FlowContext) -> ActorResult<()> {
    ctx.notify_pre_execute(actor.full_name());
    let result = actor.execute(ctx).await;
    ctx.notify_post_execute(actor.full_name());
    result
}

fn input_actor(actor: &mut dyn Actor, token: Token, ctx: &FlowContext) -> ActorResult<()> {
    ctx.notify_pre_input(actor.full_name(), &token);
    let result = actor.input(token);
    ctx.notify_post_input(actor.full_name());
    result
}

fn output_actor(actor: &mut dyn Actor, ctx: &FlowContext) -> Option<Token> {
    ctx.notify_pre_output(actor.full_name());
    let token = actor.output();
    if let Some(t) = &token {
        ctx.notify_post_output(actor.full_name(), t);
    }
    token
}

/// Decide whether an actor error stops the flow
///
/// Returns `Err` with the unchanged error if the flow has to stop, `Ok` if the
/// error was only logged and the current token is to be dropped. In a
/// catching context every error is returned as is.
pub fn handle_error(
    owner: &ActorCore,
    actor: &dyn Actor,
    error: ActorError,
    ctx: &FlowContext,
) -> ActorResult<()> {
    if ctx.is_flow_stopped() || owner.is_stopped() {
        // consequence of a stop that is already under way
        if matches!(error, ActorError::Stopped { .. }) {
            return Ok(());
        }
        return Err(error);
    }

    if ctx.catches_errors() {
        tracing::debug!("🪤 '{}' failed inside a catching scope: {}", actor.full_name(), error);
        return Err(error);
    }

    ctx.record_error(actor.full_name(), &error);
    let fatal = ctx.error_handling() == ErrorHandling::ActorsAlwaysStopOnError
        || actor.core().stop_flow_on_error();
    if fatal {
        tracing::error!("❌ {} (stopping flow)", error);
        ctx.stop_flow(error.to_string());
        Err(error)
    } else {
        tracing::warn!("⚠️ {} (token dropped)", error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor::{set_up_children, testing::Recorder};
    use crate::runtime::listener::{ExecutionEvent, RecordingListener};
    use crate::runtime::token::Payload;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    async fn chain(
        ctx: &FlowContext,
        recorders: Vec<Recorder>,
    ) -> (ActorCore, Vec<Box<dyn Actor>>) {
        let owner = ActorCore::new("Chain");
        let mut actors: Vec<Box<dyn Actor>> = recorders
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Actor>)
            .collect();
        set_up_children(&owner, &mut actors, ctx).await.unwrap();
        (owner, actors)
    }

    #[tokio::test]
    async fn input_travels_to_final_output() {
        let ctx = FlowContext::detached("flow");
        let (owner, mut actors) = chain(&ctx, vec![Recorder::new("a"), Recorder::new("b")]).await;
        let mut director = SequentialDirector::new(true);

        director
            .execute(&owner, &mut actors, Some(Token::new(Payload::Integer(7))), &ctx)
            .await
            .unwrap();

        assert_eq!(director.take_output().unwrap().payload(), &Payload::Integer(7));
        assert!(!director.has_output());
    }

    #[tokio::test]
    async fn fatal_error_prevents_later_actors() {
        let ctx = FlowContext::detached("flow");
        let first = Recorder::failing("a", "broken").stop_on_error();
        let second = Recorder::new("b");
        let second_runs = second.executions.clone();
        let (owner, mut actors) = chain(&ctx, vec![first, second]).await;
        let mut director = SequentialDirector::new(true);

        let err = director
            .execute(&owner, &mut actors, Some(Token::new(Payload::Integer(1))), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err, ActorError::execution("Chain.a", "broken"));
        assert_eq!(second_runs.load(Ordering::SeqCst), 0);
        assert!(ctx.is_flow_stopped());
        assert_eq!(ctx.log_entries().len(), 1);
    }

    #[tokio::test]
    async fn recoverable_error_drops_token_and_continues() {
        let ctx = FlowContext::detached("flow");
        let first = Recorder::failing("a", "bad record");
        let second = Recorder::new("b");
        let second_runs = second.executions.clone();
        let (owner, mut actors) = chain(&ctx, vec![first, second]).await;
        let mut director = SequentialDirector::new(true);

        director
            .execute(&owner, &mut actors, Some(Token::new(Payload::Integer(1))), &ctx)
            .await
            .unwrap();

        assert_eq!(second_runs.load(Ordering::SeqCst), 0);
        assert!(!director.has_output());
        assert!(!ctx.is_flow_stopped());
        assert_eq!(ctx.log_entries()[0].source, "Chain.a");
    }

    #[tokio::test]
    async fn catching_context_hands_errors_back() {
        let ctx = FlowContext::detached("flow");
        let first = Recorder::failing("a", "bad record");
        let second = Recorder::new("b");
        let second_runs = second.executions.clone();
        let (owner, mut actors) = chain(&ctx, vec![first, second]).await;
        let mut director = SequentialDirector::new(true);

        let err = director
            .execute(
                &owner,
                &mut actors,
                Some(Token::new(Payload::Integer(1))),
                &ctx.catching_errors(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, ActorError::execution("Chain.a", "bad record"));
        assert_eq!(second_runs.load(Ordering::SeqCst), 0);
        assert!(ctx.log_entries().is_empty());
        assert!(!ctx.is_flow_stopped());
    }

    #[tokio::test]
    async fn always_stop_mode_ignores_actor_flag() {
        let ctx = FlowContext::builder("flow")
            .error_handling(ErrorHandling::ActorsAlwaysStopOnError)
            .build();
        let (owner, mut actors) = chain(&ctx, vec![Recorder::failing("a", "x")]).await;
        let mut director = SequentialDirector::new(false);

        assert!(director.execute(&owner, &mut actors, None, &ctx).await.is_err());
        assert!(ctx.is_flow_stopped());
    }

    #[tokio::test]
    async fn listener_sees_pre_and_post_execute_in_order() {
        let listener = Arc::new(RecordingListener::new());
        let ctx = FlowContext::builder("flow").listener(listener.clone()).build();
        let (owner, mut actors) = chain(&ctx, vec![Recorder::new("a"), Recorder::new("b")]).await;
        let mut director = SequentialDirector::new(false);

        director.execute(&owner, &mut actors, None, &ctx).await.unwrap();

        assert_eq!(
            listener.execute_events(),
            vec![
                ExecutionEvent::PreExecute("Chain.a".into()),
                ExecutionEvent::PostExecute("Chain.a".into()),
                ExecutionEvent::PreExecute("Chain.b".into()),
                ExecutionEvent::PostExecute("Chain.b".into()),
            ]
        );
    }

    #[tokio::test]
    async fn skipped_actors_are_bypassed() {
        let ctx = FlowContext::detached("flow");
        let mut skipped = Recorder::new("skipped");
        skipped.core_mut().set_skip(true);
        let runs = skipped.executions.clone();
        let (owner, mut actors) = chain(&ctx, vec![Recorder::new("a"), skipped]).await;
        let mut director = SequentialDirector::new(true);

        director.execute(&owner, &mut actors, None, &ctx).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        // last active actor is "a", its output is the final output
        assert_eq!(director.take_output().unwrap().payload(), &Payload::Text("a".into()));
    }
}
