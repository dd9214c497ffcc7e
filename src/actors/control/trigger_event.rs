/// Executes a named event actor as a side effect
use crate::runtime::{
    actor::{Actor, ActorCore, SharedActor},
    context::FlowContext,
    director::handle_error,
    error::{ActorError, ActorResult},
    token::{DataType, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEventParams {
    /// Name of the event actor to execute
    pub event: String,
}

/// Runs an event actor defined elsewhere in the flow, then forwards its input
///
/// The event is looked up once during set-up. Stopping the trigger also stops
/// the event. The event's output is discarded. If the event fails and the
/// failure does not stop the flow, the token is forwarded anyway.
#[derive(Debug)]
pub struct TriggerEvent {
    core: ActorCore,
    params: TriggerEventParams,
    event: Option<SharedActor>,
    input: Option<Token>,
    output: Option<Token>,
}

impl TriggerEvent {
    pub fn new(name: impl Into<String>, params: TriggerEventParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            event: None,
            input: None,
            output: None,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.params.event
    }
}

#[async_trait]
impl Actor for TriggerEvent {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "trigger_event"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    async fn configure(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let event = ctx
            .event(&self.params.event)
            .ok_or_else(|| ActorError::resolution(self.core.full_name(), &self.params.event))?;

        let event_stop = match event.try_lock() {
            Ok(actor) => actor.stop_handle(),
            Err(_) => {
                return Err(ActorError::execution(
                    self.core.full_name(),
                    format!("event '{}' is busy during set-up", self.params.event),
                ))
            }
        };
        self.core.stop_handle().link(event_stop);
        tracing::debug!("🔗 '{}' resolved event '{}'", self.core.full_name(), self.params.event);
        self.event = Some(event);
        Ok(())
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let event = self.event.clone().ok_or_else(|| {
            ActorError::execution(self.core.full_name(), format!("event '{}' not resolved", self.params.event))
        })?;
        let mut guard = event.try_lock().map_err(|_| {
            ActorError::execution(
                self.core.full_name(),
                format!("event '{}' is already executing", self.params.event),
            )
        })?;

        ctx.notify_pre_execute(guard.full_name());
        let result = guard.execute(ctx).await;
        ctx.notify_post_execute(guard.full_name());
        while guard.output().is_some() {}

        if let Err(e) = result {
            handle_error(&self.core, &**guard, e, ctx)?;
        }
        drop(guard);

        self.output = self.input.take();
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }

    fn on_wrap_up(&mut self) {
        self.input = None;
        self.output = None;
    }

    fn on_clean_up(&mut self) {
        self.event = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor::{shared, testing::Recorder};
    use crate::runtime::listener::{ExecutionEvent, RecordingListener};
    use crate::runtime::token::Payload;
    use std::sync::{atomic::Ordering, Arc};

    async fn set_up_event(ctx: &FlowContext, name: &str) {
        let event = ctx.event(name).unwrap();
        event.lock().await.set_up(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_event_fails_set_up_naming_it() {
        let ctx = FlowContext::detached("flow");
        let mut trigger = TriggerEvent::new("trigger", TriggerEventParams { event: "nightly".into() });

        let err = trigger.set_up(&ctx).await.unwrap_err();

        assert!(matches!(err, ActorError::Resolution { .. }));
        assert!(err.to_string().contains("nightly"));
    }

    #[tokio::test]
    async fn executes_event_between_listener_hooks_and_passes_input() {
        let listener = Arc::new(RecordingListener::new());
        let recorder = Recorder::new("evt");
        let runs = recorder.executions.clone();
        let ctx = FlowContext::builder("flow")
            .event("evt", shared(Box::new(recorder)))
            .listener(listener.clone())
            .build();
        set_up_event(&ctx, "evt").await;

        let mut trigger = TriggerEvent::new("trigger", TriggerEventParams { event: "evt".into() });
        trigger.set_up(&ctx).await.unwrap();
        trigger.input(Token::new(Payload::Integer(42))).unwrap();
        trigger.execute(&ctx).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            listener.execute_events(),
            vec![
                ExecutionEvent::PreExecute("evt".into()),
                ExecutionEvent::PostExecute("evt".into()),
            ]
        );
        assert_eq!(trigger.output().unwrap().payload(), &Payload::Integer(42));
    }

    #[tokio::test]
    async fn recoverable_event_error_still_passes_token() {
        let ctx = FlowContext::builder("flow")
            .event("evt", shared(Box::new(Recorder::failing("evt", "flaky"))))
            .build();
        set_up_event(&ctx, "evt").await;

        let mut trigger = TriggerEvent::new("trigger", TriggerEventParams { event: "evt".into() });
        trigger.set_up(&ctx).await.unwrap();
        trigger.input(Token::new(Payload::Boolean(true))).unwrap();
        trigger.execute(&ctx).await.unwrap();

        assert!(trigger.has_pending_output());
        assert_eq!(ctx.log_entries()[0].source, "evt");
        assert!(!ctx.is_flow_stopped());
    }

    #[tokio::test]
    async fn fatal_event_error_stops_flow() {
        let ctx = FlowContext::builder("flow")
            .event("evt", shared(Box::new(Recorder::failing("evt", "fatal").stop_on_error())))
            .build();
        set_up_event(&ctx, "evt").await;

        let mut trigger = TriggerEvent::new("trigger", TriggerEventParams { event: "evt".into() });
        trigger.set_up(&ctx).await.unwrap();
        trigger.input(Token::new(Payload::Boolean(true))).unwrap();

        assert!(trigger.execute(&ctx).await.is_err());
        assert!(ctx.is_flow_stopped());
        assert!(!trigger.has_pending_output());
    }

    #[tokio::test]
    async fn stopping_trigger_stops_event() {
        let ctx = FlowContext::builder("flow")
            .event("evt", shared(Box::new(Recorder::new("evt"))))
            .build();
        set_up_event(&ctx, "evt").await;

        let mut trigger = TriggerEvent::new("trigger", TriggerEventParams { event: "evt".into() });
        trigger.set_up(&ctx).await.unwrap();
        trigger.stop_execution();

        assert!(ctx.event("evt").unwrap().lock().await.stop_handle().is_stopped());
    }

    #[tokio::test]
    async fn busy_event_is_an_execution_error() {
        let ctx = FlowContext::builder("flow")
            .event("evt", shared(Box::new(Recorder::new("evt"))))
            .build();
        set_up_event(&ctx, "evt").await;
        let mut trigger = TriggerEvent::new("trigger", TriggerEventParams { event: "evt".into() });
        trigger.set_up(&ctx).await.unwrap();

        let event = ctx.event("evt").unwrap();
        let _busy = event.lock().await;
        trigger.input(Token::new(Payload::Integer(1))).unwrap();
        let err = trigger.execute(&ctx).await.unwrap_err();

        assert!(err.to_string().contains("already executing"));
    }
}
