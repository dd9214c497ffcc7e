/// Source actors producing tokens without input
use crate::runtime::{
    actor::{Actor, ActorCore},
    context::FlowContext,
    error::{ActorError, ActorResult},
    token::{DataType, Payload, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

fn default_start() -> i64 {
    1
}

fn default_end() -> i64 {
    10
}

fn default_step() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForLoopParams {
    #[serde(default = "default_start")]
    pub start: i64,
    /// Inclusive upper (or lower, for negative steps) bound
    #[serde(default = "default_end")]
    pub end: i64,
    #[serde(default = "default_step")]
    pub step: i64,
}

impl Default for ForLoopParams {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            step: default_step(),
        }
    }
}

/// Emits the integers from `start` to `end` (inclusive) one token at a time
#[derive(Debug)]
pub struct ForLoop {
    core: ActorCore,
    params: ForLoopParams,
    current: Option<i64>,
}

impl ForLoop {
    pub fn new(name: impl Into<String>, params: ForLoopParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            current: None,
        }
    }

    fn in_range(&self, value: i64) -> bool {
        if self.params.step > 0 {
            value <= self.params.end
        } else {
            value >= self.params.end
        }
    }
}

#[async_trait]
impl Actor for ForLoop {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "for_loop"
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Integer]
    }

    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        if self.params.step == 0 {
            return Err(ActorError::configuration(self.core.full_name(), "step must not be 0"));
        }
        Ok(())
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        self.current = Some(self.params.start);
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        !self.core.is_stopped() && self.current.is_some_and(|v| self.in_range(v))
    }

    fn output(&mut self) -> Option<Token> {
        let value = self.current.filter(|v| self.in_range(*v))?;
        self.current = value.checked_add(self.params.step);
        Some(Token::new(Payload::Integer(value)))
    }

    fn on_wrap_up(&mut self) {
        self.current = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantsParams {
    /// JSON values, converted like run inputs
    pub values: Vec<Value>,
}

/// Emits a fixed list of values
#[derive(Debug)]
pub struct Constants {
    core: ActorCore,
    params: ConstantsParams,
    queue: VecDeque<Token>,
}

impl Constants {
    pub fn new(name: impl Into<String>, params: ConstantsParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            queue: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Actor for Constants {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "constants"
    }

    /// The common type of all values, `Unknown` when they differ
    fn generates(&self) -> Vec<DataType> {
        let mut types = self
            .params
            .values
            .iter()
            .map(|v| Payload::from_json(v.clone()).data_type());
        match types.next() {
            Some(first) if types.all(|t| t == first) => vec![first],
            _ => vec![DataType::Unknown],
        }
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        self.queue = self
            .params
            .values
            .iter()
            .map(|v| Token::new(Payload::from_json(v.clone())))
            .collect();
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        !self.queue.is_empty()
    }

    fn output(&mut self) -> Option<Token> {
        self.queue.pop_front()
    }

    fn on_wrap_up(&mut self) {
        self.queue.clear();
    }
}
