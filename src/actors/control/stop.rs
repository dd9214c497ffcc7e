/// Stops the whole flow
use crate::runtime::{
    actor::{Actor, ActorCore},
    context::FlowContext,
    error::ActorResult,
    token::{DataType, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopParams {
    /// Reason reported with the stop
    #[serde(default)]
    pub message: Option<String>,
}

/// Consumes a token (or runs standalone) and stops the flow
#[derive(Debug)]
pub struct Stop {
    core: ActorCore,
    params: StopParams,
}

impl Stop {
    pub fn new(name: impl Into<String>, params: StopParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
        }
    }
}

#[async_trait]
impl Actor for Stop {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "stop"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn accept_input(&mut self, _token: Token) -> ActorResult<()> {
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let message = self
            .params
            .message
            .clone()
            .unwrap_or_else(|| format!("stopped by '{}'", self.core.full_name()));
        ctx.stop_flow(message);
        Ok(())
    }
}
