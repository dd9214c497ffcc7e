/// Transformers: one token in, one token out
use crate::runtime::{
    actor::{Actor, ActorCore},
    container::{ContainerKind, ContainerValue},
    context::FlowContext,
    error::{ActorError, ActorResult},
    token::{DataType, Payload, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Forwards tokens unchanged
#[derive(Debug)]
pub struct PassThrough {
    core: ActorCore,
    token: Option<Token>,
}

impl PassThrough {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ActorCore::new(name),
            token: None,
        }
    }
}

#[async_trait]
impl Actor for PassThrough {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "pass_through"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.token = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        self.token.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.token.take()
    }

    fn on_wrap_up(&mut self) {
        self.token = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerValuePickerParams {
    pub key: String,
}

/// Extracts the value stored under one key of a container
#[derive(Debug)]
pub struct ContainerValuePicker {
    core: ActorCore,
    params: ContainerValuePickerParams,
    input: Option<Token>,
    output: Option<Token>,
}

impl ContainerValuePicker {
    pub fn new(name: impl Into<String>, params: ContainerValuePickerParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            input: None,
            output: None,
        }
    }
}

fn into_payload(value: &ContainerValue) -> Payload {
    match value {
        ContainerValue::Instance(instance) => Payload::Instance(instance.clone()),
        ContainerValue::Integer(i) => Payload::Integer(*i),
        ContainerValue::Double(d) => Payload::Double(*d),
        ContainerValue::Text(s) => Payload::Text(s.clone()),
        ContainerValue::Model(_) | ContainerValue::Distribution(_) => Payload::Json(value.to_json()),
    }
}

#[async_trait]
impl Actor for ContainerValuePicker {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "container_value_picker"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Container(ContainerKind::Clustering)]
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        if self.params.key.is_empty() {
            return Err(ActorError::configuration(self.core.full_name(), "no key given"));
        }
        Ok(())
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        let actor = self.core.full_name();
        let Some(token) = self.input.take() else {
            return Err(ActorError::execution(actor, "no container to pick from"));
        };
        let Payload::Container(container) = token.payload() else {
            return Err(ActorError::execution(
                actor,
                format!("expected a container, got {}", token.data_type()),
            ));
        };

        let value = container
            .value(&self.params.key)
            .map_err(|e| ActorError::container(actor, e))?;
        self.output = Some(Token::new(into_payload(value)));
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
}
