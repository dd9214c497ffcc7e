/// Sinks: consume tokens, produce nothing
use crate::runtime::{
    actor::{Actor, ActorCore},
    context::FlowContext,
    error::{ActorError, ActorResult},
    token::{DataType, Payload, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Swallows every token
#[derive(Debug)]
pub struct Null {
    core: ActorCore,
}

impl Null {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ActorCore::new(name),
        }
    }
}

#[async_trait]
impl Actor for Null {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "null"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    fn accept_input(&mut self, _token: Token) -> ActorResult<()> {
        Ok(())
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpFileParams {
    pub path: PathBuf,
    /// Keep existing content instead of truncating on the first write of a run
    #[serde(default)]
    pub append: bool,
}

/// Writes one line per token to a file
///
/// Text is written verbatim, every other payload as compact JSON.
#[derive(Debug)]
pub struct DumpFile {
    core: ActorCore,
    params: DumpFileParams,
    input: Option<Token>,
    written: bool,
}

impl DumpFile {
    pub fn new(name: impl Into<String>, params: DumpFileParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            input: None,
            written: false,
        }
    }
}

#[async_trait]
impl Actor for DumpFile {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "dump_file"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Unknown]
    }

    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        if self.params.path.as_os_str().is_empty() {
            return Err(ActorError::configuration(self.core.full_name(), "no output file given"));
        }
        self.written = false;
        Ok(())
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        self.input = Some(token);
        Ok(())
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        let actor = self.core.full_name();
        let Some(token) = self.input.take() else {
            return Err(ActorError::execution(actor, "nothing to write"));
        };
        let line = match token.payload() {
            Payload::Text(s) => s.clone(),
            other => other.to_json().to_string(),
        };

        let append = self.params.append || self.written;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&self.params.path)
            .await
            .map_err(|e| {
                ActorError::execution(actor, format!("cannot open {}: {}", self.params.path.display(), e))
            })?;
        file.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| ActorError::execution(actor, format!("write failed: {}", e)))?;
        self.written = true;
        Ok(())
    }

    fn on_wrap_up(&mut self) {
        self.input = None;
    }
}
