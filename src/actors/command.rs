/// External command source
///
/// Runs a program and emits each line of its standard output as a text token.
/// The process is raced against the actor's stop handle and an optional
/// timeout; whichever fires first kills the process.

use crate::runtime::{
    actor::{Actor, ActorCore},
    context::FlowContext,
    error::{ActorError, ActorResult},
    token::{DataType, Payload, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, path::PathBuf, process::Stdio, time::Duration};

fn default_fail_on_error() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandParams {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Overrides the flow-wide command timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Treat a non-zero exit status as an execution error
    #[serde(default = "default_fail_on_error")]
    pub fail_on_error: bool,
}

#[derive(Debug)]
pub struct Command {
    core: ActorCore,
    params: CommandParams,
    queue: VecDeque<Token>,
}

impl Command {
    pub fn new(name: impl Into<String>, params: CommandParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            queue: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Actor for Command {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "command"
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Text]
    }

    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        if self.params.program.trim().is_empty() {
            return Err(ActorError::configuration(self.core.full_name(), "no program given"));
        }
        if self.params.timeout_ms == Some(0) {
            return Err(ActorError::configuration(self.core.full_name(), "timeout must be positive"));
        }
        Ok(())
    }

    async fn do_execute(&mut self, ctx: &FlowContext) -> ActorResult<()> {
        let actor = self.core.full_name().to_string();
        let mut command = tokio::process::Command::new(&self.params.program);
        command
            .args(&self.params.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.params.working_dir {
            command.current_dir(dir);
        }

        tracing::info!("🚀 '{}' running {} {:?}", actor, self.params.program, self.params.args);
        let child = command.spawn().map_err(|e| {
            ActorError::execution(&actor, format!("cannot start '{}': {}", self.params.program, e))
        })?;

        let timeout = self
            .params
            .timeout_ms
            .map(Duration::from_millis)
            .or(ctx.settings().command_timeout.filter(|t| !t.is_zero()));
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        let stop = self.core.stop_handle().clone();

        // dropping the losing branch drops the child, which kills it
        let output = tokio::select! {
            result = child.wait_with_output() => result
                .map_err(|e| ActorError::execution(&actor, format!("waiting for process failed: {}", e)))?,
            _ = stop.stopped() => {
                tracing::warn!("🛑 '{}' killed {} on stop", actor, self.params.program);
                return Err(ActorError::Stopped {
                    actor,
                    message: Some(format!("'{}' terminated", self.params.program)),
                });
            }
            _ = deadline => {
                tracing::warn!("⏰ '{}' killed {} after {:?}", actor, self.params.program, timeout);
                return Err(ActorError::execution(
                    &actor,
                    format!("'{}' timed out after {:?}", self.params.program, timeout.unwrap_or_default()),
                ));
            }
        };

        if !output.status.success() && self.params.fail_on_error {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ActorError::execution(
                &actor,
                format!("'{}' exited with {}: {}", self.params.program, output.status, stderr.trim()),
            ));
        }

        self.queue = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| Token::new(Payload::Text(line.to_string())))
            .collect();
        tracing::debug!("'{}' produced {} line(s)", actor, self.queue.len());
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
