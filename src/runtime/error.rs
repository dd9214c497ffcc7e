/// Error taxonomy for the actor pipeline
///
/// Every lifecycle call returns an `ActorResult`. The variants mirror the
/// failure classes of the pipeline: configuration problems and unresolved
/// references surface during `set_up`, everything else during `execute`.
/// Composite actors hand errors of their children upwards unchanged.

use crate::runtime::container::ContainerError;
use thiserror::Error;

/// Result type returned by every actor lifecycle operation
pub type ActorResult<T> = Result<T, ActorError>;

/// Failure raised by an actor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActorError {
    /// Invalid option value, detected while setting up
    #[error("{actor}: invalid configuration: {message}")]
    Configuration { actor: String, message: String },

    /// A referenced actor could not be found
    #[error("{actor}: cannot resolve referenced actor '{reference}'")]
    Resolution { actor: String, reference: String },

    /// Failure while processing a token
    #[error("{actor}: {message}")]
    Execution { actor: String, message: String },

    /// A container did not satisfy the consumer's contract
    #[error("{actor}: {source}")]
    Container {
        actor: String,
        #[source]
        source: ContainerError,
    },

    /// Token type not in the actor's `accepts()` list
    #[error("{actor}: cannot accept token of type {actual}, accepts: {expected}")]
    InputType {
        actor: String,
        actual: String,
        expected: String,
    },

    /// `execute` was called while the actor was already executing
    #[error("{actor}: already executing")]
    Reentrant { actor: String },

    /// A lifecycle call arrived in a state that does not allow it
    #[error("{actor}: cannot {operation} while {state}")]
    Lifecycle {
        actor: String,
        operation: &'static str,
        state: String,
    },

    /// Execution was interrupted by `stop_execution`
    #[error("{actor}: stopped{}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Stopped {
        actor: String,
        message: Option<String>,
    },
}

impl ActorError {
    pub fn configuration(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            actor: actor.into(),
            message: message.into(),
        }
    }

    pub fn resolution(actor: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Resolution {
            actor: actor.into(),
            reference: reference.into(),
        }
    }

    pub fn execution(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            actor: actor.into(),
            message: message.into(),
        }
    }

    pub fn container(actor: impl Into<String>, source: ContainerError) -> Self {
        Self::Container {
            actor: actor.into(),
            source,
        }
    }

    /// Name of the actor that raised the error
    pub fn actor(&self) -> &str {
        match self {
            Self::Configuration { actor, .. }
            | Self::Resolution { actor, .. }
            | Self::Execution { actor, .. }
            | Self::Container { actor, .. }
            | Self::InputType { actor, .. }
            | Self::Reentrant { actor }
            | Self::Lifecycle { actor, .. }
            | Self::Stopped { actor, .. } => actor,
        }
    }

    /// Short category label, used for log entries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Resolution { .. } => "resolution",
            Self::Execution { .. } | Self::Container { .. } | Self::InputType { .. } => "execution",
            Self::Reentrant { .. } | Self::Lifecycle { .. } => "lifecycle",
            Self::Stopped { .. } => "stopped",
        }
    }
}
