/// Actor runtime
///
/// This module provides the pieces every flow is made of:
/// - Tokens, payloads and typed containers
/// - The actor lifecycle and its error taxonomy
/// - Cooperative stop handles and execution listeners
/// - The sequential director that moves tokens along a chain
/// - The factory and the engine that builds and runs whole flows

pub mod actor;
pub mod container;
pub mod context;
pub mod director;
pub mod engine;
pub mod error;
pub mod factory;
pub mod listener;
pub mod stop;
pub mod token;

// Re-export main types
pub use actor::{Actor, ActorCore, ActorState, SharedActor};
pub use container::{Container, ContainerError, ContainerKind, ContainerValue, Key};
pub use context::{ErrorHandling, ExecutionSettings, FlowContext, LogEntry};
pub use director::SequentialDirector;
pub use engine::{ExecutionEngine, ExecutionResult, Flow, RunOptions};
pub use error::{ActorError, ActorResult};
pub use listener::{ExecutionEvent, FlowExecutionListener, RecordingListener, TracingListener};
pub use stop::StopHandle;
pub use token::{DataType, Instance, Payload, Token};
