/// actorflow: actor-based data-flow engine
///
/// This library provides a pipeline runtime where tokens flow through chains
/// of actors, with event actors, cooperative stopping, incremental
/// clustering and a hot-reloadable HTTP surface for stored flows.

// Core configuration and setup
pub mod config;

// Runtime - tokens, actor lifecycle, director, factory and engine
pub mod runtime;

// Built-in actor catalogue (sources, transformers, sinks, control actors)
pub mod actors;

// Incremental clusterers, post-processors and their actors
pub mod clustering;

// Flow management layer - definitions, storage and registry
pub mod flow;

// HTTP API layer - REST endpoints for flow management and runs
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use flow::{ActorDefinition, ActorType, FlowDefinition};
pub use runtime::{ExecutionEngine, ExecutionResult, Flow, Token};
pub use server::start_server;
