/// Flow Management Layer
///
/// This module handles flow definitions, persistence and the hot-reload
/// registry:
/// - Type definitions (FlowDefinition, ActorDefinition, ActorType)
/// - JSON file persistence in a flows directory
/// - Lock-free hot-reload registry using ArcSwap, with validation

// Flow definition types
pub mod types;

// JSON file persistence for flow definitions
pub mod storage;

// Hot-reload registry using ArcSwap for zero-downtime updates
pub mod registry;

// Re-export commonly used types
pub use registry::{compile_flow, CompiledFlow, FlowRegistry};
pub use storage::FlowStorage;
pub use types::{ActorDefinition, ActorType, FlowDefinition};
