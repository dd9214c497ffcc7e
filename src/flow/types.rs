/// Flow definition types
///
/// Flows are stored as JSON documents. A definition names the main chain of
/// actors and the event actors that `trigger_event` actors may execute.
/// Composite actors (`sub_process`, `tee`) nest their chains in `children`;
/// branching actors (`try_catch`, `if_then_else`, `switch`) list one child per
/// branch there.

use crate::runtime::context::ErrorHandling;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A complete flow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Unique flow identifier, also the storage file name (e.g. "cluster-stream")
    pub id: String,
    /// Human-readable name, used as the root of every actor's full name
    pub name: String,
    /// Overrides the server-wide default when set
    #[serde(default)]
    pub error_handling: Option<ErrorHandling>,
    /// Main chain, executed once per input token
    pub actors: Vec<ActorDefinition>,
    /// Event actors, referenced by name from `trigger_event`
    #[serde(default)]
    pub events: Vec<ActorDefinition>,
    /// Event run on its own after a run that ended with an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    /// Event run on its own after every run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_finish: Option<String>,
}

/// One actor of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDefinition {
    /// Unique among its siblings
    pub name: String,
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    /// Type-specific options, see the actor's `Params`
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub stop_flow_on_error: bool,
    /// Chain of a composite actor
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ActorDefinition>,
}

impl ActorDefinition {
    pub fn new(name: impl Into<String>, actor_type: ActorType, params: Value) -> Self {
        Self {
            name: name.into(),
            actor_type,
            params,
            skip: false,
            stop_flow_on_error: false,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ActorDefinition>) -> Self {
        self.children = children;
        self
    }

    pub fn stop_flow_on_error(mut self) -> Self {
        self.stop_flow_on_error = true;
        self
    }

    /// This actor and every nested child, depth first
    pub fn walk(&self) -> Vec<&ActorDefinition> {
        let mut all = vec![self];
        for child in &self.children {
            all.extend(child.walk());
        }
        all
    }
}

/// Every actor type the engine can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    // sources
    ForLoop,
    Constants,
    Command,
    // transformers
    PassThrough,
    ClusterData,
    PostProcessClustering,
    ContainerValuePicker,
    // sinks
    Null,
    DumpFile,
    // control
    SubProcess,
    Tee,
    TriggerEvent,
    Stop,
    TryCatch,
    IfThenElse,
    Switch,
}

impl ActorType {
    /// Types that own children
    pub fn is_composite(&self) -> bool {
        self.has_branches() || matches!(self, ActorType::SubProcess | ActorType::Tee)
    }

    /// Composites whose children are alternatives, not a chain
    pub fn has_branches(&self) -> bool {
        matches!(self, ActorType::TryCatch | ActorType::IfThenElse | ActorType::Switch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::ForLoop => "for_loop",
            ActorType::Constants => "constants",
            ActorType::Command => "command",
            ActorType::PassThrough => "pass_through",
            ActorType::ClusterData => "cluster_data",
            ActorType::PostProcessClustering => "post_process_clustering",
            ActorType::ContainerValuePicker => "container_value_picker",
            ActorType::Null => "null",
            ActorType::DumpFile => "dump_file",
            ActorType::SubProcess => "sub_process",
            ActorType::Tee => "tee",
            ActorType::TriggerEvent => "trigger_event",
            ActorType::Stop => "stop",
            ActorType::TryCatch => "try_catch",
            ActorType::IfThenElse => "if_then_else",
            ActorType::Switch => "switch",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
