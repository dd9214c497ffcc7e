/// Actor factory
///
/// Maps an `ActorDefinition` to a boxed actor. The set of types is fixed at
/// compile time by `ActorType`; each actor parses its own typed params from the
/// definition's JSON `params` object.

use crate::actors::{
    command::{Command, CommandParams},
    control::{
        IfThenElse, IfThenElseParams, Stop, StopParams, SubProcess, Switch, SwitchParams, Tee,
        TriggerEvent, TriggerEventParams, TryCatch, TryCatchParams,
    },
    sink::{DumpFile, DumpFileParams, Null},
    source::{Constants, ConstantsParams, ForLoop, ForLoopParams},
    transformer::{ContainerValuePicker, ContainerValuePickerParams, PassThrough},
};
use crate::clustering::actors::{
    ClusterData, ClusterDataParams, PostProcessClustering, PostProcessClusteringParams,
};
use crate::flow::types::{ActorDefinition, ActorType};
use crate::runtime::{
    actor::Actor,
    error::{ActorError, ActorResult},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse the definition's params into the actor's typed options
fn params<P: DeserializeOwned>(def: &ActorDefinition) -> ActorResult<P> {
    let value = match &def.params {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| {
        ActorError::configuration(&def.name, format!("invalid params for {}: {}", def.actor_type, e))
    })
}

/// Build an actor (and its children) from a definition
pub fn build_actor(def: &ActorDefinition) -> ActorResult<Box<dyn Actor>> {
    if !def.children.is_empty() && !def.actor_type.is_composite() {
        return Err(ActorError::configuration(
            &def.name,
            format!("{} does not take children", def.actor_type),
        ));
    }

    let name = def.name.clone();
    let mut actor: Box<dyn Actor> = match def.actor_type {
        ActorType::ForLoop => Box::new(ForLoop::new(name, params::<ForLoopParams>(def)?)),
        ActorType::Constants => Box::new(Constants::new(name, params::<ConstantsParams>(def)?)),
        ActorType::Command => Box::new(Command::new(name, params::<CommandParams>(def)?)),
        ActorType::PassThrough => Box::new(PassThrough::new(name)),
        ActorType::ClusterData => Box::new(ClusterData::new(name, params::<ClusterDataParams>(def)?)),
        ActorType::PostProcessClustering => Box::new(PostProcessClustering::new(
            name,
            params::<PostProcessClusteringParams>(def)?,
        )),
        ActorType::ContainerValuePicker => Box::new(ContainerValuePicker::new(
            name,
            params::<ContainerValuePickerParams>(def)?,
        )),
        ActorType::Null => Box::new(Null::new(name)),
        ActorType::DumpFile => Box::new(DumpFile::new(name, params::<DumpFileParams>(def)?)),
        ActorType::SubProcess => Box::new(SubProcess::new(name, build_chain(&def.children)?)),
        ActorType::Tee => Box::new(Tee::new(name, build_chain(&def.children)?)),
        ActorType::TriggerEvent => Box::new(TriggerEvent::new(name, params::<TriggerEventParams>(def)?)),
        ActorType::Stop => Box::new(Stop::new(name, params::<StopParams>(def)?)),
        ActorType::TryCatch => Box::new(TryCatch::new(
            name,
            params::<TryCatchParams>(def)?,
            build_chain(&def.children)?,
        )?),
        ActorType::IfThenElse => Box::new(IfThenElse::new(
            name,
            params::<IfThenElseParams>(def)?,
            build_chain(&def.children)?,
        )?),
        ActorType::Switch => Box::new(Switch::new(
            name,
            params::<SwitchParams>(def)?,
            build_chain(&def.children)?,
        )?),
    };

    actor.core_mut().set_skip(def.skip);
    actor.core_mut().set_stop_flow_on_error(def.stop_flow_on_error);
    Ok(actor)
}

/// Build a chain of sibling actors in definition order
pub fn build_chain(defs: &[ActorDefinition]) -> ActorResult<Vec<Box<dyn Actor>>> {
    defs.iter().map(build_actor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::token::DataType;
    use serde_json::json;

    #[test]
    fn builds_typed_actor_with_options() {
        let mut def = ActorDefinition::new(
            "cluster",
            ActorType::ClusterData,
            json!({"clusterer": {"algorithm": "kmeans", "centroids": [[0.0], [1.0]]}, "update_model": true}),
        );
        def.skip = true;

        let actor = build_actor(&def).unwrap();

        assert_eq!(actor.type_name(), "cluster_data");
        assert!(actor.core().skip());
        assert_eq!(actor.accepts(), vec![DataType::Instance]);
    }

    #[test]
    fn missing_params_use_defaults() {
        let actor = build_actor(&ActorDefinition::new("loop", ActorType::ForLoop, Value::Null)).unwrap();
        assert_eq!(actor.generates(), vec![DataType::Integer]);
    }

    #[test]
    fn bad_params_name_the_actor_type() {
        let def = ActorDefinition::new("trigger", ActorType::TriggerEvent, json!({"evt": "x"}));
        let err = build_actor(&def).unwrap_err();
        assert!(matches!(err, ActorError::Configuration { .. }));
        assert!(err.to_string().contains("trigger_event"));
    }

    #[test]
    fn children_only_for_composites() {
        let def = ActorDefinition::new("pt", ActorType::PassThrough, Value::Null)
            .with_children(vec![ActorDefinition::new("x", ActorType::Null, Value::Null)]);
        assert!(build_actor(&def).is_err());

        let sub = ActorDefinition::new("sub", ActorType::SubProcess, Value::Null)
            .with_children(vec![ActorDefinition::new("x", ActorType::PassThrough, Value::Null)]);
        assert_eq!(build_actor(&sub).unwrap().accepts(), vec![DataType::Unknown]);
    }

    #[test]
    fn branching_actors_need_their_branches() {
        let pass = |name: &str| ActorDefinition::new(name, ActorType::PassThrough, Value::Null);
        let condition = json!({ "condition": { "type": "is_true" } });

        let def = ActorDefinition::new("ite", ActorType::IfThenElse, condition.clone())
            .with_children(vec![pass("then"), pass("else")]);
        assert_eq!(build_actor(&def).unwrap().type_name(), "if_then_else");

        let def = ActorDefinition::new("ite", ActorType::IfThenElse, condition)
            .with_children(vec![pass("then")]);
        let err = build_actor(&def).unwrap_err();
        assert!(err.to_string().contains("missing branch 'else'"));

        let def = ActorDefinition::new("tc", ActorType::TryCatch, Value::Null)
            .with_children(vec![pass("try"), pass("catch")]);
        assert_eq!(build_actor(&def).unwrap().accepts(), vec![DataType::Unknown]);
    }
}
