/// Control actors: composites, branches, events and flow stops

pub mod condition;
pub mod if_then_else;
pub mod stop;
pub mod sub_process;
pub mod switch;
pub mod tee;
pub mod trigger_event;
pub mod try_catch;

pub use condition::{CompareOp, Condition};
pub use if_then_else::{IfThenElse, IfThenElseParams};
pub use stop::{Stop, StopParams};
pub use sub_process::SubProcess;
pub use switch::{Switch, SwitchParams};
pub use tee::Tee;
pub use trigger_event::{TriggerEvent, TriggerEventParams};
pub use try_catch::{CatchInput, TryCatch, TryCatchParams};

use crate::runtime::{
    actor::Actor,
    error::{ActorError, ActorResult},
    token::DataType,
};

/// Arrange children by their fixed branch names, e.g. `try` and `catch`
///
/// Every name has to be present exactly once and no other child is allowed.
fn named_branches(
    owner: &str,
    mut children: Vec<Box<dyn Actor>>,
    names: &[&str],
) -> ActorResult<Vec<Box<dyn Actor>>> {
    if let Some(extra) = children.iter().find(|c| !names.contains(&c.name())) {
        return Err(ActorError::configuration(
            owner,
            format!("unexpected branch '{}', expected {}", extra.name(), names.join(" and ")),
        ));
    }
    let mut branches = Vec::with_capacity(names.len());
    for name in names {
        let index = children
            .iter()
            .position(|c| c.name() == *name)
            .ok_or_else(|| ActorError::configuration(owner, format!("missing branch '{}'", name)))?;
        branches.push(children.remove(index));
    }
    Ok(branches)
}

/// Every type any of the branches can produce
fn combined_generates(branches: &[Box<dyn Actor>]) -> Vec<DataType> {
    let mut types = Vec::new();
    for branch in branches.iter().filter(|b| !b.core().skip()) {
        for t in branch.generates() {
            if !types.contains(&t) {
                types.push(t);
            }
        }
    }
    types
}

/// Branches get the token that reached the composite, so they must take input
fn require_input_consumers(owner: &str, branches: &[Box<dyn Actor>]) -> ActorResult<()> {
    match branches.iter().find(|b| !b.core().skip() && !b.is_input_consumer()) {
        Some(branch) => Err(ActorError::configuration(
            owner,
            format!("branch '{}' takes no input", branch.name()),
        )),
        None => Ok(()),
    }
}
