//! Inlining (core spec §4.3): folds a step flagged `INLINEABLE` into its
//! sole consumer. A generic pass over opaque `Box<dyn Step>` trait objects
//! can't fold arbitrary step kinds into each other — that's what
//! `Step::optimize` is for, on the step that knows its own shape — so this
//! pass performs the one fold it can see into directly: composing a chain of
//! two `KeyProjectionStep`s (core spec §4.8's worked example) into one.

use indexmap::IndexMap;

use crate::error::Result;
use crate::plan::OperationPlan;
use crate::step::key_projection::KeyProjectionStep;
use crate::step::{Step, StepFlags, StepId};

pub fn run(plan: &mut OperationPlan) -> Result<bool> {
    let mut changed = false;
    let consumers = reverse_dependencies(plan);
    let ids: Vec<StepId> = plan.arena.live_ids().collect();
    for inner in ids {
        if plan.arena.resolve(inner) != inner || !plan.arena.is_live(inner) {
            continue;
        }
        let Some(consumer_ids) = consumers.get(&inner) else { continue };
        let [outer] = consumer_ids.as_slice() else { continue };
        if fold_key_projection_chain(plan, inner, *outer) {
            changed = true;
        }
    }
    Ok(changed)
}

/// Maps each live step to the live steps that (resolved) depend on it.
fn reverse_dependencies(plan: &OperationPlan) -> std::collections::HashMap<StepId, Vec<StepId>> {
    let mut map: std::collections::HashMap<StepId, Vec<StepId>> = std::collections::HashMap::new();
    for id in plan.arena.live_ids() {
        for dep in plan.arena.step(id).dependencies() {
            map.entry(*dep).or_default().push(id);
        }
    }
    map
}

fn fold_key_projection_chain(plan: &mut OperationPlan, inner: StepId, outer: StepId) -> bool {
    let inner_step = plan.arena.step(inner);
    if !inner_step.flags().contains(StepFlags::INLINEABLE) {
        return false;
    }
    let Some(inner_kp) = inner_step.as_any().downcast_ref::<KeyProjectionStep>() else {
        return false;
    };
    let inner_mapping = inner_kp.mapping().clone();
    let inner_parent = inner_kp.parent();

    let outer_step = plan.arena.step(outer);
    let Some(outer_kp) = outer_step.as_any().downcast_ref::<KeyProjectionStep>() else {
        return false;
    };
    if outer_kp.parent() != inner {
        return false;
    }

    let mut composed = IndexMap::new();
    for (desired, through) in outer_kp.mapping() {
        let actual = inner_mapping.get(through).cloned().unwrap_or_else(|| through.clone());
        composed.insert(desired.clone(), actual);
    }

    *plan.arena.step_mut(outer) = Box::new(KeyProjectionStep::new(inner_parent, composed));
    true
}
