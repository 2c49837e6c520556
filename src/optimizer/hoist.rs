//! Hoisting (core spec §4.3): moves a step to its enclosing layer's parent
//! when none of its dependencies live strictly inside the current layer,
//! repeating until it reaches a layer it can't rise past. Side-effecting
//! steps are never hoisted, since hoisting could reorder them relative to
//! peers the document intended to keep together.

use crate::error::Result;
use crate::plan::layer::LayerId;
use crate::plan::OperationPlan;
use crate::step::{StepFlags, StepId};

pub fn run(plan: &mut OperationPlan) -> Result<bool> {
    let mut changed = false;
    let ids: Vec<StepId> = plan.arena.live_ids().collect();
    for id in ids {
        if plan.arena.resolve(id) != id {
            continue;
        }
        changed |= hoist_as_far_as_possible(plan, id);
    }
    Ok(changed)
}

fn hoist_as_far_as_possible(plan: &mut OperationPlan, id: StepId) -> bool {
    let mut changed = false;
    loop {
        let layer = plan.arena.layer_of(id);
        let Some(parent) = plan.layers.get(layer).parent else {
            break;
        };
        let step = plan.arena.step(id);
        if step.flags().contains(StepFlags::SIDE_EFFECTING) {
            break;
        }
        let can_rise = step
            .dependencies()
            .iter()
            .map(|dep| plan.arena.resolve(*dep))
            .all(|dep| plan.layers.is_same_or_ancestor(plan.arena.layer_of(dep), parent));
        if !can_rise {
            break;
        }
        move_step(plan, id, layer, parent);
        changed = true;
    }
    changed
}

fn move_step(plan: &mut OperationPlan, id: StepId, from: LayerId, to: LayerId) {
    if let Some(pos) = plan.layers.get(from).steps.iter().position(|s| *s == id) {
        plan.layers.get_mut(from).steps.remove(pos);
    }
    plan.layers.get_mut(to).steps.push(id);
    plan.arena.set_layer(id, to);
}
