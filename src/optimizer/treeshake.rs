//! Tree shaking (core spec §4.3): removes steps unreachable from the output
//! template, preserving side-effecting steps even if nothing reads their
//! value, since their execution is itself an observable effect.

use std::collections::HashSet;

use crate::error::Result;
use crate::plan::OperationPlan;
use crate::step::{StepFlags, StepId};

pub fn run(plan: &mut OperationPlan) -> Result<bool> {
    let mut live = HashSet::new();

    if let Some(template) = &plan.output_template {
        let mut roots = Vec::new();
        template.referenced_steps(&mut roots);
        for root in roots {
            mark_live(plan, plan.arena.resolve(root), &mut live);
        }
    }
    for id in plan.arena.live_ids() {
        if plan.arena.resolve(id) != id {
            continue;
        }
        if plan.arena.step(id).flags().contains(StepFlags::SIDE_EFFECTING) {
            mark_live(plan, id, &mut live);
        }
    }

    let mut changed = false;
    let all_ids: Vec<StepId> = plan.arena.live_ids().collect();
    for id in all_ids {
        let canonical = plan.arena.resolve(id);
        if !live.contains(&canonical) {
            let layer = plan.arena.layer_of(id);
            if let Some(pos) = plan.layers.get(layer).steps.iter().position(|s| *s == id) {
                plan.layers.get_mut(layer).steps.remove(pos);
            }
            plan.arena.remove(id);
            changed = true;
        }
    }
    Ok(changed)
}

fn mark_live(plan: &mut OperationPlan, id: StepId, live: &mut HashSet<StepId>) {
    if !live.insert(id) {
        return;
    }
    let deps: Vec<StepId> = plan.arena.step(id).dependencies().to_vec();
    for dep in deps {
        let resolved = plan.arena.resolve(dep);
        mark_live(plan, resolved, live);
    }
}
