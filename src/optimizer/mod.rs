//! The optimizer (core spec §4.3): runs deduplication, hoisting, inlining,
//! and tree-shaking to a fixed point, then finalizes every surviving step.

pub mod dedup;
pub mod hoist;
pub mod inline;
pub mod treeshake;

use tracing::instrument;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::plan::{OperationPlan, PlanState};
use crate::step::{FinalizeContext, OptimizeContext, StepOptimization};

/// Repeats the five passes until none of them report a change, then runs
/// `finalize` on every surviving step and transitions the plan to
/// `Finalized`. Each pass strictly decreases a well-founded measure (step
/// count for dedup/tree-shake/per-step optimize, layer depth for hoist), so
/// this terminates.
#[instrument(skip(plan, config), fields(operation_name = plan.operation_name.as_deref()))]
pub fn optimize_to_fixed_point(plan: &mut OperationPlan, config: &EngineConfig) -> Result<()> {
    loop {
        let before = plan.arena.len();
        let deduped = dedup::run(plan)?;
        let hoisted = hoist::run(plan)?;
        let inlined = inline::run(plan)?;
        let self_optimized = optimize_steps(plan)?;
        let shaken = treeshake::run(plan)?;
        let changed = deduped || hoisted || inlined || self_optimized || shaken;
        if config.debug.explain {
            tracing::debug!(
                before,
                after = plan.arena.len(),
                deduped,
                hoisted,
                inlined,
                self_optimized,
                shaken,
                "optimizer pass"
            );
        }
        if !changed {
            break;
        }
    }
    finalize_survivors(plan)?;
    record_layer_boundaries(plan);
    plan.transition(PlanState::Finalized)?;
    Ok(())
}

/// Gives every surviving step a chance to request its own substitution (core
/// spec §4.3's implied fifth pass, alongside dedup/hoist/inline/tree-shake).
/// Runs after inlining (so a step sees its final dependency shape for this
/// iteration) and before tree-shaking (so a step this pass redirects away
/// from is reclaimed in the same iteration).
fn optimize_steps(plan: &mut OperationPlan) -> Result<bool> {
    let mut changed = false;
    let ids: Vec<_> = plan.arena.live_ids().filter(|id| plan.arena.resolve_ref(*id) == *id).collect();
    for id in ids {
        let layer = plan.arena.layer_of(id);
        let mut ctx = OptimizeContext { self_id: id, layer };
        match plan.arena.step_mut(id).optimize(&mut ctx) {
            StepOptimization::Unchanged => {}
            StepOptimization::ReplaceWith(target) => {
                plan.arena.redirect(id, target);
                changed = true;
            }
            StepOptimization::MarkInlineable => {
                changed = true;
            }
        }
    }
    Ok(changed)
}

fn finalize_survivors(plan: &mut OperationPlan) -> Result<()> {
    let ids: Vec<_> = plan.arena.live_ids().collect();
    for id in ids {
        let ctx = FinalizeContext { self_id: id };
        plan.arena.step_mut(id).finalize(&ctx)?;
    }
    Ok(())
}

/// Populates every `LayerPlan::input_steps`: for each surviving step, any
/// resolved dependency that lives in a strict ancestor layer is a value that
/// layer contributes across the boundary.
fn record_layer_boundaries(plan: &mut OperationPlan) {
    let ids: Vec<_> = plan.arena.live_ids().collect();
    let mut inputs: Vec<(crate::plan::layer::LayerId, crate::step::StepId)> = Vec::new();
    for id in &ids {
        let layer = plan.arena.layer_of(*id);
        for dep in plan.arena.step(*id).dependencies() {
            let resolved = plan.arena.resolve_ref(*dep);
            let dep_layer = plan.arena.layer_of(resolved);
            if plan.layers.is_strict_ancestor(dep_layer, layer) {
                inputs.push((layer, resolved));
            }
        }
    }
    for (layer, step) in inputs {
        plan.layers.get_mut(layer).input_steps.insert(step);
    }
}
