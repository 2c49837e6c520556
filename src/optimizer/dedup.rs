//! Deduplication (core spec §4.3): within each `LayerPlan`, group
//! `DEDUPLICATABLE`-flagged steps by `(kind_tag, fingerprint)`, ask the
//! group's first member to confirm which of its peers are truly equal, and
//! union-find-redirect the confirmed duplicates onto it.

use multimap::MultiMap;

use crate::error::Result;
use crate::plan::layer::LayerId;
use crate::plan::OperationPlan;
use crate::step::{StepFlags, StepId, StepKindTag};

pub fn run(plan: &mut OperationPlan) -> Result<bool> {
    let layer_ids: Vec<LayerId> = plan.layers.iter().map(|l| l.id).collect();
    let mut changed = false;
    for layer in layer_ids {
        changed |= run_for_layer(plan, layer);
    }
    Ok(changed)
}

fn run_for_layer(plan: &mut OperationPlan, layer: LayerId) -> bool {
    let mut groups: MultiMap<(StepKindTag, u64), StepId> = MultiMap::new();
    let step_ids = plan.layers.get(layer).steps.clone();
    for id in step_ids {
        if plan.arena.resolve(id) != id || !plan.arena.is_live(id) {
            continue;
        }
        let step = plan.arena.step(id);
        if !step.flags().contains(StepFlags::DEDUPLICATABLE) {
            continue;
        }
        groups.insert((step.kind_tag(), step.fingerprint()), id);
    }

    let mut changed = false;
    for ids in groups.into_iter().map(|(_, v)| v) {
        if ids.len() < 2 {
            continue;
        }
        let leader = ids[0];
        let peers = &ids[1..];
        let confirmed = plan.arena.step(leader).deduplicate(peers);
        for dup in confirmed {
            if dup == leader {
                continue;
            }
            plan.arena.redirect(dup, leader);
            changed = true;
        }
    }
    changed
}
