//! The compiled plan: a [`StepArena`] holding every step ever created for one
//! operation, a [`layer::LayerTree`] of scopes, and the lifecycle state
//! machine that the optimizer and executor drive forward (core spec §2, §4).

pub mod layer;
pub mod output_template;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{EngineError, Result};
use crate::step::{Step, StepId};
use layer::{LayerId, LayerTree};
use output_template::OutputTemplate;

/// Where an [`OperationPlan`] sits in its compile/run lifecycle (core spec
/// §2). Transitions are one-directional; a plan never returns to an earlier
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Planning,
    Optimizing,
    Finalized,
    Executing,
    Complete,
    Failed,
}

impl PlanState {
    pub fn can_transition_to(self, next: PlanState) -> bool {
        use PlanState::*;
        matches!(
            (self, next),
            (Planning, Optimizing)
                | (Optimizing, Optimizing)
                | (Optimizing, Finalized)
                | (Finalized, Executing)
                | (Executing, Executing)
                | (Executing, Complete)
                | (_, Failed)
        )
    }
}

/// One slot in the [`StepArena`]: the step itself, the layer it was created
/// in, and — once deduplication redirects it — the canonical step it now
/// stands for.
///
/// `equivalent_to` forms a parent pointer for union-find-with-path-compression
/// (core spec's own Design Note 9): when the dedup pass merges step `b` into
/// step `a`, it sets `b.equivalent_to = Some(a)` rather than rewriting every
/// other step's stored `StepId` dependency fields. Callers resolve through
/// [`StepArena::resolve`], which compresses the chain it walks.
#[derive(Debug)]
pub struct StepSlot {
    pub step: Box<dyn Step>,
    pub layer: LayerId,
    equivalent_to: Option<StepId>,
}

/// Owns every step ever allocated for one operation plan, addressed by dense
/// [`StepId`] index.
#[derive(Debug, Default)]
pub struct StepArena {
    slots: Vec<Option<StepSlot>>,
}

impl StepArena {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn add_step(&mut self, step: Box<dyn Step>, layer: LayerId) -> StepId {
        let id = StepId::new(self.slots.len() as u32);
        self.slots.push(Some(StepSlot { step, layer, equivalent_to: None }));
        id
    }

    fn slot(&self, id: StepId) -> &StepSlot {
        self.slots[id.index()]
            .as_ref()
            .expect("StepId referenced after its slot was tree-shaken")
    }

    fn slot_mut(&mut self, id: StepId) -> &mut StepSlot {
        self.slots[id.index()]
            .as_mut()
            .expect("StepId referenced after its slot was tree-shaken")
    }

    /// Resolves `id` through any dedup redirects, compressing the chain so
    /// later lookups are O(1).
    pub fn resolve(&mut self, id: StepId) -> StepId {
        let mut current = id;
        let mut chain = Vec::new();
        while let Some(next) = self.slots[current.index()].as_ref().and_then(|s| s.equivalent_to) {
            chain.push(current);
            current = next;
        }
        for step in chain {
            self.slots[step.index()].as_mut().unwrap().equivalent_to = Some(current);
        }
        current
    }

    /// Redirects `from` to `to`; does not itself remove `from`'s slot, since
    /// the tree-shake pass is responsible for reclaiming slots with no
    /// remaining live referent.
    pub fn redirect(&mut self, from: StepId, to: StepId) {
        self.slot_mut(from).equivalent_to = Some(to);
    }

    /// Like `resolve`, but read-only: follows the redirect chain without
    /// compressing it. Dedup only ever redirects onto an already-canonical
    /// leader (see `optimizer::dedup`), so by the time a plan reaches
    /// `Finalized` every chain has depth at most one; the executor, which
    /// only holds a shared `&OperationPlan`, uses this instead of `resolve`.
    pub fn resolve_ref(&self, id: StepId) -> StepId {
        let mut current = id;
        while let Some(next) = self.slots[current.index()].as_ref().and_then(|s| s.equivalent_to) {
            current = next;
        }
        current
    }

    pub fn step(&self, id: StepId) -> &dyn Step {
        self.slot(id).step.as_ref()
    }

    pub fn step_mut(&mut self, id: StepId) -> &mut Box<dyn Step> {
        &mut self.slot_mut(id).step
    }

    pub fn layer_of(&self, id: StepId) -> LayerId {
        self.slot(id).layer
    }

    pub fn set_layer(&mut self, id: StepId, layer: LayerId) {
        self.slot_mut(id).layer = layer;
    }

    /// Removes a step's slot entirely; only valid once nothing else
    /// references it (the tree-shake pass's job to verify).
    pub fn remove(&mut self, id: StepId) {
        self.slots[id.index()] = None;
    }

    pub fn is_live(&self, id: StepId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn live_ids(&self) -> impl Iterator<Item = StepId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| StepId::new(i as u32)))
    }
}

/// A literal value interning table, keyed by canonical JSON text, so that
/// repeated identical literal arguments across a document collapse onto one
/// [`crate::step::root_value::LiteralStep`] without needing a full dedup pass.
#[derive(Debug, Default)]
pub struct LiteralInterner {
    table: IndexMap<String, StepId>,
}

impl LiteralInterner {
    pub fn new() -> Self {
        Self { table: IndexMap::new() }
    }

    pub fn get(&self, canonical: &str) -> Option<StepId> {
        self.table.get(canonical).copied()
    }

    pub fn insert(&mut self, canonical: String, id: StepId) {
        self.table.entry(canonical).or_insert(id);
    }
}

/// The complete compiled plan for one GraphQL operation (core spec §2).
#[derive(Debug)]
pub struct OperationPlan {
    pub state: PlanState,
    pub arena: StepArena,
    pub layers: LayerTree,
    pub output_template: Option<OutputTemplate>,
    pub literals: LiteralInterner,
    pub operation_name: Option<Arc<str>>,
}

impl OperationPlan {
    pub fn new(operation_name: Option<Arc<str>>) -> Self {
        Self {
            state: PlanState::Planning,
            arena: StepArena::new(),
            layers: LayerTree::new(),
            output_template: None,
            literals: LiteralInterner::new(),
            operation_name,
        }
    }

    pub fn transition(&mut self, next: PlanState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::internal(format!(
                "invalid plan state transition from {:?} to {next:?}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    pub fn root_layer(&self) -> LayerId {
        self.layers.root()
    }
}
