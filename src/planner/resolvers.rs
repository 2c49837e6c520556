//! The plan-resolver table (core spec §4.2, §6 "to step authors"): maps a
//! `(type name, field name)` pair to a host-supplied closure that turns a
//! parent step and resolved arguments into a new step.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::plan::layer::LayerId;
use crate::plan::OperationPlan;
use crate::planner::field_args::FieldArgs;
use crate::step::{Step, StepId};

/// Shape information about the field currently being planned, derived from
/// the schema and the operation's selection, independent of any particular
/// plan resolver's own logic.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub type_name: Arc<str>,
    pub field_name: Arc<str>,
    pub response_key: Arc<str>,
    pub is_list: bool,
    pub is_non_null: bool,
    pub is_abstract: bool,
}

/// Mutable planning state threaded through one plan resolver invocation.
pub struct PlanningContext<'a> {
    pub plan: &'a mut OperationPlan,
    pub layer: LayerId,
}

impl<'a> PlanningContext<'a> {
    /// Allocates a step into the context's current layer.
    pub fn add_step(&mut self, step: Box<dyn Step>) -> StepId {
        let id = self.plan.arena.add_step(step, self.layer);
        self.plan.layers.record_step(self.layer, id);
        id
    }

    pub fn add_child_layer(&mut self, kind: crate::plan::layer::LayerKind, reason: impl Into<String>) -> LayerId {
        self.plan.layers.add_child(self.layer, kind, reason)
    }
}

/// A plan resolver: given the parent step, the field's resolved arguments,
/// its shape info, and the mutable planning context, produces the step that
/// supplies this field's value.
pub type PlanResolverFn = Arc<
    dyn Fn(&StepId, &FieldArgs, &FieldInfo, &mut PlanningContext<'_>) -> Result<StepId> + Send + Sync,
>;

/// A secondary hook a resolver may declare alongside itself (core spec §6,
/// `autoApplyAfterParentPlan`): run automatically right after the resolver's
/// own step has been planned, given that step plus the same arguments and
/// shape info. Used for follow-up steps that always belong next to a field's
/// plan (e.g. applying a directive's effect) without every resolver author
/// having to remember to chain it by hand.
pub type AutoApplyFn = Arc<
    dyn Fn(StepId, &FieldArgs, &FieldInfo, &mut PlanningContext<'_>) -> Result<()> + Send + Sync,
>;

struct ResolverEntry {
    resolver: PlanResolverFn,
    auto_apply_after_parent_plan: Option<AutoApplyFn>,
}

/// The registry a host populates before planning (core spec §6).
#[derive(Clone, Default)]
pub struct PlanResolvers {
    table: IndexMap<(String, String), ResolverEntry>,
}

impl Clone for ResolverEntry {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            auto_apply_after_parent_plan: self.auto_apply_after_parent_plan.clone(),
        }
    }
}

impl PlanResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: PlanResolverFn,
    ) {
        self.table.insert(
            (type_name.into(), field_name.into()),
            ResolverEntry { resolver, auto_apply_after_parent_plan: None },
        );
    }

    /// Registers `resolver` for `(type_name, field_name)` along with an
    /// `auto_apply` hook the planner invokes automatically immediately after
    /// `resolver` returns, passing it the step `resolver` just produced.
    pub fn register_with_auto_apply(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: PlanResolverFn,
        auto_apply: AutoApplyFn,
    ) {
        self.table.insert(
            (type_name.into(), field_name.into()),
            ResolverEntry { resolver, auto_apply_after_parent_plan: Some(auto_apply) },
        );
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&PlanResolverFn> {
        self.table.get(&(type_name.to_string(), field_name.to_string())).map(|entry| &entry.resolver)
    }

    /// The `autoApplyAfterParentPlan` hook registered alongside this field's
    /// resolver, if any.
    pub fn get_auto_apply(&self, type_name: &str, field_name: &str) -> Option<&AutoApplyFn> {
        self.table
            .get(&(type_name.to_string(), field_name.to_string()))
            .and_then(|entry| entry.auto_apply_after_parent_plan.as_ref())
    }
}

impl std::fmt::Debug for PlanResolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanResolvers").field("registered", &self.table.len()).finish()
    }
}
