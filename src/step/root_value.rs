//! The built-in root-layer steps: the synthetic root value the planner
//! anchors every operation on (core spec §4.2), the well-known `context()`
//! step request-scope state is threaded through (core spec §5), and a step
//! that replays an interned literal constant for every row.

use std::hash::{Hash, Hasher};

use crate::context::OperationContext;
use crate::step::{sync_batch, Step, StepFlags, StepFuture, StepId, StepKindTag, StepOutput};

/// Anchors planning: one instance per operation, owned by the root
/// `LayerPlan`, with no dependencies. Its row count is always 1 until a
/// `ListItem`/`Polymorphic` child layer multiplies it out.
#[derive(Debug)]
pub struct RootValueStep;

impl Step for RootValueStep {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &[]
    }

    fn flags(&self) -> StepFlags {
        StepFlags::SYNC_AND_SAFE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::RootValue
    }

    fn execute<'a>(&'a self, inputs: &'a [crate::step::ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        let rows = inputs.first().map(|c| c.len()).unwrap_or(1);
        sync_batch(rows, |_| StepOutput::null())
    }

    fn execute_row_sync(&self, _inputs: &[&StepOutput]) -> Option<StepOutput> {
        Some(StepOutput::null())
    }
}

/// A step other steps depend on to declare that they read the operation's
/// shared request-scope state. Its own output is unused; the actual state
/// is reached through the `OperationContext` every step's `execute` already
/// receives. Declaring the dependency keeps data-flow analysis (hoisting,
/// dedup) aware that such a step is not purely a function of its other
/// dependencies.
#[derive(Debug)]
pub struct ContextStep;

impl Step for ContextStep {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &[]
    }

    fn flags(&self) -> StepFlags {
        StepFlags::SYNC_AND_SAFE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Context
    }

    fn execute<'a>(&'a self, inputs: &'a [crate::step::ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        let rows = inputs.first().map(|c| c.len()).unwrap_or(1);
        sync_batch(rows, |_| StepOutput::null())
    }

    fn execute_row_sync(&self, _inputs: &[&StepOutput]) -> Option<StepOutput> {
        Some(StepOutput::null())
    }
}

/// Replays a single interned constant for every row. Dedup-friendly: two
/// literal steps with an equal value are structurally identical.
#[derive(Debug, Clone)]
pub struct LiteralStep {
    value: serde_json_bytes::Value,
}

impl LiteralStep {
    pub fn new(value: serde_json_bytes::Value) -> Self {
        Self { value }
    }
}

impl Step for LiteralStep {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &[]
    }

    fn flags(&self) -> StepFlags {
        StepFlags::SYNC_AND_SAFE | StepFlags::DEDUPLICATABLE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Literal
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        canonical_json(&self.value).hash(&mut hasher);
        hasher.finish()
    }

    fn execute<'a>(&'a self, inputs: &'a [crate::step::ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        let rows = inputs.first().map(|c| c.len()).unwrap_or(1);
        let value = self.value.clone();
        sync_batch(rows, move |_| StepOutput::Value(value.clone()))
    }

    fn execute_row_sync(&self, _inputs: &[&StepOutput]) -> Option<StepOutput> {
        Some(StepOutput::Value(self.value.clone()))
    }

    fn deduplicate(&self, peers: &[StepId]) -> Vec<StepId> {
        // The caller has already filtered `peers` down to steps sharing our
        // `kind_tag` and `fingerprint`; a literal's fingerprint is a
        // collision-resistant hash of its canonical JSON form, so every
        // candidate here is semantically equal to `self`.
        peers.to_vec()
    }
}

fn canonical_json(value: &serde_json_bytes::Value) -> String {
    serde_json::to_string(&serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
        .unwrap_or_default()
}
