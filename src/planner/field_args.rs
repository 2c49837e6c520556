//! `FieldArgs` (core spec §4.7): a resolved view over one field's arguments,
//! and the *apply* pattern for folding argument values into a builder step.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::OperationContext;
use crate::error::Result;
use crate::step::{sync_batch, ColumnVec, Step, StepFlags, StepFuture, StepId, StepKindTag, StepOutput};

/// Where an argument's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue {
    /// A compile-time constant, already interned as a `LiteralStep`.
    Literal(StepId),
    /// A step computed at runtime (a variable reference, or a planned
    /// nested input-object field).
    Dynamic(StepId),
}

impl ArgValue {
    pub fn step_id(self) -> StepId {
        match self {
            ArgValue::Literal(id) | ArgValue::Dynamic(id) => id,
        }
    }

    pub fn is_literal(self) -> bool {
        matches!(self, ArgValue::Literal(_))
    }
}

/// How an argument definition folds its value into a builder step, attached
/// by a host's schema extensions (core spec §4.7, "the codec attached to
/// each argument definition").
pub type ApplyPlanFn = Arc<dyn Fn(&mut dyn Step, ArgValue) + Send + Sync>;

#[derive(Clone)]
pub struct ArgumentSchema {
    pub required: bool,
    pub apply_plan: Option<ApplyPlanFn>,
}

impl ArgumentSchema {
    pub fn new(required: bool) -> Self {
        Self { required, apply_plan: None }
    }

    pub fn with_apply_plan(mut self, apply_plan: ApplyPlanFn) -> Self {
        self.apply_plan = Some(apply_plan);
        self
    }
}

impl std::fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentSchema")
            .field("required", &self.required)
            .field("apply_plan", &self.apply_plan.is_some())
            .finish()
    }
}

/// One field's resolved arguments, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FieldArgs {
    values: IndexMap<Arc<str>, ArgValue>,
    schemas: IndexMap<Arc<str>, ArgumentSchema>,
}

impl FieldArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: impl Into<Arc<str>>, schema: ArgumentSchema) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn set(&mut self, name: impl Into<Arc<str>>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<ArgValue> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Runs each declared argument's `apply_plan` against `builder`, in
    /// declaration order. Arguments with no resolved value are skipped
    /// unless their schema marks them required.
    pub fn apply(&self, builder: &mut dyn Step) -> Result<()> {
        for (name, schema) in &self.schemas {
            match self.values.get(name) {
                Some(value) => {
                    if let Some(apply_plan) = &schema.apply_plan {
                        apply_plan(builder, *value);
                    }
                }
                None if schema.required => {
                    crate::bail!("required argument `{name}` has no resolved value");
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// The key a planned operation's variable values are stashed under in the
/// operation context's shared state, read by `ArgumentStep`.
pub const VARIABLES_KEY: &str = "stepgraph::variables";

/// Reads one variable's value out of the operation's variables at execution
/// time (the `Argument` step kind of the wire registry).
#[derive(Debug, Clone)]
pub struct ArgumentStep {
    variable_name: Arc<str>,
}

impl ArgumentStep {
    pub fn new(variable_name: impl Into<Arc<str>>) -> Self {
        Self { variable_name: variable_name.into() }
    }

    fn read(&self, ctx: &OperationContext) -> serde_json_bytes::Value {
        let shared = ctx.shared.read().expect("operation context lock poisoned");
        shared
            .get::<serde_json_bytes::Value>(VARIABLES_KEY)
            .and_then(|vars| vars.as_object())
            .and_then(|obj| obj.get(self.variable_name.as_ref()))
            .cloned()
            .unwrap_or(serde_json_bytes::Value::Null)
    }
}

impl Step for ArgumentStep {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &[]
    }

    fn flags(&self) -> StepFlags {
        StepFlags::NONE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Argument
    }

    fn metadata(&self) -> String {
        format!("${}", self.variable_name)
    }

    fn execute<'a>(&'a self, inputs: &'a [ColumnVec], ctx: &'a OperationContext) -> StepFuture<'a> {
        let rows = inputs.first().map(|c| c.len()).unwrap_or(1);
        let value = self.read(ctx);
        sync_batch(rows, move |_| StepOutput::Value(value.clone()))
    }
}
