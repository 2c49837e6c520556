//! The step contract (core spec §4.1): every node in the dataflow graph
//! implements [`Step`]. Concrete step kinds are modeled as plain Rust types
//! behind a trait object, since plan resolvers (core spec §6, "to step
//! authors") are host-supplied and the set of step kinds is open-ended; a
//! closed [`StepKindTag`] registry (§9) is kept alongside for the
//! diagnostics/serialization identity that the dynamic dispatch itself
//! doesn't carry.

pub mod key_projection;
pub mod registry;
pub mod root_value;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexSet;

use crate::context::OperationContext;
use crate::error::{Result, SingleGraphQLError};
use crate::plan::layer::LayerId;

pub use registry::StepKindTag;

/// A step's identity within one [`crate::plan::OperationPlan`]: a dense
/// integer index over the plan's step arena (core spec §9 — "model
/// dependencies as dense integer ids over an arena"). Ids are assigned once,
/// at creation, and never reused even if the step is later tree-shaken away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub(crate) u32);

impl StepId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// The flag set a step may carry (core spec §3). Hand-rolled rather than
/// pulled from a bitflags crate: the set is small, fixed, and used mostly as
/// opaque membership tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepFlags(u16);

impl StepFlags {
    pub const NONE: StepFlags = StepFlags(0);
    /// May skip the batching/future-awaiting machinery via `execute_row_sync`.
    pub const SYNC_AND_SAFE: StepFlags = StepFlags(1 << 0);
    /// Must execute exactly once per row; never reordered with other
    /// side-effecting peers in the same layer; excluded from dedup/hoist.
    pub const SIDE_EFFECTING: StepFlags = StepFlags(1 << 1);
    pub const STREAM_CAPABLE: StepFlags = StepFlags(1 << 2);
    /// Live only for some of the concrete types in an abstract-type selection.
    pub const POLYMORPHIC: StepFlags = StepFlags(1 << 3);
    /// Owned by a `LayerPlan::MutationField` layer.
    pub const MUTATION_FIELD: StepFlags = StepFlags(1 << 4);
    pub const DEDUPLICATABLE: StepFlags = StepFlags(1 << 5);
    pub const INLINEABLE: StepFlags = StepFlags(1 << 6);

    pub const fn contains(self, other: StepFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: StepFlags) -> StepFlags {
        StepFlags(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for StepFlags {
    type Output = StepFlags;
    fn bitor(self, rhs: StepFlags) -> StepFlags {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for StepFlags {
    fn bitor_assign(&mut self, rhs: StepFlags) {
        *self = self.union(rhs);
    }
}

/// A set of concrete-type labels a step is restricted to, evaluated per row
/// against the enclosing `LayerPlan::Polymorphic`'s discriminated type. An
/// empty set means "matches all types the enclosing layer admits".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolymorphicPaths(pub IndexSet<Arc<str>>);

impl PolymorphicPaths {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of(types: impl IntoIterator<Item = Arc<str>>) -> Self {
        Self(types.into_iter().collect())
    }

    pub fn admits(&self, type_name: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|t| &**t == type_name)
    }
}

/// A single row's worth of output from a step's `execute`.
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// A normal value.
    Value(serde_json_bytes::Value),
    /// An error for this row only; the row is marked dead for steps that
    /// depend on it, while sibling rows continue.
    Error(SingleGraphQLError),
    /// A deliberate null with a diagnostic cause (e.g. a polymorphic branch
    /// that did not match this row), distinct from an error: it does not
    /// populate the response `errors` array.
    Flagged { cause: String },
}

impl StepOutput {
    pub fn null() -> Self {
        StepOutput::Value(serde_json_bytes::Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StepOutput::Error(_))
    }

    pub fn as_value(&self) -> Option<&serde_json_bytes::Value> {
        match self {
            StepOutput::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A parallel vector of a single step's (or dependency's) values, one per
/// live row in the owning bucket.
pub type ColumnVec = Vec<StepOutput>;

/// The result of a step's batched `execute`: either available immediately or
/// pending on an external resource.
pub type StepFuture<'a> = BoxFuture<'a, ColumnVec>;

/// The outcome of a step's `optimize` call (core spec §4.3: hoisting,
/// inlining, and deduplication are separate passes, but a step's own
/// `optimize` may additionally request a substitution or mark itself
/// inlineable).
pub enum StepOptimization {
    /// No change; keep this step.
    Unchanged,
    /// Replace this step with another existing step (e.g. after folding a
    /// dependent's configuration into a peer).
    ReplaceWith(StepId),
    /// This step may now be safely folded into its consumer(s).
    MarkInlineable,
}

/// Context passed to `Step::optimize`.
pub struct OptimizeContext<'a> {
    pub self_id: StepId,
    pub layer: LayerId,
}

/// Context passed to `Step::finalize`, once the graph is stable.
pub struct FinalizeContext<'a> {
    pub self_id: StepId,
}

/// The step contract (core spec §4.1-§4.8).
pub trait Step: fmt::Debug + Send + Sync {
    /// Enables the optimizer's inlining pass to downcast to a handful of
    /// known built-in step kinds it knows how to fold structurally; step
    /// kinds a host registers through its own plan resolvers simply return
    /// `self` here and are left alone by that pass.
    fn as_any(&self) -> &dyn Any;

    /// Ordered dependency ids; `execute`'s `inputs` slice is indexed
    /// positionally against this list.
    fn dependencies(&self) -> &[StepId];

    fn flags(&self) -> StepFlags;

    fn polymorphic_paths(&self) -> Option<&PolymorphicPaths> {
        None
    }

    /// Free-form diagnostic description; does not affect semantics.
    fn metadata(&self) -> String {
        String::new()
    }

    fn kind_tag(&self) -> StepKindTag;

    /// A coarse structural hash used to group candidate steps before the
    /// more precise `deduplicate` check runs. Steps of different kinds or
    /// with different fingerprints are never compared.
    fn fingerprint(&self) -> u64 {
        0
    }

    /// Batched execution: `inputs[i]` is the `i`-th dependency's column,
    /// length `N` rows. Returns a column of length `N` in the same row order.
    fn execute<'a>(
        &'a self,
        inputs: &'a [ColumnVec],
        ctx: &'a OperationContext,
    ) -> StepFuture<'a>;

    /// The `sync-and-safe` fast path: given one row's worth of dependency
    /// values, produce this row's output without going through the
    /// batch/future machinery. Only called when `flags()` contains
    /// `SYNC_AND_SAFE`; the executor falls back to `execute` otherwise.
    fn execute_row_sync(&self, _inputs: &[&StepOutput]) -> Option<StepOutput> {
        None
    }

    /// Given peer steps in the same layer with an equal `kind_tag` and
    /// `fingerprint`, return the subset of `peers` that are semantically
    /// identical to `self` and may be merged into one.
    fn deduplicate(&self, _peers: &[StepId]) -> Vec<StepId> {
        Vec::new()
    }

    fn optimize(&mut self, _ctx: &mut OptimizeContext<'_>) -> StepOptimization {
        StepOptimization::Unchanged
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Helper for steps whose `execute` is itself synchronous and infallible
/// per-row; wraps a plain per-row closure into the batched, boxed-future
/// shape the trait requires.
pub fn sync_batch<'a, F>(rows: usize, f: F) -> StepFuture<'a>
where
    F: Fn(usize) -> StepOutput + Send + Sync + 'a,
{
    Box::pin(async move { (0..rows).map(f).collect() })
}
