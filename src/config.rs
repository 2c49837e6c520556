//! Host-tunable engine options (core spec §6), split into a stable surface
//! and a `debug` sub-set without stability guarantees, following the
//! `QueryPlannerConfig` / `QueryPlannerDebugConfig` split this engine's
//! planning model is descended from.

/// Top-level configuration accepted by [`crate::plan::OperationPlan::plan`]
/// and [`crate::executor::Executor`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard cap on the number of rows (`N`) held by a single bucket. Input
    /// lists larger than this are split into multiple buckets, executed in
    /// series, so that a single pathological list can't force an unbounded
    /// batch through a step's `execute`.
    ///
    /// Defaults to 8192.
    pub max_bucket_size: usize,

    /// Whether a row-level execution error aborts the whole operation or is
    /// localized to its response path per GraphQL's null-propagation rule.
    ///
    /// Defaults to `Collect`.
    pub resolve_errors: ResolveErrors,

    /// Toggles lazy `LayerPlan` creation for `@defer`/`@stream`.
    pub incremental_delivery: IncrementalDeliveryConfig,

    /// Configuration without stability guarantees; may change or be removed
    /// without notice.
    pub debug: EngineDebugConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_bucket_size: 8192,
            resolve_errors: ResolveErrors::Collect,
            incremental_delivery: Default::default(),
            debug: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveErrors {
    /// A row error aborts the whole operation.
    Propagate,
    /// A row error is localized to its response path; other rows proceed.
    #[default]
    Collect,
}

#[derive(Debug, Clone, Default)]
pub struct IncrementalDeliveryConfig {
    /// Enables `@defer`/`@stream` support. If unset, the planner drops these
    /// directives rather than emitting deferred `LayerPlan`s for them.
    pub enable_defer_stream: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EngineDebugConfig {
    /// When set, the executor records per-step input/output shapes and
    /// timings to the attached `tracing` subscriber as structured events,
    /// in addition to the spans it always emits.
    pub explain: bool,
}
