//! The wire-visible step identity registry (core spec §6, §9): a tag per
//! built-in step kind plus a module/export-name pair, so a compiled plan can
//! be serialized and restored across process boundaries by a host that
//! wants to cache plans.

use indexmap::IndexMap;
use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
pub enum StepKindTag {
    RootValue,
    Context,
    Literal,
    Argument,
    KeyProjection,
    /// A step kind defined outside this crate, by a host's plan resolvers.
    /// Its identity is carried on the step itself via `metadata()` rather
    /// than this registry.
    Custom,
}

#[derive(Debug, Clone, Copy)]
pub struct StepRegistryEntry {
    pub module: &'static str,
    pub export_name: &'static str,
}

lazy_static! {
    static ref REGISTRY: IndexMap<StepKindTag, StepRegistryEntry> = {
        use StepKindTag::*;
        let mut map = IndexMap::new();
        map.insert(
            RootValue,
            StepRegistryEntry { module: "stepgraph::step::root_value", export_name: "RootValueStep" },
        );
        map.insert(
            Context,
            StepRegistryEntry { module: "stepgraph::step::root_value", export_name: "ContextStep" },
        );
        map.insert(
            Literal,
            StepRegistryEntry { module: "stepgraph::step::root_value", export_name: "LiteralStep" },
        );
        map.insert(
            Argument,
            StepRegistryEntry { module: "stepgraph::planner::field_args", export_name: "ArgumentStep" },
        );
        map.insert(
            KeyProjection,
            StepRegistryEntry { module: "stepgraph::step::key_projection", export_name: "KeyProjectionStep" },
        );
        map.insert(
            Custom,
            StepRegistryEntry { module: "", export_name: "" },
        );
        map
    };
}

impl StepKindTag {
    pub fn registry_entry(self) -> StepRegistryEntry {
        REGISTRY
            .get(&self)
            .copied()
            .unwrap_or(StepRegistryEntry { module: "", export_name: "" })
    }
}
