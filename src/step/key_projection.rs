//! The key-projection sub-engine (core spec §4.8): a recurring inlineable
//! step that reshapes a parent record into an object with a different set of
//! keys. Kept as its own module because it's the spec's worked example of
//! the general "fast path predicated on a safety check over configuration"
//! pattern: `finalize` decides once, at compile time, whether the projection
//! can use a specialized allocator or must fall back to a generic
//! reduce-over-keys.

use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::context::OperationContext;
use crate::error::Result;
use crate::step::{ColumnVec, FinalizeContext, Step, StepFlags, StepFuture, StepId, StepKindTag, StepOutput};

/// Property names that collide with a JS `Object.prototype`'s own
/// descriptors. Rust's map types have no equivalent prototype-pollution
/// hazard, but the disallow-list is preserved anyway (core spec §9) so the
/// fast path and the fallback path agree on what counts as "safe" — a
/// projection step's behavior must not depend on which path `finalize`
/// happened to pick.
const RESERVED_KEYS: &[&str] = &[
    "constructor",
    "prototype",
    "__proto__",
    "toString",
    "valueOf",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
];

fn is_safe_identifier(key: &str) -> bool {
    if key.is_empty() || key.starts_with("__") || RESERVED_KEYS.contains(&key) {
        return false;
    }
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first.is_ascii_digit() {
        return false;
    }
    (first.is_ascii_alphanumeric() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompiledProjection {
    /// All keys (desired and actual) are safe identifiers: build the
    /// resulting object directly, keys in mapping-declaration order.
    FastAllocate,
    /// At least one key needs escaping-aware handling: fall back to a
    /// plain reduce over the mapping.
    Fallback,
}

/// Projects `{desired_key -> actual_key}` out of a parent record step's
/// object value.
#[derive(Debug)]
pub struct KeyProjectionStep {
    dependencies: [StepId; 1],
    /// Declaration order matters for the fallback path's output key order.
    mapping: IndexMap<String, String>,
    compiled: OnceLock<CompiledProjection>,
}

impl KeyProjectionStep {
    pub fn new(parent: StepId, mapping: IndexMap<String, String>) -> Self {
        Self {
            dependencies: [parent],
            mapping,
            compiled: OnceLock::new(),
        }
    }

    pub fn parent(&self) -> StepId {
        self.dependencies[0]
    }

    pub fn mapping(&self) -> &IndexMap<String, String> {
        &self.mapping
    }

    fn project_one(&self, parent_value: &StepOutput) -> StepOutput {
        let StepOutput::Value(serde_json_bytes::Value::Object(obj)) = parent_value else {
            return StepOutput::null();
        };
        let compiled = self.compiled.get().copied().unwrap_or(CompiledProjection::Fallback);
        match compiled {
            CompiledProjection::FastAllocate => {
                let mut out = serde_json_bytes::Map::new();
                for (desired, actual) in &self.mapping {
                    let value = obj
                        .get(actual.as_str())
                        .cloned()
                        .unwrap_or(serde_json_bytes::Value::Null);
                    out.insert(desired.as_str(), value);
                }
                StepOutput::Value(serde_json_bytes::Value::Object(out))
            }
            CompiledProjection::Fallback => {
                let out = self.mapping.iter().fold(serde_json_bytes::Map::new(), |mut acc, (desired, actual)| {
                    let value = obj
                        .get(actual.as_str())
                        .cloned()
                        .unwrap_or(serde_json_bytes::Value::Null);
                    acc.insert(desired.as_str(), value);
                    acc
                });
                StepOutput::Value(serde_json_bytes::Value::Object(out))
            }
        }
    }
}

impl Step for KeyProjectionStep {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &self.dependencies
    }

    fn flags(&self) -> StepFlags {
        StepFlags::SYNC_AND_SAFE | StepFlags::DEDUPLICATABLE | StepFlags::INLINEABLE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::KeyProjection
    }

    fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.dependencies[0].hash(&mut hasher);
        for (desired, actual) in &self.mapping {
            desired.hash(&mut hasher);
            actual.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn execute<'a>(&'a self, inputs: &'a [ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        let parent_col = &inputs[0];
        Box::pin(async move { parent_col.iter().map(|v| self.project_one(v)).collect() })
    }

    fn execute_row_sync(&self, inputs: &[&StepOutput]) -> Option<StepOutput> {
        Some(self.project_one(inputs[0]))
    }

    fn deduplicate(&self, peers: &[StepId]) -> Vec<StepId> {
        // `peers` has already been narrowed to the same `kind_tag` and
        // `fingerprint`, which folds in both the parent id and the mapping,
        // so every survivor here already satisfies the spec's equality rule
        // (equal mapping + equal parent step id).
        peers.to_vec()
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Result<()> {
        let fast = self
            .mapping
            .iter()
            .all(|(desired, actual)| is_safe_identifier(desired) && is_safe_identifier(actual));
        let _ = self.compiled.set(if fast {
            CompiledProjection::FastAllocate
        } else {
            CompiledProjection::Fallback
        });
        Ok(())
    }
}
