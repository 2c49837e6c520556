//! The `LayerPlan` tree (core spec §4.4): scopes describing how many times
//! the steps inside them execute per parent-scope value.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::step::StepId;

/// A `LayerPlan`'s identity within one [`crate::plan::OperationPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) u32);

impl LayerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The iteration discipline a `LayerPlan` imposes on its steps (core spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    /// Runs once per operation.
    Root,
    /// Runs once, strictly after every earlier `MutationField` layer under
    /// the same root, in document order.
    MutationField { sequence_index: usize },
    /// Runs once per element produced by `parent_step`.
    ListItem { parent_step: StepId },
    /// Like `ListItem`, but driven by an external event source rather than a
    /// list value.
    Subscription { parent_step: StepId },
    /// Runs only when `discriminator` resolves to one of `type_set`.
    Polymorphic {
        discriminator: StepId,
        type_set: IndexSet<Arc<str>>,
    },
    /// Runs lazily, after the primary response envelope is delivered.
    DeferStream { label: Option<Arc<str>> },
}

impl LayerKind {
    pub fn parent_step(&self) -> Option<StepId> {
        match self {
            LayerKind::ListItem { parent_step } | LayerKind::Subscription { parent_step } => {
                Some(*parent_step)
            }
            LayerKind::Polymorphic { discriminator, .. } => Some(*discriminator),
            _ => None,
        }
    }

    pub fn is_mutation_field(&self) -> bool {
        matches!(self, LayerKind::MutationField { .. })
    }
}

/// A scope in the dataflow graph: one node of the `LayerPlan` tree.
#[derive(Debug, Clone)]
pub struct LayerPlan {
    pub id: LayerId,
    pub kind: LayerKind,
    pub parent: Option<LayerId>,
    pub children: Vec<LayerId>,
    /// Steps created directly within this layer (not counting descendants).
    pub steps: Vec<StepId>,
    /// Document-level origin, for diagnostics only.
    pub reason: String,
    /// Dependencies crossing this layer's boundary from outside; populated
    /// at finalization.
    pub input_steps: IndexSet<StepId>,
    /// Steps referenced by the output template or a child layer; populated
    /// at finalization.
    pub output_steps: IndexSet<StepId>,
}

/// Owns every `LayerPlan` for one operation, as a tree rooted at `Root`.
#[derive(Debug, Clone)]
pub struct LayerTree {
    layers: Vec<LayerPlan>,
}

impl LayerTree {
    pub fn new() -> Self {
        let root = LayerPlan {
            id: LayerId(0),
            kind: LayerKind::Root,
            parent: None,
            children: Vec::new(),
            steps: Vec::new(),
            reason: "operation root".to_string(),
            input_steps: IndexSet::new(),
            output_steps: IndexSet::new(),
        };
        Self { layers: vec![root] }
    }

    pub fn root(&self) -> LayerId {
        LayerId(0)
    }

    pub fn get(&self, id: LayerId) -> &LayerPlan {
        &self.layers[id.index()]
    }

    pub fn get_mut(&mut self, id: LayerId) -> &mut LayerPlan {
        &mut self.layers[id.index()]
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerPlan> {
        self.layers.iter()
    }

    pub fn add_child(&mut self, parent: LayerId, kind: LayerKind, reason: impl Into<String>) -> LayerId {
        let id = LayerId(self.layers.len() as u32);
        self.layers.push(LayerPlan {
            id,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            steps: Vec::new(),
            reason: reason.into(),
            input_steps: IndexSet::new(),
            output_steps: IndexSet::new(),
        });
        self.layers[parent.index()].children.push(id);
        id
    }

    pub fn record_step(&mut self, layer: LayerId, step: StepId) {
        self.layers[layer.index()].steps.push(step);
    }

    /// True iff `ancestor` is `layer` itself or a strict ancestor of it.
    pub fn is_same_or_ancestor(&self, ancestor: LayerId, layer: LayerId) -> bool {
        let mut current = Some(layer);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.layers[id.index()].parent;
        }
        false
    }

    /// True iff `ancestor` is a strict ancestor of `layer` (not `layer` itself).
    pub fn is_strict_ancestor(&self, ancestor: LayerId, layer: LayerId) -> bool {
        ancestor != layer && self.is_same_or_ancestor(ancestor, layer)
    }

    pub fn depth(&self, layer: LayerId) -> usize {
        let mut depth = 0;
        let mut current = self.layers[layer.index()].parent;
        while let Some(id) = current {
            depth += 1;
            current = self.layers[id.index()].parent;
        }
        depth
    }

    /// Sibling `MutationField` layers under `parent`, in document order.
    pub fn mutation_field_children(&self, parent: LayerId) -> Vec<LayerId> {
        let mut children: Vec<LayerId> = self.layers[parent.index()]
            .children
            .iter()
            .copied()
            .filter(|id| self.layers[id.index()].kind.is_mutation_field())
            .collect();
        children.sort_by_key(|id| match &self.layers[id.index()].kind {
            LayerKind::MutationField { sequence_index } => *sequence_index,
            _ => usize::MAX,
        });
        children
    }
}

impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}
