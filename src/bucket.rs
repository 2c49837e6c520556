//! Buckets (core spec §4.5): the runtime counterpart of a `LayerPlan`. One
//! bucket holds one batch of rows executing together, as parallel per-step
//! column vectors, plus whatever bookkeeping is needed to route values back
//! up to the parent bucket that spawned it.

use indexmap::IndexMap;

use crate::plan::layer::LayerId;
use crate::step::{ColumnVec, StepId, StepOutput};

/// Links a child bucket's rows back to the parent bucket row each one was
/// produced from, so a step that depends on something computed in an
/// ancestor layer can be broadcast down into the child's row order.
#[derive(Debug, Clone)]
pub struct ParentRowMap {
    /// `parent_row[i]` is the index into the parent bucket's columns that
    /// child row `i` was spawned from.
    parent_row: Vec<usize>,
}

impl ParentRowMap {
    pub fn new(parent_row: Vec<usize>) -> Self {
        Self { parent_row }
    }

    pub fn len(&self) -> usize {
        self.parent_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_row.is_empty()
    }

    /// Broadcasts a parent column down into this bucket's row order.
    pub fn broadcast(&self, parent_column: &ColumnVec) -> ColumnVec {
        self.parent_row
            .iter()
            .map(|&row| parent_column.get(row).cloned().unwrap_or_else(StepOutput::null))
            .collect()
    }

    /// `parent_row[i]` for every child row `i`, for callers (the output
    /// renderer) that need to walk back from a parent row to the child rows
    /// it spawned.
    pub fn parent_rows(&self) -> &[usize] {
        &self.parent_row
    }
}

/// One batch of rows executing under a single `LayerPlan`.
#[derive(Debug)]
pub struct Bucket {
    pub layer: LayerId,
    pub parent: Option<ParentRowMap>,
    /// Row count for this bucket; every column here has exactly this length.
    row_count: usize,
    /// Which rows are still alive (a row becomes dead once a step it
    /// depends on produces an error for it; dependents skip dead rows
    /// rather than re-erroring).
    alive: Vec<bool>,
    columns: IndexMap<StepId, ColumnVec>,
    /// Per-row terminal error, set once a row dies, kept separately from
    /// `columns` so the output renderer can report the originating error
    /// even after the step's own column entry is overwritten by later
    /// dead-row padding.
    row_errors: Vec<Option<crate::error::SingleGraphQLError>>,
    children: Vec<Bucket>,
}

impl Bucket {
    pub fn new(layer: LayerId, row_count: usize, parent: Option<ParentRowMap>) -> Self {
        Self {
            layer,
            parent,
            row_count,
            alive: vec![true; row_count],
            columns: IndexMap::new(),
            row_errors: vec![None; row_count],
            children: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_alive(&self, row: usize) -> bool {
        self.alive.get(row).copied().unwrap_or(false)
    }

    pub fn live_row_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    pub fn kill_row(&mut self, row: usize, error: crate::error::SingleGraphQLError) {
        if let Some(a) = self.alive.get_mut(row) {
            *a = false;
        }
        if let Some(slot) = self.row_errors.get_mut(row) {
            *slot = Some(error);
        }
    }

    pub fn row_error(&self, row: usize) -> Option<&crate::error::SingleGraphQLError> {
        self.row_errors.get(row).and_then(|e| e.as_ref())
    }

    pub fn has_column(&self, step: StepId) -> bool {
        self.columns.contains_key(&step)
    }

    pub fn column(&self, step: StepId) -> Option<&ColumnVec> {
        self.columns.get(&step)
    }

    pub fn set_column(&mut self, step: StepId, column: ColumnVec) {
        debug_assert_eq!(column.len(), self.row_count);
        for (row, value) in column.iter().enumerate() {
            if value.is_error() && self.alive.get(row).copied().unwrap_or(false) {
                if let StepOutput::Error(e) = value {
                    self.kill_row(row, e.clone());
                }
            }
        }
        self.columns.insert(step, column);
    }

    pub fn parent_map(&self) -> Option<&ParentRowMap> {
        self.parent.as_ref()
    }

    pub fn add_child(&mut self, child: Bucket) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Bucket] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Bucket> {
        &mut self.children
    }
}
