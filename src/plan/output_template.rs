//! The output template (core spec §7): a tree, built once during planning,
//! that the executor walks against a completed bucket hierarchy to render a
//! GraphQL response, applying standard null-propagation along the way.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::step::StepId;

/// How a template leaf's step value should be coerced before being written
/// into the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafCoercion {
    /// Write the step's value verbatim (already the right shape).
    Scalar,
    /// The field is declared non-null; a `Value::Null` here must propagate a
    /// null to the nearest nullable ancestor instead of being written as-is.
    NonNullScalar,
}

/// One node of the output template tree.
#[derive(Debug, Clone)]
pub enum OutputTemplate {
    /// Render `step`'s value directly, applying `coercion`.
    Leaf { step: StepId, coercion: LeafCoercion },
    /// Render an object whose fields are named sub-templates, in the order
    /// given (document order, core spec §7).
    Object {
        non_null: bool,
        fields: IndexMap<Arc<str>, OutputTemplate>,
    },
    /// Render a list: `step` identifies the layer-multiplying step whose rows
    /// back this list's items; `item` is the per-item sub-template, evaluated
    /// once per child bucket row.
    List {
        non_null: bool,
        step: StepId,
        item: Box<OutputTemplate>,
    },
    /// Render one of several object sub-templates depending on which
    /// concrete type `discriminator` resolved to for this row.
    Polymorphic {
        non_null: bool,
        discriminator: StepId,
        by_type: IndexMap<Arc<str>, OutputTemplate>,
    },
}

impl OutputTemplate {
    pub fn leaf(step: StepId, non_null: bool) -> Self {
        OutputTemplate::Leaf {
            step,
            coercion: if non_null { LeafCoercion::NonNullScalar } else { LeafCoercion::Scalar },
        }
    }

    pub fn is_non_null(&self) -> bool {
        match self {
            OutputTemplate::Leaf { coercion, .. } => *coercion == LeafCoercion::NonNullScalar,
            OutputTemplate::Object { non_null, .. }
            | OutputTemplate::List { non_null, .. }
            | OutputTemplate::Polymorphic { non_null, .. } => *non_null,
        }
    }

    /// Every step this node (and its descendants) reads, for populating a
    /// `LayerPlan::output_steps` set during finalization.
    pub fn referenced_steps(&self, out: &mut Vec<StepId>) {
        match self {
            OutputTemplate::Leaf { step, .. } => out.push(*step),
            OutputTemplate::Object { fields, .. } => {
                for field in fields.values() {
                    field.referenced_steps(out);
                }
            }
            OutputTemplate::List { step, item, .. } => {
                out.push(*step);
                item.referenced_steps(out);
            }
            OutputTemplate::Polymorphic { discriminator, by_type, .. } => {
                out.push(*discriminator);
                for template in by_type.values() {
                    template.referenced_steps(out);
                }
            }
        }
    }
}
