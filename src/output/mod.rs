//! The output renderer (core spec §7): walks an [`OutputTemplate`] against
//! the executed [`Bucket`] tree, producing a `{ data, errors }` response and
//! applying GraphQL's standard null-propagation rule as it goes — a failed
//! or missing non-null field nulls its nearest nullable ancestor instead of
//! the whole response.

use serde_json_bytes::Value;

use crate::bucket::Bucket;
use crate::error::{PathSegment, SingleGraphQLError};
use crate::plan::layer::{LayerId, LayerKind};
use crate::plan::output_template::{LeafCoercion, OutputTemplate};
use crate::plan::OperationPlan;
use crate::response::GraphQLResponse;
use crate::step::{StepId, StepOutput};

/// Renders the root bucket produced by [`crate::executor::Executor::run`]
/// against `plan`'s output template.
pub fn render(plan: &OperationPlan, root: &Bucket) -> GraphQLResponse {
    let Some(template) = &plan.output_template else {
        return GraphQLResponse::new(None, vec![SingleGraphQLError::new("plan has no output template")]);
    };
    let mut errors = Vec::new();
    let mut path = Vec::new();
    let data = render_node(plan, template, root, 0, &mut path, &mut errors);
    GraphQLResponse::new(data, errors)
}

fn render_node(
    plan: &OperationPlan,
    template: &OutputTemplate,
    bucket: &Bucket,
    row: usize,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<SingleGraphQLError>,
) -> Option<Value> {
    if !bucket.is_alive(row) {
        if let Some(error) = bucket.row_error(row) {
            errors.push(error.clone().with_path(path.clone()));
        }
        return None;
    }

    match template {
        OutputTemplate::Leaf { step, coercion } => render_leaf(plan, *step, *coercion == LeafCoercion::NonNullScalar, bucket, row, path, errors),
        OutputTemplate::Object { non_null, fields } => {
            let mut object = serde_json_bytes::Map::new();
            let mut propagate = false;
            for (name, sub_template) in fields {
                path.push(PathSegment::Field(name.to_string()));
                let value = render_field(plan, sub_template, bucket, row, path, errors);
                path.pop();
                match value {
                    Some(value) => {
                        object.insert(name.as_ref(), value);
                    }
                    None if sub_template.is_non_null() => {
                        propagate = true;
                        break;
                    }
                    None => {
                        object.insert(name.as_ref(), Value::Null);
                    }
                }
            }
            propagate_or(propagate, *non_null, Value::Object(object))
        }
        OutputTemplate::List { non_null, step, item } => {
            render_list(plan, *step, item, *non_null, bucket, row, path, errors)
        }
        OutputTemplate::Polymorphic { non_null, discriminator, by_type } => {
            render_polymorphic(plan, *discriminator, by_type, *non_null, bucket, row, path, errors)
        }
    }
}

/// Renders one `Object` field's sub-template. An object's fields are
/// ordinarily all planned into the same layer as their parent, so this just
/// forwards to `render_node` — except at the mutation root, the one place a
/// field's own steps live in a sibling `MutationField` layer rather than the
/// enclosing bucket; there this hops into that field's own child bucket
/// first, at the same row (mutation fields never fan out).
fn render_field(
    plan: &OperationPlan,
    template: &OutputTemplate,
    bucket: &Bucket,
    row: usize,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<SingleGraphQLError>,
) -> Option<Value> {
    match template_layer(plan, template) {
        Some(layer) if layer != bucket.layer => match bucket.children().iter().find(|c| c.layer == layer) {
            Some(child) => render_node(plan, template, child, row, path, errors),
            None => None,
        },
        _ => render_node(plan, template, bucket, row, path, errors),
    }
}

/// The layer a template's own driving step(s) were planned into. For
/// `Object`, every field is normally planned into the same layer as the
/// object itself, so any one field's layer stands in for the whole object's.
fn template_layer(plan: &OperationPlan, template: &OutputTemplate) -> Option<LayerId> {
    let step = match template {
        OutputTemplate::Leaf { step, .. } => *step,
        OutputTemplate::List { step, .. } => *step,
        OutputTemplate::Polymorphic { discriminator, .. } => *discriminator,
        OutputTemplate::Object { fields, .. } => {
            return fields.values().next().and_then(|t| template_layer(plan, t));
        }
    };
    Some(plan.arena.layer_of(plan.arena.resolve_ref(step)))
}

fn render_leaf(
    plan: &OperationPlan,
    step: StepId,
    non_null: bool,
    bucket: &Bucket,
    row: usize,
    path: &[PathSegment],
    errors: &mut Vec<SingleGraphQLError>,
) -> Option<Value> {
    let resolved = plan.arena.resolve_ref(step);
    match bucket.column(resolved).and_then(|column| column.get(row)) {
        Some(StepOutput::Value(value)) => {
            if non_null && matches!(value, Value::Null) {
                errors.push(non_null_violation(path));
                None
            } else {
                Some(value.clone())
            }
        }
        Some(StepOutput::Error(error)) => {
            errors.push(error.clone().with_path(path.to_vec()));
            None
        }
        Some(StepOutput::Flagged { .. }) | None => {
            if non_null {
                errors.push(non_null_violation(path));
                None
            } else {
                Some(Value::Null)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_list(
    plan: &OperationPlan,
    step: StepId,
    item_template: &OutputTemplate,
    non_null: bool,
    bucket: &Bucket,
    row: usize,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<SingleGraphQLError>,
) -> Option<Value> {
    let resolved = plan.arena.resolve_ref(step);
    match bucket.column(resolved).and_then(|column| column.get(row)) {
        Some(StepOutput::Error(error)) => {
            errors.push(error.clone().with_path(path.clone()));
            return None;
        }
        Some(StepOutput::Value(Value::Null)) | None => {
            return if non_null {
                errors.push(non_null_violation(path));
                None
            } else {
                Some(Value::Null)
            };
        }
        _ => {}
    }

    let Some(child) = child_bucket_for_step(plan, bucket, resolved, &|kind| match kind {
        LayerKind::ListItem { parent_step } | LayerKind::Subscription { parent_step } => Some(*parent_step),
        _ => None,
    }) else {
        // No child bucket means the list had zero elements; it was never
        // fanned out (core spec §4.5 — an empty fan-out spawns no bucket).
        return Some(Value::Array(Vec::new()));
    };

    let mut items = Vec::with_capacity(4);
    let mut propagate = false;
    for (index, child_row) in child_rows_for(child, row).into_iter().enumerate() {
        path.push(PathSegment::Index(index));
        let value = render_node(plan, item_template, child, child_row, path, errors);
        path.pop();
        match value {
            Some(value) => items.push(value),
            None if item_template.is_non_null() => {
                propagate = true;
                break;
            }
            None => items.push(Value::Null),
        }
    }
    propagate_or(propagate, non_null, Value::Array(items))
}

#[allow(clippy::too_many_arguments)]
fn render_polymorphic(
    plan: &OperationPlan,
    discriminator: StepId,
    by_type: &indexmap::IndexMap<std::sync::Arc<str>, OutputTemplate>,
    non_null: bool,
    bucket: &Bucket,
    row: usize,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<SingleGraphQLError>,
) -> Option<Value> {
    let resolved = plan.arena.resolve_ref(discriminator);
    let type_name = match bucket.column(resolved).and_then(|column| column.get(row)) {
        Some(StepOutput::Error(error)) => {
            errors.push(error.clone().with_path(path.clone()));
            return None;
        }
        Some(StepOutput::Value(Value::String(name))) => name.as_str().to_string(),
        _ => {
            return if non_null {
                errors.push(non_null_violation(path));
                None
            } else {
                Some(Value::Null)
            };
        }
    };

    let Some(sub_template) = by_type.get(type_name.as_str()) else {
        return if non_null { None } else { Some(Value::Null) };
    };

    let Some(child) = child_bucket_for_step(plan, bucket, resolved, &|kind| match kind {
        LayerKind::Polymorphic { discriminator, type_set } if type_set.iter().any(|t| t.as_ref() == type_name) => {
            Some(*discriminator)
        }
        _ => None,
    }) else {
        return if non_null { None } else { Some(Value::Null) };
    };

    let Some(&child_row) = child_rows_for(child, row).first() else {
        return if non_null { None } else { Some(Value::Null) };
    };

    let value = render_node(plan, sub_template, child, child_row, path, errors);
    match value {
        Some(value) => Some(value),
        None if non_null => None,
        None => Some(Value::Null),
    }
}

fn propagate_or(propagate: bool, non_null: bool, value: Value) -> Option<Value> {
    if propagate {
        if non_null {
            None
        } else {
            Some(Value::Null)
        }
    } else {
        Some(value)
    }
}

fn non_null_violation(path: &[PathSegment]) -> SingleGraphQLError {
    SingleGraphQLError::new("Cannot return null for non-nullable field").with_path(path.to_vec())
}

/// Finds the one child bucket of `bucket`'s layer whose `LayerKind` is
/// produced by `parent_step` equal (once resolved) to `resolved_step`, via
/// `extract` picking the candidate parent step out of each child's kind.
/// Transparently recurses through any direct-child `DeferStream` layer, which
/// wraps its own child rather than sitting beside it (core spec §4.4's
/// "executed eagerly alongside their parent" note applies to the search too).
fn child_bucket_for_step<'p>(
    plan: &'p OperationPlan,
    bucket: &'p Bucket,
    resolved_step: StepId,
    extract: &dyn Fn(&LayerKind) -> Option<StepId>,
) -> Option<&'p Bucket> {
    for child_id in &plan.layers.get(bucket.layer).children {
        let child_layer = plan.layers.get(*child_id);
        if matches!(child_layer.kind, LayerKind::DeferStream { .. }) {
            let Some(child_bucket) = bucket.children().iter().find(|c| c.layer == *child_id) else { continue };
            if let Some(found) = child_bucket_for_step(plan, child_bucket, resolved_step, extract) {
                return Some(found);
            }
            continue;
        }
        let Some(parent_step) = extract(&child_layer.kind) else { continue };
        if plan.arena.resolve_ref(parent_step) == resolved_step {
            return bucket.children().iter().find(|c| c.layer == *child_id);
        }
    }
    None
}

/// Every child-bucket row index spawned from `parent_row`, in child row order.
fn child_rows_for(child: &Bucket, parent_row: usize) -> Vec<usize> {
    match child.parent_map() {
        Some(map) => map.parent_rows().iter().enumerate().filter(|(_, &r)| r == parent_row).map(|(i, _)| i).collect(),
        None => Vec::new(),
    }
}
