//! The planner (core spec §4.2): walks a validated GraphQL operation against
//! a validated schema and a [`resolvers::PlanResolvers`] table, producing a
//! populated [`crate::plan::OperationPlan`] in the `Planning` state.

pub mod field_args;
pub mod resolvers;

use std::sync::Arc;

use apollo_compiler::ast;
use apollo_compiler::executable::{Field, Selection, SelectionSet};
use apollo_compiler::schema::{ExtendedType, Type};
use apollo_compiler::validation::Valid;
use apollo_compiler::{ExecutableDocument, Node, Schema};
use indexmap::IndexMap;
use tracing::instrument;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::plan::layer::{LayerId, LayerKind};
use crate::plan::output_template::OutputTemplate;
use crate::plan::OperationPlan;
use crate::step::root_value::{ContextStep, LiteralStep, RootValueStep};
use crate::step::StepId;
use field_args::{ArgValue, ArgumentStep, FieldArgs};
use resolvers::{FieldInfo, PlanResolvers, PlanningContext};

/// Everything the planner's recursive walk needs read access to; bundled so
/// the per-field/per-selection-set helpers don't each take five separate
/// borrows of the same three inputs.
struct Walk<'a> {
    document: &'a Valid<ExecutableDocument>,
    schema: &'a Valid<Schema>,
    resolvers: &'a PlanResolvers,
    config: &'a EngineConfig,
}

/// Plans `operation_name` (or the document's sole anonymous/named operation,
/// if there is exactly one) into a fresh [`OperationPlan`].
#[instrument(skip(document, schema, resolvers, config), fields(operation_name, step_count))]
pub fn plan_operation(
    document: &Valid<ExecutableDocument>,
    schema: &Valid<Schema>,
    operation_name: Option<&str>,
    resolvers: &PlanResolvers,
    config: &EngineConfig,
) -> Result<OperationPlan> {
    let operation = document
        .operations
        .get(operation_name)
        .map_err(|_| crate::internal_error!("no matching operation {operation_name:?} in document"))?;
    let walk = Walk { document, schema, resolvers, config };

    let mut plan = OperationPlan::new(operation_name.map(Arc::from));
    let root_layer = plan.root_layer();
    let root_step = plan.arena.add_step(Box::new(RootValueStep), root_layer);
    plan.layers.record_step(root_layer, root_step);
    let context_step = plan.arena.add_step(Box::new(ContextStep), root_layer);
    plan.layers.record_step(root_layer, context_step);

    let root_type_name: Arc<str> = operation.object_type().as_str().into();

    let template = if operation.is_mutation() {
        plan_mutation_root(&walk, &mut plan, root_step, root_type_name, &operation.selection_set)?
    } else {
        plan_selection_set(&walk, &mut plan, root_step, root_layer, root_type_name, &operation.selection_set)?
    };

    let mut referenced = Vec::new();
    template.referenced_steps(&mut referenced);
    for step in referenced {
        let layer = plan.arena.layer_of(step);
        plan.layers.get_mut(layer).output_steps.insert(step);
    }
    plan.output_template = Some(template);

    tracing::Span::current().record("step_count", plan.arena.len());
    plan.transition(crate::plan::PlanState::Optimizing)?;
    Ok(plan)
}

/// Mutation root fields are planned into sequential `MutationField` layers,
/// in document order, the only construct that enforces cross-step ordering
/// (core spec §4.2).
fn plan_mutation_root(
    walk: &Walk<'_>,
    plan: &mut OperationPlan,
    root_step: StepId,
    root_type_name: Arc<str>,
    selection_set: &SelectionSet,
) -> Result<OutputTemplate> {
    let root_layer = plan.root_layer();
    let mut fields = IndexMap::new();
    for (index, selection) in selection_set.selections.iter().enumerate() {
        let Selection::Field(field) = selection else {
            crate::bail!("mutation root selections must be plain fields");
        };
        let layer = plan.layers.add_child(
            root_layer,
            LayerKind::MutationField { sequence_index: index },
            format!("mutation field {}", field.name),
        );
        let template = plan_field(walk, plan, root_step, layer, root_type_name.clone(), field)?;
        fields.insert(Arc::from(field.response_key().as_str()), template);
    }
    Ok(OutputTemplate::Object { non_null: true, fields })
}

/// Plans every selection in `selection_set` against `parent_type_name`,
/// evaluated in `layer` with `parent_step` as each field's planning parent.
fn plan_selection_set(
    walk: &Walk<'_>,
    plan: &mut OperationPlan,
    parent_step: StepId,
    layer: LayerId,
    parent_type_name: Arc<str>,
    selection_set: &SelectionSet,
) -> Result<OutputTemplate> {
    if is_abstract_type(walk.schema, &parent_type_name) {
        return plan_polymorphic_selection(walk, plan, parent_step, layer, parent_type_name, selection_set);
    }

    let mut fields = IndexMap::new();
    for selection in flatten_selections(walk, selection_set, &parent_type_name) {
        let template = plan_field(walk, plan, parent_step, layer, parent_type_name.clone(), &selection)?;
        fields.insert(Arc::from(selection.response_key().as_str()), template);
    }
    if walk.config.incremental_delivery.enable_defer_stream {
        plan_deferred_fragments(walk, plan, parent_step, layer, &parent_type_name, selection_set, &mut fields)?;
    }
    Ok(OutputTemplate::Object { non_null: true, fields })
}

/// Walks `selection_set` for `@defer`-marked inline fragments and fragment
/// spreads (core spec §4.4, §4.6), each planned into its own `DeferStream`
/// child layer of `layer` — a sibling of the rest of the object's fields,
/// inserted into the same `fields` map — rather than inline with them.
/// Recurses into ordinary (non-deferred) nested fragments to find `@defer`
/// at any depth.
fn plan_deferred_fragments(
    walk: &Walk<'_>,
    plan: &mut OperationPlan,
    parent_step: StepId,
    layer: LayerId,
    parent_type_name: &str,
    selection_set: &SelectionSet,
    fields: &mut IndexMap<Arc<str>, OutputTemplate>,
) -> Result<()> {
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(_) => {}
            Selection::InlineFragment(inline) => {
                let condition_matches = inline
                    .type_condition
                    .as_ref()
                    .is_none_or(|c| type_implements(walk.schema, parent_type_name, c.as_str()));
                if !condition_matches {
                    continue;
                }
                match directive_label(&inline.directives, "defer") {
                    Some(label) => plan_one_deferred_fragment(
                        walk,
                        plan,
                        parent_step,
                        layer,
                        parent_type_name,
                        &inline.selection_set,
                        label,
                        fields,
                    )?,
                    None => {
                        plan_deferred_fragments(walk, plan, parent_step, layer, parent_type_name, &inline.selection_set, fields)?
                    }
                }
            }
            Selection::FragmentSpread(spread) => {
                let Some(fragment) = walk.document.fragments.get(&spread.fragment_name) else { continue };
                if !type_implements(walk.schema, parent_type_name, fragment.type_condition().as_str()) {
                    continue;
                }
                match directive_label(&spread.directives, "defer") {
                    Some(label) => plan_one_deferred_fragment(
                        walk,
                        plan,
                        parent_step,
                        layer,
                        parent_type_name,
                        &fragment.selection_set,
                        label,
                        fields,
                    )?,
                    None => plan_deferred_fragments(
                        walk,
                        plan,
                        parent_step,
                        layer,
                        parent_type_name,
                        &fragment.selection_set,
                        fields,
                    )?,
                }
            }
        }
    }
    Ok(())
}

fn plan_one_deferred_fragment(
    walk: &Walk<'_>,
    plan: &mut OperationPlan,
    parent_step: StepId,
    layer: LayerId,
    parent_type_name: &str,
    selection_set: &SelectionSet,
    label: Option<Arc<str>>,
    fields: &mut IndexMap<Arc<str>, OutputTemplate>,
) -> Result<()> {
    let defer_layer = plan.layers.add_child(layer, LayerKind::DeferStream { label }, "@defer fragment");
    for field in flatten_selections(walk, selection_set, parent_type_name) {
        let template = plan_field(walk, plan, parent_step, defer_layer, Arc::from(parent_type_name), &field)?;
        fields.insert(Arc::from(field.response_key().as_str()), template);
    }
    Ok(())
}

/// Builds one `Polymorphic` child layer per concrete type named by an inline
/// fragment or fragment spread in `selection_set`, each with its own
/// sub-template (core spec §4.2, §4.4).
fn plan_polymorphic_selection(
    walk: &Walk<'_>,
    plan: &mut OperationPlan,
    parent_step: StepId,
    layer: LayerId,
    parent_type_name: Arc<str>,
    selection_set: &SelectionSet,
) -> Result<OutputTemplate> {
    let discriminator = walk
        .resolvers
        .get(&parent_type_name, "__typename")
        .map(|resolver| {
            let info = FieldInfo {
                type_name: parent_type_name.clone(),
                field_name: Arc::from("__typename"),
                response_key: Arc::from("__typename"),
                is_list: false,
                is_non_null: true,
                is_abstract: false,
            };
            let mut ctx = PlanningContext { plan, layer };
            resolver(&parent_step, &FieldArgs::new(), &info, &mut ctx)
        })
        .transpose()?
        .unwrap_or(parent_step);

    let mut by_type = IndexMap::new();
    for type_name in concrete_types_in_selection(walk, selection_set, &parent_type_name) {
        let type_set = std::iter::once(Arc::from(type_name.as_str())).collect();
        let child_layer = plan.layers.add_child(
            layer,
            LayerKind::Polymorphic { discriminator, type_set },
            format!("type condition {type_name}"),
        );
        let object_template = {
            let mut fields = IndexMap::new();
            for selection in flatten_selections(walk, selection_set, &type_name) {
                let template =
                    plan_field(walk, plan, parent_step, child_layer, Arc::from(type_name.as_str()), &selection)?;
                fields.insert(Arc::from(selection.response_key().as_str()), template);
            }
            OutputTemplate::Object { non_null: true, fields }
        };
        by_type.insert(Arc::from(type_name.as_str()), object_template);
    }

    Ok(OutputTemplate::Polymorphic { non_null: true, discriminator, by_type })
}

/// Plans one field: resolves its plan resolver, invokes it, and recurses
/// into its selection set according to the field's type shape (list, object,
/// or scalar/enum leaf).
fn plan_field(
    walk: &Walk<'_>,
    plan: &mut OperationPlan,
    parent_step: StepId,
    layer: LayerId,
    parent_type_name: Arc<str>,
    field: &Node<Field>,
) -> Result<OutputTemplate> {
    let field_name = field.name.as_str();
    let field_type = field.ty();
    let named_type = named_type_of(field_type);
    let is_list = is_list_type(field_type);
    let is_non_null = field_type.is_non_null();
    let is_abstract = is_abstract_type(walk.schema, named_type.as_str());

    let args = build_field_args(plan, walk.schema, &parent_type_name, field)?;
    let info = FieldInfo {
        type_name: parent_type_name.clone(),
        field_name: Arc::from(field_name),
        response_key: Arc::from(field.response_key().as_str()),
        is_list,
        is_non_null,
        is_abstract,
    };

    let resolver = walk
        .resolvers
        .get(&parent_type_name, field_name)
        .ok_or_else(|| crate::internal_error!("no plan resolver registered for {parent_type_name}.{field_name}"))?;
    let value_step = {
        let mut ctx = PlanningContext { plan, layer };
        resolver(&parent_step, &args, &info, &mut ctx)?
    };

    if let Some(auto_apply) = walk.resolvers.get_auto_apply(&parent_type_name, field_name) {
        let mut ctx = PlanningContext { plan, layer };
        auto_apply(value_step, &args, &info, &mut ctx)?;
    }

    if field.selection_set.selections.is_empty() {
        return Ok(OutputTemplate::leaf(value_step, is_non_null));
    }

    if is_list {
        let stream_label = if walk.config.incremental_delivery.enable_defer_stream {
            directive_label(&field.directives, "stream")
        } else {
            None
        };
        let list_parent_layer = match stream_label {
            Some(label) => plan.layers.add_child(layer, LayerKind::DeferStream { label }, format!("@stream {field_name}")),
            None => layer,
        };
        let child_layer = plan.layers.add_child(
            list_parent_layer,
            LayerKind::ListItem { parent_step: value_step },
            format!("list item of {field_name}"),
        );
        let item = plan_selection_set(
            walk,
            plan,
            value_step,
            child_layer,
            named_type.as_str().into(),
            &field.selection_set,
        )?;
        return Ok(OutputTemplate::List { non_null: is_non_null, step: value_step, item: Box::new(item) });
    }

    let object = plan_selection_set(walk, plan, value_step, layer, named_type.as_str().into(), &field.selection_set)?;
    match object {
        OutputTemplate::Object { fields, .. } => Ok(OutputTemplate::Object { non_null: is_non_null, fields }),
        other => Ok(other),
    }
}

fn build_field_args(
    plan: &mut OperationPlan,
    schema: &Valid<Schema>,
    parent_type_name: &str,
    field: &Node<Field>,
) -> Result<FieldArgs> {
    let mut args = FieldArgs::new();
    for argument in &field.arguments {
        let required = argument_is_required(schema, parent_type_name, field.name.as_str(), argument.name.as_str());
        let schema = field_args::ArgumentSchema::new(required);
        args.declare(argument.name.as_str(), schema);
        let value = resolve_argument_value(plan, &argument.value)?;
        args.set(argument.name.as_str(), value);
    }
    Ok(args)
}

/// Whether `argument_name` on `parent_type_name.field_name` is declared
/// non-null with no default in `schema` — the standard GraphQL definition of
/// a required argument. Returns `false` for any parent type kind other than
/// an object or interface (unions carry no fields of their own), or if the
/// field or argument can't be found.
fn argument_is_required(schema: &Valid<Schema>, parent_type_name: &str, field_name: &str, argument_name: &str) -> bool {
    let fields = match schema.types.get(parent_type_name) {
        Some(ExtendedType::Object(obj)) => &obj.fields,
        Some(ExtendedType::Interface(iface)) => &iface.fields,
        _ => return false,
    };
    let Some(field_definition) = fields.get(field_name) else {
        return false;
    };
    field_definition
        .arguments
        .iter()
        .any(|arg| arg.name.as_str() == argument_name && arg.ty.is_non_null() && arg.default_value.is_none())
}

fn resolve_argument_value(plan: &mut OperationPlan, value: &ast::Value) -> Result<ArgValue> {
    if let ast::Value::Variable(name) = value {
        let step = plan.arena.add_step(Box::new(ArgumentStep::new(name.as_str())), plan.root_layer());
        return Ok(ArgValue::Dynamic(step));
    }
    let json = graphql_value_to_json(value);
    let canonical =
        serde_json::to_string(&serde_json::to_value(&json).unwrap_or(serde_json::Value::Null)).unwrap_or_default();
    if let Some(existing) = plan.literals.get(&canonical) {
        return Ok(ArgValue::Literal(existing));
    }
    let step = plan.arena.add_step(Box::new(LiteralStep::new(json)), plan.root_layer());
    plan.literals.insert(canonical, step);
    Ok(ArgValue::Literal(step))
}

fn graphql_value_to_json(value: &ast::Value) -> serde_json_bytes::Value {
    use serde_json_bytes::Value as J;
    match value {
        ast::Value::Null => J::Null,
        ast::Value::Boolean(b) => J::Bool(*b),
        ast::Value::Int(i) => i.try_to_i32().map(J::from).unwrap_or(J::Null),
        ast::Value::Float(f) => J::from(f.try_to_f64().unwrap_or(0.0)),
        ast::Value::String(s) => J::String(s.as_str().into()),
        ast::Value::Enum(e) => J::String(e.as_str().into()),
        ast::Value::List(items) => J::Array(items.iter().map(|v| graphql_value_to_json(v)).collect()),
        ast::Value::Object(entries) => {
            let mut map = serde_json_bytes::Map::new();
            for (key, val) in entries {
                map.insert(key.as_str(), graphql_value_to_json(val));
            }
            J::Object(map)
        }
        ast::Value::Variable(_) => J::Null,
    }
}

/// `None` if `directives` doesn't carry `name`; `Some(label)` if it does,
/// where `label` is that directive's `label: String` argument, if given.
fn directive_label(directives: &ast::DirectiveList, name: &str) -> Option<Option<Arc<str>>> {
    let directive = directives.iter().find(|d| d.name.as_str() == name)?;
    let label = directive
        .arguments
        .iter()
        .find(|arg| arg.name.as_str() == "label")
        .map(|arg| graphql_value_to_json(&arg.value))
        .and_then(|value| value.as_str().map(Arc::from));
    Some(label)
}

fn named_type_of(ty: &Type) -> apollo_compiler::schema::NamedType {
    ty.inner_named_type().clone()
}

fn is_list_type(ty: &Type) -> bool {
    matches!(ty, Type::List(_) | Type::NonNullList(_))
}

fn is_abstract_type(schema: &Valid<Schema>, type_name: &str) -> bool {
    matches!(schema.types.get(type_name), Some(ExtendedType::Interface(_)) | Some(ExtendedType::Union(_)))
}

/// Expands fragment spreads and inline fragments applicable to `type_name`
/// into a flat list of `Field` selections, in document order. Type
/// conditions that don't apply to `type_name` are skipped; fields of
/// abstract parent types are planned separately per concrete type by
/// [`plan_polymorphic_selection`], so this is only reached for concrete
/// parent types.
fn flatten_selections(walk: &Walk<'_>, selection_set: &SelectionSet, type_name: &str) -> Vec<Node<Field>> {
    let mut out = Vec::new();
    flatten_into(walk, selection_set, type_name, &mut out);
    out
}

fn flatten_into(walk: &Walk<'_>, selection_set: &SelectionSet, type_name: &str, out: &mut Vec<Node<Field>>) {
    let defer_enabled = walk.config.incremental_delivery.enable_defer_stream;
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => out.push(field.clone()),
            Selection::InlineFragment(inline) => {
                if defer_enabled && directive_label(&inline.directives, "defer").is_some() {
                    // Planned separately, as a `DeferStream` layer, by
                    // `plan_deferred_fragments`.
                    continue;
                }
                let condition = inline.type_condition.as_ref();
                if condition.is_none_or(|c| type_implements(walk.schema, type_name, c.as_str())) {
                    flatten_into(walk, &inline.selection_set, type_name, out);
                }
            }
            Selection::FragmentSpread(spread) => {
                if defer_enabled && directive_label(&spread.directives, "defer").is_some() {
                    continue;
                }
                if let Some(fragment) = walk.document.fragments.get(&spread.fragment_name) {
                    if type_implements(walk.schema, type_name, fragment.type_condition().as_str()) {
                        flatten_into(walk, &fragment.selection_set, type_name, out);
                    }
                }
            }
        }
    }
}

fn type_implements(schema: &Valid<Schema>, type_name: &str, condition: &str) -> bool {
    if type_name == condition {
        return true;
    }
    schema.types.get(condition).is_some_and(|ty| match ty {
        ExtendedType::Union(u) => u.members.iter().any(|m| m.as_str() == type_name),
        ExtendedType::Interface(_) => schema
            .types
            .get(type_name)
            .and_then(|t| t.implements_interfaces())
            .is_some_and(|impls| impls.iter().any(|i| i.as_str() == condition)),
        _ => false,
    })
}

/// Every concrete object type name reachable through `selection_set`'s type
/// conditions (inline fragments and named fragment spreads), for building
/// one `Polymorphic` layer per type (core spec §4.2, §4.4). Falls back to
/// every concrete implementer of the abstract type when the selection names
/// none explicitly (a bare `{ __typename }` selection on an interface).
fn concrete_types_in_selection(
    walk: &Walk<'_>,
    selection_set: &SelectionSet,
    abstract_type_name: &str,
) -> Vec<apollo_compiler::schema::NamedType> {
    let mut types = Vec::new();
    collect_type_conditions(walk, selection_set, &mut types);
    if types.is_empty() {
        if let Some(ExtendedType::Union(u)) = walk.schema.types.get(abstract_type_name) {
            types.extend(u.members.iter().cloned());
        } else if let Some(implementers) = walk.schema.implementers_map().get(abstract_type_name) {
            types.extend(implementers.objects.iter().cloned());
        }
    }
    types
}

fn collect_type_conditions(
    walk: &Walk<'_>,
    selection_set: &SelectionSet,
    types: &mut Vec<apollo_compiler::schema::NamedType>,
) {
    for selection in &selection_set.selections {
        match selection {
            Selection::InlineFragment(inline) => {
                if let Some(condition) = &inline.type_condition {
                    push_if_object(walk.schema, condition, types);
                }
                collect_type_conditions(walk, &inline.selection_set, types);
            }
            Selection::FragmentSpread(spread) => {
                if let Some(fragment) = walk.document.fragments.get(&spread.fragment_name) {
                    push_if_object(walk.schema, fragment.type_condition(), types);
                    collect_type_conditions(walk, &fragment.selection_set, types);
                }
            }
            Selection::Field(_) => {}
        }
    }
}

fn push_if_object(
    schema: &Valid<Schema>,
    condition: &apollo_compiler::schema::NamedType,
    types: &mut Vec<apollo_compiler::schema::NamedType>,
) {
    if matches!(schema.types.get(condition.as_str()), Some(ExtendedType::Object(_))) && !types.contains(condition) {
        types.push(condition.clone());
    }
}
