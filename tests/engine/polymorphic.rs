use std::sync::Arc;

use stepgraph::context::OperationContext;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::root_value::LiteralStep;
use stepgraph::step::StepId;

use crate::engine::support::{parse, run};

/// A union field resolves the concrete branch named by its `__typename`
/// resolver, not the branch the entity step happens to be planned through.
#[test]
fn union_field_renders_the_branch_its_typename_resolver_names() {
    let (schema, document) = parse(
        "type Query { pet: Pet } union Pet = Dog | Cat type Dog { name: String } type Cat { name: String }",
        "{ pet { ... on Dog { name } ... on Cat { name } } }",
    );

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "pet",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::Null))))
            },
        ),
    );
    resolvers.register(
        "Pet",
        "__typename",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("Dog".into())))))
            },
        ),
    );
    resolvers.register(
        "Dog",
        "name",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("Rex".into())))))
            },
        ),
    );
    resolvers.register(
        "Cat",
        "name",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("Whiskers".into())))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    let pet = data.as_object().unwrap().get("pet").unwrap().as_object().unwrap();
    assert_eq!(pet.get("name").unwrap().as_str(), Some("Rex"));
}

/// With no `__typename` resolver registered, the discriminator falls back to
/// the entity step itself — so an interface field whose concrete type
/// happens to match the entity's own shape still renders.
#[test]
fn interface_field_without_a_typename_resolver_falls_back_to_the_entity_step() {
    let (schema, document) = parse(
        "type Query { thing: Thing } interface Thing { id: Int } type Widget implements Thing { id: Int }",
        "{ thing { ... on Widget { id } } }",
    );

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "thing",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("Widget".into())))))
            },
        ),
    );
    resolvers.register(
        "Widget",
        "id",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::from(9)))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    let thing = data.as_object().unwrap().get("thing").unwrap().as_object().unwrap();
    assert_eq!(thing.get("id").unwrap().as_i64(), Some(9));
}
