use std::sync::Arc;

use stepgraph::config::{EngineConfig, IncrementalDeliveryConfig};
use stepgraph::context::OperationContext;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::root_value::LiteralStep;
use stepgraph::step::StepId;

use crate::engine::support::{parse, run, run_with_config};

const DIRECTIVES_SDL: &str = "
    directive @defer(label: String, if: Boolean = true) on FRAGMENT_SPREAD | INLINE_FRAGMENT
    directive @stream(label: String, initialCount: Int = 0, if: Boolean = true) on FIELD
";

fn config_with_defer_stream() -> EngineConfig {
    EngineConfig { incremental_delivery: IncrementalDeliveryConfig { enable_defer_stream: true }, ..EngineConfig::default() }
}

/// With `enable_defer_stream` on, a `@defer`-marked inline fragment's fields
/// still render in the one-shot response this executor produces (core spec
/// §4.4's "executed eagerly alongside their parent" note), rather than being
/// silently dropped.
#[test]
fn deferred_inline_fragment_fields_still_render() {
    let schema_src = format!("{DIRECTIVES_SDL} type Query {{ profile: Profile }} type Profile {{ id: Int name: String }}");
    let (schema, document) = parse(&schema_src, "{ profile { id ... @defer { name } } }");

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "profile",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::Null))))
            },
        ),
    );
    resolvers.register(
        "Profile",
        "id",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::from(1)))))
            },
        ),
    );
    resolvers.register(
        "Profile",
        "name",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("Ada".into())))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let config = config_with_defer_stream();
    let response = run_with_config(&schema, &document, &resolvers, &ctx, &config).unwrap();
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    let profile = data.as_object().unwrap().get("profile").unwrap().as_object().unwrap();
    assert_eq!(profile.get("id").unwrap().as_i64(), Some(1));
    assert_eq!(profile.get("name").unwrap().as_str(), Some("Ada"));
}

/// A `@stream`-marked list field's items still render through the nested
/// `DeferStream`-wrapped `ListItem` layer.
#[test]
fn streamed_list_field_items_still_render() {
    let schema_src = format!("{DIRECTIVES_SDL} type Query {{ tags: [String!]! }}");
    let (schema, document) = parse(&schema_src, "{ tags @stream }");

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "tags",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::Array(vec![
                    serde_json_bytes::Value::String("a".into()),
                    serde_json_bytes::Value::String("b".into()),
                ])))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let config = config_with_defer_stream();
    let response = run_with_config(&schema, &document, &resolvers, &ctx, &config).unwrap();
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    let tags = data.as_object().unwrap().get("tags").unwrap().as_array().unwrap();
    assert_eq!(tags.len(), 2);
}

/// With `enable_defer_stream` left off (the default), `@defer`/`@stream` are
/// simply ignored — the selection plans and renders as if neither directive
/// were present.
#[test]
fn directives_are_ignored_when_incremental_delivery_is_disabled() {
    let schema_src = format!("{DIRECTIVES_SDL} type Query {{ profile: Profile }} type Profile {{ id: Int name: String }}");
    let (schema, document) = parse(&schema_src, "{ profile { id ... @defer { name } } }");

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "profile",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::Null))))
            },
        ),
    );
    resolvers.register(
        "Profile",
        "id",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::from(1)))))
            },
        ),
    );
    resolvers.register(
        "Profile",
        "name",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("Ada".into())))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    let profile = data.as_object().unwrap().get("profile").unwrap().as_object().unwrap();
    assert_eq!(profile.get("name").unwrap().as_str(), Some("Ada"));
}
