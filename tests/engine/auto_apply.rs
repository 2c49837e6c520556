use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stepgraph::context::OperationContext;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::root_value::LiteralStep;
use stepgraph::step::StepId;

use crate::engine::support::{parse, run};

/// A resolver registered via `register_with_auto_apply` has its auto-apply
/// hook invoked automatically once per field plan, right after its own
/// resolver produced a step, without the resolver having to call it itself.
#[test]
fn auto_apply_hook_runs_once_after_the_owning_fields_plan() {
    let (schema, document) = parse("type Query { greeting: String }", "{ greeting }");

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_hook = Arc::clone(&calls);

    let mut resolvers = PlanResolvers::new();
    resolvers.register_with_auto_apply(
        "Query",
        "greeting",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("hi".into())))))
            },
        ),
        Arc::new(move |_step: StepId, _args: &FieldArgs, _info: &FieldInfo, _ctx: &mut PlanningContext<'_>| {
            calls_in_hook.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    assert_eq!(data.as_object().unwrap().get("greeting").unwrap().as_str(), Some("hi"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A plain `register` call (no auto-apply) never invokes any hook.
#[test]
fn plain_register_does_not_invoke_any_hook() {
    let (schema, document) = parse("type Query { greeting: String }", "{ greeting }");

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "greeting",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::String("hi".into())))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();
    assert!(response.errors.is_empty());
}
