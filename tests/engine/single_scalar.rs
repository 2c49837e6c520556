use std::sync::Arc;

use stepgraph::context::OperationContext;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::root_value::LiteralStep;
use stepgraph::step::StepId;

use crate::engine::support::{parse, run};

#[test]
fn single_scalar_field_resolves_to_its_literal_value() {
    let (schema, document) = parse("type Query { value: Int }", "{ value }");

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "value",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::from(42)))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();
    assert!(response.errors.is_empty());
    let data = response.data.unwrap();
    assert_eq!(data.as_object().unwrap().get("value").unwrap().as_i64(), Some(42));
}
