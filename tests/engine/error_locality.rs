use std::sync::Arc;

use stepgraph::context::OperationContext;
use stepgraph::error::PathSegment;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::root_value::LiteralStep;
use stepgraph::step::StepId;

use crate::engine::steps::RowErrorStep;
use crate::engine::support::{parse, run};

/// Two failing rows out of ten null only their own list item; the other
/// eight render normally and only two errors are reported, each at its own
/// item's path.
#[test]
fn two_failing_rows_in_a_ten_item_list_null_only_those_items() {
    let (schema, document) = parse("type Query { items: [Item]! } type Item { id: Int }", "{ items { id } }");

    let mut resolvers = PlanResolvers::new();
    resolvers.register(
        "Query",
        "items",
        Arc::new(
            |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                let placeholder = serde_json_bytes::Value::Array(vec![serde_json_bytes::Value::Null; 10]);
                Ok(ctx.add_step(Box::new(LiteralStep::new(placeholder))))
            },
        ),
    );
    resolvers.register(
        "Item",
        "id",
        Arc::new(
            |parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                Ok(ctx.add_step(Box::new(RowErrorStep::new(*parent, vec![3, 7]))))
            },
        ),
    );

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();

    assert_eq!(response.errors.len(), 2);
    let paths: Vec<Vec<PathSegment>> = response.errors.iter().map(|e| e.path.clone()).collect();
    assert!(paths.contains(&vec![PathSegment::Field("items".to_string()), PathSegment::Index(3)]));
    assert!(paths.contains(&vec![PathSegment::Field("items".to_string()), PathSegment::Index(7)]));

    let items = response.data.unwrap().as_object().unwrap().get("items").unwrap().as_array().unwrap().clone();
    assert_eq!(items.len(), 10);
    assert!(items[3].is_null());
    assert!(items[7].is_null());
    for (i, item) in items.iter().enumerate() {
        if i != 3 && i != 7 {
            assert!(!item.is_null(), "item {i} should have rendered, not been nulled");
        }
    }
}
