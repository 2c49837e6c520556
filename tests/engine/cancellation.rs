use std::sync::{Arc, Mutex};

use stepgraph::context::OperationContext;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::StepId;

use crate::engine::steps::RecordingStep;
use crate::engine::support::{parse, run};

/// A cancellation signal tripped mid-mutation never undoes the field that
/// already ran, but stops any sibling field that hasn't started yet from
/// running at all — leaving its slot `null` rather than erroring.
#[test]
fn cancellation_after_the_first_field_leaves_later_fields_null() {
    let (schema, document) = parse("type Query { ping: Int } type Mutation { a: Int! b: Int c: Int }", "mutation { a b c }");

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let mut resolvers = PlanResolvers::new();

    let a_log = log.clone();
    resolvers.register(
        "Mutation",
        "a",
        Arc::new(move |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
            Ok(ctx.add_step(Box::new(RecordingStep { name: "a", log: a_log.clone(), cancel: true })))
        }),
    );
    for name in ["b", "c"] {
        let log = log.clone();
        resolvers.register(
            "Mutation",
            name,
            Arc::new(
                move |_parent: &StepId, _args: &FieldArgs, _info: &FieldInfo, ctx: &mut PlanningContext<'_>| {
                    Ok(ctx.add_step(Box::new(RecordingStep { name, log: log.clone(), cancel: false })))
                },
            ),
        );
    }

    let ctx = OperationContext::new();
    let response = run(&schema, &document, &resolvers, &ctx).unwrap();

    assert!(ctx.is_cancelled());
    assert_eq!(*log.lock().unwrap(), vec!["a"]);
    assert!(response.errors.is_empty());

    let data = response.data.unwrap();
    let object = data.as_object().unwrap();
    assert_eq!(object.get("a").unwrap().as_i64(), Some(1));
    assert!(object.get("b").map(|v| v.is_null()).unwrap_or(true));
    assert!(object.get("c").map(|v| v.is_null()).unwrap_or(true));
}
