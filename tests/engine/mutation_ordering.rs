use std::sync::{Arc, Mutex};

use stepgraph::context::OperationContext;
use stepgraph::planner::field_args::FieldArgs;
use stepgraph::planner::resolvers::{FieldInfo, PlanResolvers, PlanningContext};
use stepgraph::step::StepId;

use crate::engine::steps::RecordingStep;
use crate::engine::support::{parse, run};

/// Mutation root fields run strictly in document order, even though each one
/// is planned into its own sibling layer.
#[test]
fn mutation_fields_execute_in_document_order() {
    let (schema, document) =
        parse("type Query { ping: Int } type Mutation { a: Int! b: Int! c: Int! }", "mutation { a b c }");

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let mut resolvers = PlanResolvers::new();
    for name in ["a", "b", "c"] {
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
    assert!(response.errors.is_empty());

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);

    let data = response.data.unwrap();
    let object = data.as_object().unwrap();
    for name in ["a", "b", "c"] {
        assert_eq!(object.get(name).unwrap().as_i64(), Some(1));
    }
}
