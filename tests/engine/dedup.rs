use indexmap::IndexMap;

use stepgraph::config::EngineConfig;
use stepgraph::context::OperationContext;
use stepgraph::executor::Executor;
use stepgraph::optimizer::optimize_to_fixed_point;
use stepgraph::output::render;
use stepgraph::plan::output_template::OutputTemplate;
use stepgraph::plan::OperationPlan;
use stepgraph::step::key_projection::KeyProjectionStep;
use stepgraph::step::root_value::LiteralStep;

/// Two key-projection steps with an equal parent and an equal mapping
/// collapse onto one canonical step before execution, so both output fields
/// observe the same value even though they were planned as separate steps.
#[test]
fn two_equal_key_projections_collapse_onto_one_canonical_step() {
    let mut plan = OperationPlan::new(None);
    let layer = plan.root_layer();

    let mut source = serde_json_bytes::Map::new();
    source.insert("x", serde_json_bytes::Value::from(7));
    let parent = plan.arena.add_step(Box::new(LiteralStep::new(serde_json_bytes::Value::Object(source))), layer);
    plan.layers.record_step(layer, parent);

    let mapping_a: IndexMap<String, String> = [("a".to_string(), "x".to_string())].into_iter().collect();
    let a = plan.arena.add_step(Box::new(KeyProjectionStep::new(parent, mapping_a)), layer);
    plan.layers.record_step(layer, a);

    let mapping_b: IndexMap<String, String> = [("a".to_string(), "x".to_string())].into_iter().collect();
    let b = plan.arena.add_step(Box::new(KeyProjectionStep::new(parent, mapping_b)), layer);
    plan.layers.record_step(layer, b);

    let mut fields = IndexMap::new();
    fields.insert("p".into(), OutputTemplate::leaf(a, true));
    fields.insert("q".into(), OutputTemplate::leaf(b, true));
    plan.output_template = Some(OutputTemplate::Object { non_null: true, fields });

    let config = EngineConfig::default();
    optimize_to_fixed_point(&mut plan, &config).unwrap();
    assert_eq!(plan.arena.resolve_ref(b), plan.arena.resolve_ref(a));

    let ctx = OperationContext::new();
    let bucket = futures::executor::block_on(Executor::new(&plan, &ctx, &config).run());
    let response = render(&plan, &bucket);
    let data = response.data.unwrap();
    let object = data.as_object().unwrap();
    assert_eq!(object.get("p"), object.get("q"));
    assert_eq!(object.get("p").unwrap().as_object().unwrap().get("a").unwrap().as_i64(), Some(7));
}
