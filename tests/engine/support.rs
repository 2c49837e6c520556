//! Shared plumbing for the end-to-end engine scenarios: parsing a schema and
//! operation in one call, and running the full plan/optimize/execute/render
//! pipeline against a given resolver table.

use apollo_compiler::validation::Valid;
use apollo_compiler::{ExecutableDocument, Schema};

use stepgraph::config::EngineConfig;
use stepgraph::context::OperationContext;
use stepgraph::error::Result;
use stepgraph::planner::resolvers::PlanResolvers;
use stepgraph::response::GraphQLResponse;

/// Parses and validates a schema, then an operation against it, matching the
/// two-step `Schema::parse_and_validate` / `ExecutableDocument::parse_and_validate`
/// pattern used for planner-facing integration tests.
pub fn parse(schema_src: &str, query_src: &str) -> (Valid<Schema>, Valid<ExecutableDocument>) {
    let schema = Schema::parse_and_validate(schema_src, "schema.graphql").unwrap();
    let document = ExecutableDocument::parse_and_validate(&schema, query_src, "operation.graphql").unwrap();
    (schema, document)
}

/// Runs `document` to completion with the default engine configuration.
pub fn run(
    schema: &Valid<Schema>,
    document: &Valid<ExecutableDocument>,
    resolvers: &PlanResolvers,
    ctx: &OperationContext,
) -> Result<GraphQLResponse> {
    run_with_config(schema, document, resolvers, ctx, &EngineConfig::default())
}

/// Runs `document` to completion with a caller-supplied engine configuration,
/// for scenarios (e.g. `@defer`/`@stream`) that only activate under
/// non-default config.
pub fn run_with_config(
    schema: &Valid<Schema>,
    document: &Valid<ExecutableDocument>,
    resolvers: &PlanResolvers,
    ctx: &OperationContext,
    config: &EngineConfig,
) -> Result<GraphQLResponse> {
    futures::executor::block_on(stepgraph::execute(document, schema, None, resolvers, config, ctx))
}
