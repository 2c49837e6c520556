//! A batching, deduplicating GraphQL step planner and executor.
//!
//! A GraphQL operation is planned once into an [`plan::OperationPlan`]: a
//! graph of [`step::Step`]s partitioned into nested [`plan::layer::LayerPlan`]
//! scopes. The [`optimizer`] collapses, hoists, and folds steps to a fixed
//! point, the [`executor`] runs the result as a tree of [`bucket::Bucket`]s,
//! and [`output`] renders the executed buckets against the plan's template
//! into a [`response::GraphQLResponse`].

pub mod bucket;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod optimizer;
pub mod output;
pub mod plan;
pub mod planner;
pub mod response;
pub mod step;

use apollo_compiler::validation::Valid;
use apollo_compiler::{ExecutableDocument, Schema};

use crate::config::EngineConfig;
use crate::context::OperationContext;
use crate::error::Result;
use crate::planner::resolvers::PlanResolvers;
use crate::response::GraphQLResponse;

/// Plans and runs one GraphQL operation end to end: builds the step graph,
/// optimizes it to a fixed point, executes it, and renders the response.
///
/// Hosts that need to inspect or cache the plan between stages should call
/// [`planner::plan_operation`], [`optimizer::optimize_to_fixed_point`], and
/// [`executor::Executor`] directly instead of going through this shortcut.
pub async fn execute(
    document: &Valid<ExecutableDocument>,
    schema: &Valid<Schema>,
    operation_name: Option<&str>,
    resolvers: &PlanResolvers,
    config: &EngineConfig,
    ctx: &OperationContext,
) -> Result<GraphQLResponse> {
    let mut plan = planner::plan_operation(document, schema, operation_name, resolvers, config)?;
    optimizer::optimize_to_fixed_point(&mut plan, config)?;
    plan.transition(plan::PlanState::Executing)?;
    let root = executor::Executor::new(&plan, ctx, config).run().await;
    plan.transition(plan::PlanState::Complete)?;
    Ok(output::render(&plan, &root))
}
