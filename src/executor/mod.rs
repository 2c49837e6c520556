//! The executor (core spec §4.5, §5.2): walks the `LayerPlan` tree, running
//! each layer's steps in dependency order over one `Bucket` of rows and
//! spawning a child bucket per list item / polymorphic branch / mutation
//! field / deferred fragment.
//!
//! Ancestor-layer values are threaded down as an *owned* column map rather
//! than borrowed bucket references: a recursive `BoxFuture` can't hold a
//! borrow of a `Bucket` it is itself in the middle of constructing, so each
//! descent clones (and, for fan-out layers, broadcasts) the columns a child
//! needs instead of reaching back up through its parent.

use std::collections::{HashMap, HashSet, VecDeque};

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use tracing::Instrument;

use crate::bucket::{Bucket, ParentRowMap};
use crate::config::{EngineConfig, ResolveErrors};
use crate::context::OperationContext;
use crate::error::{Result, SingleGraphQLError};
use crate::plan::layer::{LayerId, LayerKind};
use crate::plan::OperationPlan;
use crate::step::{ColumnVec, Step, StepFlags, StepId, StepOutput};

/// The columns visible at the point a layer begins executing: every
/// ancestor step whose value this layer (or a step inside it) may depend on,
/// already broadcast into this bucket's row order.
type ColumnEnv = IndexMap<StepId, ColumnVec>;

pub struct Executor<'a> {
    plan: &'a OperationPlan,
    ctx: &'a OperationContext,
    config: &'a EngineConfig,
}

impl<'a> Executor<'a> {
    pub fn new(plan: &'a OperationPlan, ctx: &'a OperationContext, config: &'a EngineConfig) -> Self {
        Self { plan, ctx, config }
    }

    /// Runs the whole plan, returning the root bucket (and, transitively via
    /// `children()`, every descendant bucket the operation produced).
    pub async fn run(&self) -> Bucket {
        self.execute_layer(self.plan.root_layer(), ColumnEnv::new(), 1, None).await
    }

    fn execute_layer(
        &self,
        layer_id: LayerId,
        available: ColumnEnv,
        row_count: usize,
        parent: Option<ParentRowMap>,
    ) -> BoxFuture<'_, Bucket> {
        let span = tracing::debug_span!("bucket", layer = layer_id.index(), rows = row_count);
        async move {
            let mut bucket = Bucket::new(layer_id, row_count, parent);

            if self.ctx.is_cancelled() {
                self.kill_all(&mut bucket);
                return bucket;
            }

            let order = match topo_sort_layer(self.plan, layer_id) {
                Ok(order) => order,
                Err(_) => {
                    self.kill_all(&mut bucket);
                    return bucket;
                }
            };

            let mut columns = available;
            for id in order {
                if self.ctx.is_cancelled() {
                    self.kill_all(&mut bucket);
                    return bucket;
                }
                let output = self.execute_step(id, &columns, &bucket, row_count).await;
                bucket.set_column(id, output.clone());
                if self.config.resolve_errors == ResolveErrors::Propagate
                    && output.iter().any(|value| matches!(value, StepOutput::Error(_)))
                {
                    self.ctx.cancellation.cancel();
                }
                columns.insert(id, output);
            }

            self.execute_children(layer_id, &columns, &mut bucket).await;
            bucket
        }
        .instrument(span)
        .boxed()
    }

    async fn execute_step(
        &self,
        id: StepId,
        columns: &ColumnEnv,
        bucket: &Bucket,
        row_count: usize,
    ) -> ColumnVec {
        let step = self.plan.arena.step(id);
        let dep_ids: Vec<StepId> = step
            .dependencies()
            .iter()
            .map(|dep| self.plan.arena.resolve_ref(*dep))
            .collect();

        if step.flags().contains(StepFlags::SYNC_AND_SAFE) {
            if let Some(column) = try_execute_row_sync(step, &dep_ids, columns, bucket, row_count) {
                return column;
            }
        }

        let inputs: Vec<ColumnVec> = dep_ids
            .iter()
            .map(|dep| columns.get(dep).cloned().unwrap_or_else(|| vec![StepOutput::null(); row_count]))
            .collect();
        self.execute_batched(step, &inputs, row_count).await
    }

    /// Runs `step.execute` over `inputs`, splitting into chunks of at most
    /// `config.max_bucket_size` rows so a single pathological list can't
    /// force an unbounded batch through one `execute` call.
    async fn execute_batched(&self, step: &dyn Step, inputs: &[ColumnVec], row_count: usize) -> ColumnVec {
        let chunk_size = self.config.max_bucket_size.max(1);
        if row_count <= chunk_size {
            return step.execute(inputs, self.ctx).await;
        }

        let mut output = Vec::with_capacity(row_count);
        let mut start = 0;
        while start < row_count {
            let end = (start + chunk_size).min(row_count);
            let chunk_inputs: Vec<ColumnVec> = inputs.iter().map(|column| column[start..end].to_vec()).collect();
            output.extend(step.execute(&chunk_inputs, self.ctx).await);
            start = end;
        }
        output
    }

    async fn execute_children(&self, layer_id: LayerId, columns: &ColumnEnv, bucket: &mut Bucket) {
        let mutation_children = self.plan.layers.mutation_field_children(layer_id);
        if !mutation_children.is_empty() {
            // Mutation fields are the one construct the core spec requires to
            // run in strict document order, so these siblings are awaited
            // one at a time rather than fanned out.
            for child_id in mutation_children {
                if self.ctx.is_cancelled() {
                    break;
                }
                let child = self.execute_layer(child_id, columns.clone(), bucket.row_count(), None).await;
                bucket.add_child(child);
            }
            return;
        }

        let children: Vec<LayerId> = self.plan.layers.get(layer_id).children.clone();
        for child_id in children {
            if self.ctx.is_cancelled() {
                break;
            }
            let child_layer = self.plan.layers.get(child_id);
            match &child_layer.kind {
                LayerKind::MutationField { .. } => {
                    // Handled above; reachable only if a future LayerKind
                    // mixes mutation fields with other child kinds under one
                    // parent, which planning never produces today.
                }
                LayerKind::ListItem { parent_step } | LayerKind::Subscription { parent_step } => {
                    let Some(map) = fan_out_rows(self.plan, *parent_step, columns, bucket, |value| match value {
                        StepOutput::Value(serde_json_bytes::Value::Array(items)) => Some(items.len()),
                        _ => None,
                    }) else {
                        continue;
                    };
                    let child_columns = broadcast_columns(columns, &map);
                    let child = self.execute_layer(child_id, child_columns, map.len(), Some(map)).await;
                    bucket.add_child(child);
                }
                LayerKind::Polymorphic { discriminator, type_set } => {
                    let Some(map) = fan_out_rows(self.plan, *discriminator, columns, bucket, |value| match value {
                        StepOutput::Value(serde_json_bytes::Value::String(type_name))
                            if type_set.iter().any(|t| t.as_ref() == type_name.as_str()) =>
                        {
                            Some(1)
                        }
                        _ => None,
                    }) else {
                        continue;
                    };
                    let child_columns = broadcast_columns(columns, &map);
                    let child = self.execute_layer(child_id, child_columns, map.len(), Some(map)).await;
                    bucket.add_child(child);
                }
                LayerKind::DeferStream { .. } => {
                    // Delivered eagerly alongside the primary response: this
                    // executor returns one completed bucket tree rather than
                    // a stream, so there is no later moment to defer to.
                    let identity = ParentRowMap::new((0..bucket.row_count()).collect());
                    let child = self
                        .execute_layer(child_id, columns.clone(), bucket.row_count(), Some(identity))
                        .await;
                    bucket.add_child(child);
                }
                LayerKind::Root => {}
            }
        }
    }

    fn kill_all(&self, bucket: &mut Bucket) {
        let error = SingleGraphQLError::new("operation cancelled");
        for row in 0..bucket.row_count() {
            if bucket.is_alive(row) {
                bucket.kill_row(row, error.clone());
            }
        }
    }
}

/// The `SYNC_AND_SAFE` fast path: runs a step's `execute_row_sync` for every
/// alive row, bypassing the batched `Future` machinery. Returns `None` (and
/// lets the caller fall back to `Step::execute`) as soon as any row declines
/// the fast path or a dependency's column is missing.
fn try_execute_row_sync(
    step: &dyn Step,
    dep_ids: &[StepId],
    columns: &ColumnEnv,
    bucket: &Bucket,
    row_count: usize,
) -> Option<ColumnVec> {
    let mut out = Vec::with_capacity(row_count);
    for row in 0..row_count {
        if !bucket.is_alive(row) {
            out.push(StepOutput::null());
            continue;
        }
        let mut refs = Vec::with_capacity(dep_ids.len());
        for dep in dep_ids {
            refs.push(columns.get(dep)?.get(row)?);
        }
        out.push(step.execute_row_sync(&refs)?);
    }
    Some(out)
}

/// Topologically orders one layer's own steps (Kahn's algorithm), counting
/// an edge only when the dependency also lives in this layer — a dependency
/// resolved to an ancestor layer is guaranteed already computed, since
/// ancestor buckets finish entirely before their children start.
fn topo_sort_layer(plan: &OperationPlan, layer_id: LayerId) -> Result<Vec<StepId>> {
    let steps: Vec<StepId> = plan
        .layers
        .get(layer_id)
        .steps
        .iter()
        .copied()
        .filter(|id| plan.arena.resolve_ref(*id) == *id)
        .collect();
    let local: HashSet<StepId> = steps.iter().copied().collect();

    let mut in_degree: HashMap<StepId, usize> = steps.iter().map(|id| (*id, 0)).collect();
    let mut dependents: HashMap<StepId, Vec<StepId>> = HashMap::new();
    for &id in &steps {
        for dep in plan.arena.step(id).dependencies() {
            let resolved = plan.arena.resolve_ref(*dep);
            if local.contains(&resolved) {
                *in_degree.get_mut(&id).unwrap() += 1;
                dependents.entry(resolved).or_default().push(id);
            }
        }
    }

    let mut queue: VecDeque<StepId> = steps.iter().copied().filter(|id| in_degree[id] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(next) = dependents.get(&id) {
            for &dependent in next {
                let entry = in_degree.get_mut(&dependent).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() != steps.len() {
        crate::bail!("cycle detected among steps in layer {layer_id:?}");
    }
    Ok(order)
}

/// Builds the parent-row map for a fan-out child layer: for every alive
/// parent row, `count(value)` decides how many child rows it spawns (0 for
/// "doesn't apply", 1 for a polymorphic match, N for a list of length N).
fn fan_out_rows(
    plan: &OperationPlan,
    parent_step: StepId,
    columns: &ColumnEnv,
    bucket: &Bucket,
    count: impl Fn(&StepOutput) -> Option<usize>,
) -> Option<ParentRowMap> {
    let resolved = plan.arena.resolve_ref(parent_step);
    let parent_column = columns.get(&resolved)?;
    let mut parent_rows = Vec::new();
    for (row, value) in parent_column.iter().enumerate() {
        if !bucket.is_alive(row) {
            continue;
        }
        if let Some(n) = count(value) {
            parent_rows.extend(std::iter::repeat(row).take(n));
        }
    }
    if parent_rows.is_empty() {
        return None;
    }
    Some(ParentRowMap::new(parent_rows))
}

fn broadcast_columns(columns: &ColumnEnv, map: &ParentRowMap) -> ColumnEnv {
    columns.iter().map(|(id, column)| (*id, map.broadcast(column))).collect()
}
