//! Test-only step kinds that observe batching, ordering, and error-locality
//! behavior the built-in steps don't exercise on their own.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json_bytes::Value;

use stepgraph::context::OperationContext;
use stepgraph::error::SingleGraphQLError;
use stepgraph::step::{sync_batch, ColumnVec, Step, StepFlags, StepFuture, StepId, StepKindTag, StepOutput};

/// Produces a fixed-length placeholder array and counts how many times its
/// batched `execute` actually ran.
#[derive(Debug)]
pub struct CountingListStep {
    pub len: usize,
    pub fetches: Arc<AtomicUsize>,
}

impl Step for CountingListStep {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &[]
    }

    fn flags(&self) -> StepFlags {
        StepFlags::NONE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Custom
    }

    fn execute<'a>(&'a self, inputs: &'a [ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let rows = inputs.first().map(|c| c.len()).unwrap_or(1);
        let len = self.len;
        Box::pin(async move {
            (0..rows)
                .map(|_| {
                    let items = (0..len).map(|i| Value::from(i as i64)).collect();
                    StepOutput::Value(Value::Array(items))
                })
                .collect()
        })
    }
}

/// Stands in for a per-item subfield: depends on the broadcasted array step
/// (only to inherit the right row count) and counts how many times its
/// batched `execute` ran — once per bucket, regardless of row count.
#[derive(Debug)]
pub struct CountingProjectionStep {
    dependencies: [StepId; 1],
    pub fetches: Arc<AtomicUsize>,
}

impl CountingProjectionStep {
    pub fn new(parent: StepId, fetches: Arc<AtomicUsize>) -> Self {
        Self { dependencies: [parent], fetches }
    }
}

impl Step for CountingProjectionStep {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &self.dependencies
    }

    fn flags(&self) -> StepFlags {
        StepFlags::NONE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Custom
    }

    fn execute<'a>(&'a self, inputs: &'a [ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let rows = inputs[0].len();
        sync_batch(rows, |row| StepOutput::Value(Value::from(row as i64)))
    }
}

/// A side-effecting step that appends its name to a shared log when it runs,
/// for observing mutation-field ordering. Optionally trips the operation's
/// cancellation signal as part of its own side effect, for observing how a
/// cancellation arriving mid-operation leaves later mutation fields unrun.
#[derive(Debug)]
pub struct RecordingStep {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<&'static str>>>,
    pub cancel: bool,
}

impl Step for RecordingStep {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &[]
    }

    fn flags(&self) -> StepFlags {
        StepFlags::SIDE_EFFECTING
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Custom
    }

    fn execute<'a>(&'a self, inputs: &'a [ColumnVec], ctx: &'a OperationContext) -> StepFuture<'a> {
        let rows = inputs.first().map(|c| c.len()).unwrap_or(1);
        self.log.lock().expect("log mutex poisoned").push(self.name);
        if self.cancel {
            ctx.cancellation.cancel();
        }
        sync_batch(rows, |_| StepOutput::Value(Value::from(1)))
    }
}

/// Replays a fixed list of values, erroring on the rows named in `error_rows`
/// instead of producing a value — for observing per-row error locality.
/// Depends on `parent` only to inherit the bucket's row count.
#[derive(Debug)]
pub struct RowErrorStep {
    dependencies: [StepId; 1],
    pub error_rows: Vec<usize>,
}

impl RowErrorStep {
    pub fn new(parent: StepId, error_rows: Vec<usize>) -> Self {
        Self { dependencies: [parent], error_rows }
    }
}

impl Step for RowErrorStep {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dependencies(&self) -> &[StepId] {
        &self.dependencies
    }

    fn flags(&self) -> StepFlags {
        StepFlags::NONE
    }

    fn kind_tag(&self) -> StepKindTag {
        StepKindTag::Custom
    }

    fn execute<'a>(&'a self, inputs: &'a [ColumnVec], _ctx: &'a OperationContext) -> StepFuture<'a> {
        let rows = inputs[0].len();
        let error_rows = self.error_rows.clone();
        Box::pin(async move {
            (0..rows)
                .map(|row| {
                    if error_rows.contains(&row) {
                        StepOutput::Error(SingleGraphQLError::new(format!("row {row} failed")))
                    } else {
                        StepOutput::Value(Value::from(row as i64))
                    }
                })
                .collect()
        })
    }
}
