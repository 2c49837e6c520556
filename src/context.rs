//! Per-operation shared state (core spec §5): an opaque context object
//! reachable from any step, plus the cancellation signal the executor
//! consults before starting each step.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::RwLock;

use indexmap::IndexMap;

/// Request-scope state a host stashes into the operation context (a
/// connection handle, per-operation settings, ...). The engine itself places
/// nothing here and never inspects the values; it only owns the slot.
#[derive(Default)]
pub struct SharedState {
    entries: IndexMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl SharedState {
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &'static str, value: T) {
        self.entries.insert(key, Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &'static str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref())
    }
}

/// A cancellation signal shared between the executor and whatever external
/// party (a transport timeout, a client disconnect) may need to abort an
/// in-flight operation.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The execution context passed to every step's `execute`: the cancellation
/// signal and the request-scope shared state. The engine holds no global
/// mutable state of its own; everything here is owned by one
/// `OperationPlan` and dropped at the end of the operation.
pub struct OperationContext {
    pub cancellation: CancellationToken,
    pub shared: Arc<RwLock<SharedState>>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            shared: Arc::new(RwLock::new(SharedState::default())),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
