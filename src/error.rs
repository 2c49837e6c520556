//! Error taxonomy for the planning and execution engine.
//!
//! Mirrors the shape of a typical `FederationError`-style hierarchy: a small
//! set of leaf error kinds wrapped by an umbrella enum, built on `thiserror`.

use std::fmt::Write as _;

/// A single location, in the standard GraphQL sense, for an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// A segment of a response path, as carried on a `SingleGraphQLError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{name}"),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A GraphQL-response-shaped error: message, response path, source locations,
/// and an opaque extensions bag.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SingleGraphQLError {
    pub message: String,
    pub path: Vec<PathSegment>,
    pub locations: Vec<SourceLocation>,
    pub extensions: serde_json_bytes::Map<serde_json_bytes::ByteString, serde_json_bytes::Value>,
}

impl SingleGraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            locations: Vec::new(),
            extensions: Default::default(),
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }
}

/// An aggregate of several `SingleGraphQLError`s, e.g. from a row-localized
/// execution error affecting multiple rows, or several planner diagnostics
/// raised against the same operation.
#[derive(Debug, Clone, thiserror::Error)]
pub struct MultipleGraphQLErrors {
    pub errors: Vec<SingleGraphQLError>,
}

impl std::fmt::Display for MultipleGraphQLErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s) occurred:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n\n  - ")?;
            for c in error.to_string().chars() {
                if c == '\n' {
                    write!(f, "\n    ")?;
                } else {
                    f.write_char(c)?;
                }
            }
        }
        Ok(())
    }
}

/// The top-level error type for the engine, matching the five error kinds of
/// the core design: a schema/operation that cannot be planned at all, a
/// resolver that failed while constructing a step, a row-localized execution
/// failure, a deliberately user-visible error, and operation cancellation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The schema/operation is not valid for the supplied plan resolvers; fatal, no
    /// execution is attempted.
    #[error(transparent)]
    Planner(#[from] PlannerError),
    /// A plan resolver raised an error while constructing a step; fatal.
    #[error(transparent)]
    StepBuild(#[from] StepBuildError),
    /// A step produced an error for one or more rows; row-localized, surfaced by
    /// GraphQL's standard null-propagation rule.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// A deliberately user-visible error whose message is safe to return verbatim.
    #[error(transparent)]
    Safe(#[from] SafeError),
    /// The operation was aborted before completion.
    #[error(transparent)]
    Cancellation(#[from] CancellationError),
}

impl EngineError {
    /// True for error kinds that should abort planning/execution outright
    /// (as opposed to being localized to a response path).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Planner(_) | EngineError::StepBuild(_) | EngineError::Cancellation(_)
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Planner(PlannerError {
            message: message.into(),
            step_metadata: None,
        })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PlannerError {
    pub message: String,
    /// The diagnostic metadata of the step whose construction or optimization
    /// surfaced this error, when known, so the offending plan resolver can be
    /// identified.
    pub step_metadata: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct StepBuildError {
    pub message: String,
    pub field_path: Vec<PathSegment>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct ExecutionError(#[from] pub SingleGraphQLError);

#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct SafeError(#[from] pub SingleGraphQLError);

#[derive(Debug, Clone, thiserror::Error)]
#[error("operation cancelled: {reason}")]
pub struct CancellationError {
    pub reason: String,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Raise an internal `PlannerError` with a formatted message.
///
/// # Example
/// ```rust
/// use stepgraph::internal_error;
/// use stepgraph::error::EngineError;
/// # fn may_be_none() -> Option<()> { None }
///
/// let result: Result<(), EngineError> = may_be_none()
///     .ok_or_else(|| internal_error!("expected {} to be present", "the thing"));
/// ```
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::EngineError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal `PlannerError`.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ))
    }
}

/// An assertion that panics in debug builds and returns an internal error in
/// release builds. Use only for conditions that should never happen in
/// normal operation (graph invariant violations, exhausted arenas, etc).
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        if !$expr {
            debug_assert!(false, $( $arg )+);
            $crate::bail!( $( $arg )+ );
        }
    }
}
