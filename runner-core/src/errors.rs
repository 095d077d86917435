//! Typed error taxonomy for the core runtime.
//!
//! Every failure the core can produce is a variant of [`CoreError`]. Callers
//! are expected to match on [`CoreError::kind`] (a stable string id) rather
//! than on the enum discriminant directly, so the string taxonomy stays the
//! load-bearing contract rather than Rust's own enum layout: one variant per
//! failure mode with `#[source]` chaining, plus a `kind()` accessor so
//! user-defined [`crate::definition::error_helper::ErrorHelper`]s and core
//! errors share one discipline.

use thiserror::Error;

/// Errors raised by the core runtime.
///
/// # Errors docs
/// Each variant documents the condition that produces it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("duplicate registration: id '{id}' is already registered as {existing_kind}")]
    DuplicateRegistration {
        id: String,
        existing_kind: &'static str,
    },

    #[error("duplicate tag '{tag_id}' on definition '{owner_id}'")]
    DuplicateTag { owner_id: String, tag_id: String },

    #[error("definition '{owner_id}' depends on tag '{tag_id}' that it carries itself")]
    SelfTagDependency { owner_id: String, tag_id: String },

    #[error("storeGenericItem received a value matching no known kind (debug: {debug})")]
    UnknownItemType { debug: String },

    #[error("dependency not found: {what}")]
    DependencyNotFound { what: String },

    #[error("hook '{hook_id}' targets unregistered event '{event_id}'")]
    EventNotFound { hook_id: String, event_id: String },

    #[error("circular dependency detected: {}", path.join(" -> "))]
    CircularDependencies { path: Vec<String> },

    #[error("parallel initialization cannot make progress; remaining: {}", remaining.join(", "))]
    ParallelInitScheduling { remaining: Vec<String> },

    #[error("store is already initialized")]
    StoreAlreadyInitialized,

    #[error("store is locked; mutation of '{what}' is no longer permitted")]
    StoreLocked { what: String },

    #[error("builder for '{id}' is missing required behavior: {missing}")]
    BuilderIncomplete { id: String, missing: &'static str },

    #[error(
        "middleware concurrency conflict: key '{key}' requested with limit {requested} but already bound to {existing}"
    )]
    MiddlewareConcurrencyConflict {
        key: String,
        existing: usize,
        requested: usize,
    },

    #[error("event cycle detected: re-entered '{event_id}' within its own handler chain")]
    EventCycle { event_id: String },

    #[error("validation failed for '{owner_id}': {message}")]
    ValidationFailed { owner_id: String, message: String },

    #[error("resource '{resource_id}' init failed")]
    ResourceInit {
        resource_id: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("resource '{resource_id}' dispose failed")]
    ResourceDispose {
        resource_id: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("task '{task_id}' execution failed")]
    TaskExecution {
        task_id: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("aggregate failure across {0} resources during parallel initialization")]
    Aggregate(Vec<CoreError>),

    /// A non-`Error` throw from user code, normalized to its string form.
    #[error("{message}")]
    Wrapped { message: String },

    /// A user-declared business error raised by kind, never by class
    /// identity, through a [`crate::definition::error_helper::ErrorHelper`].
    #[error(transparent)]
    Business(#[from] crate::definition::error_helper::TypedError),
}

impl CoreError {
    /// Stable kind id. Business errors return their declaring helper's own
    /// id instead of a fixed literal, since the core never distinguishes
    /// them by enum discriminant.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::DuplicateRegistration { .. } => "DuplicateRegistrationError",
            Self::DuplicateTag { .. } => "DuplicateTagError",
            Self::SelfTagDependency { .. } => "SelfTagDependencyError",
            Self::UnknownItemType { .. } => "UnknownItemTypeError",
            Self::DependencyNotFound { .. } => "DependencyNotFoundError",
            Self::EventNotFound { .. } => "EventNotFoundError",
            Self::CircularDependencies { .. } => "CircularDependenciesError",
            Self::ParallelInitScheduling { .. } => "ParallelInitSchedulingError",
            Self::StoreAlreadyInitialized => "StoreAlreadyInitializedError",
            Self::StoreLocked { .. } => "StoreLockedError",
            Self::BuilderIncomplete { .. } => "BuilderIncompleteError",
            Self::MiddlewareConcurrencyConflict { .. } => "MiddlewareConcurrencyConflictError",
            Self::EventCycle { .. } => "EventCycleError",
            Self::ValidationFailed { .. } => "ValidationError",
            Self::ResourceInit { .. } => "ResourceInitError",
            Self::ResourceDispose { .. } => "ResourceDisposeError",
            Self::TaskExecution { .. } => "TaskExecutionError",
            Self::Aggregate(_) => "AggregateError",
            Self::Wrapped { .. } => "WrappedError",
            Self::Business(typed) => typed.helper_id(),
        }
    }

    /// Wrap a non-`Error` user throw (the Rust analogue: a panic payload or a
    /// plain string), preserving its stringified form as the message.
    #[must_use]
    pub fn wrap_non_error(message: impl Into<String>) -> Self {
        Self::Wrapped {
            message: message.into(),
        }
    }

    /// Build an aggregate error from multiple failures: the first error of
    /// `errors` is reachable via [`CoreError::aggregate_cause`] as `cause`.
    #[must_use]
    pub fn aggregate(errors: Vec<CoreError>) -> Self {
        Self::Aggregate(errors)
    }

    /// The first error in an aggregate, used as its `cause`.
    #[must_use]
    pub fn aggregate_cause(&self) -> Option<&CoreError> {
        match self {
            Self::Aggregate(errors) => errors.first(),
            _ => None,
        }
    }
}
