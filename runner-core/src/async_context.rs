//! Async Context: a scoped key/value carrier passed through asynchronous
//! boundaries.
//!
//! Realized with `tokio::task_local!`, the idiomatic Rust analogue of a
//! continuation-scoped carrier: a value set with [`AsyncContextHandle::run_with`]
//! is visible to everything `.await`ed underneath that call, on the same
//! task, and nowhere else.

use std::any::Any;
use std::sync::Arc;
use std::future::Future;

use crate::errors::CoreError;
use crate::kind::Meta;

type ArcAny = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static CONTEXT_SLOTS: dashmap::DashMap<String, ArcAny>;
}

/// A registered async-context definition.
pub struct AsyncContextDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
}

impl AsyncContextDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
        }
    }
}

/// A typed, cloneable strongly-named wrapper used at definition time by user
/// code, e.g. `AsyncContext::<RequestId>::new("request-id")`.
pub struct AsyncContext<T> {
    def: AsyncContextDef,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync + Clone> AsyncContext<T> {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            def: AsyncContextDef::new(id),
            _marker: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn into_def(self) -> AsyncContextDef {
        self.def
    }
}

/// The injectable accessor pair for an async-context dependency: `get()` /
/// `set()` scoped to the current task-local slot map, plus `run_with` to
/// establish a fresh scope for downstream `.await`s.
#[derive(Clone)]
pub struct AsyncContextHandle {
    pub(crate) id: String,
}

impl AsyncContextHandle {
    /// Run `fut` with a freshly provisioned (empty) set of context slots
    /// available to it and anything it awaits.
    pub async fn run_with<F, R>(fut: F) -> R
    where
        F: Future<Output = R>,
    {
        CONTEXT_SLOTS.scope(dashmap::DashMap::new(), fut).await
    }

    /// Set this context's value for the remainder of the current scope.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if called outside of a
    /// scope established by [`AsyncContextHandle::run_with`].
    pub fn set<T: Any + Send + Sync>(&self, value: T) -> Result<(), CoreError> {
        CONTEXT_SLOTS
            .try_with(|slots| {
                slots.insert(self.id.clone(), Arc::new(value) as ArcAny);
            })
            .map_err(|_| CoreError::DependencyNotFound {
                what: format!("asyncContext '{}' has no active scope", self.id),
            })
    }

    /// Read this context's current value, if set within the active scope.
    #[must_use]
    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        CONTEXT_SLOTS
            .try_with(|slots| {
                slots
                    .get(&self.id)
                    .and_then(|v| v.downcast_ref::<T>().cloned())
            })
            .unwrap_or(None)
    }
}
