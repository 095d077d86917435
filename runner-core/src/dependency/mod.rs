//! Dependency values: what a dependency map *declares* (`DependencyRef`) and
//! what it *resolves to* at extraction time (`DependencyValue` /
//! [`ComputedDeps`]).
//!
//! A dependency map is declared as `HashMap<String, DependencyRef>` rather
//! than an opaque generic struct: Rust has no runtime reflection over
//! arbitrary struct fields, so a declared map can't be introspected field by
//! field the way a dynamically-typed object can.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::event::EventEmitter;
use crate::task_runner::TaskHandle;
use crate::definition::error_helper::ErrorHelper;
use crate::definition::tag::TagAccessor;
use crate::async_context::AsyncContextHandle;

pub mod extractor;

/// A boxed, shared, type-erased value — the representation a resource's
/// initialized value is stored and passed around as.
pub type ArcAny = Arc<dyn Any + Send + Sync>;

/// What a dependency map entry *declares*: a reference to another
/// definition by id, with `Optional`/`Startup` wrapper flags.
#[derive(Debug, Clone)]
pub enum DependencyRef {
    Resource { id: String, optional: bool, startup: bool },
    Task { id: String, optional: bool },
    Event { id: String, optional: bool },
    Tag { id: String, optional: bool, startup: bool },
    Error { id: String, optional: bool },
    AsyncContext { id: String, optional: bool },
    /// The middleware manager itself, injected with an owner-aware facade.
    MiddlewareManager,
}

impl DependencyRef {
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        match self {
            DependencyRef::Resource { id, .. }
            | DependencyRef::Task { id, .. }
            | DependencyRef::Event { id, .. }
            | DependencyRef::Tag { id, .. }
            | DependencyRef::Error { id, .. }
            | DependencyRef::AsyncContext { id, .. } => Some(id),
            DependencyRef::MiddlewareManager => None,
        }
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        match self {
            DependencyRef::Resource { optional, .. }
            | DependencyRef::Task { optional, .. }
            | DependencyRef::Event { optional, .. }
            | DependencyRef::Tag { optional, .. }
            | DependencyRef::Error { optional, .. }
            | DependencyRef::AsyncContext { optional, .. } => *optional,
            DependencyRef::MiddlewareManager => false,
        }
    }

    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            DependencyRef::Resource { startup: true, .. } | DependencyRef::Tag { startup: true, .. }
        )
    }

    /// Build an `Optional`-wrapped copy of this reference: a missing
    /// optional dependency collapses to `None` instead of failing.
    #[must_use]
    pub fn optional(self) -> Self {
        match self {
            DependencyRef::Resource { id, startup, .. } => DependencyRef::Resource {
                id,
                optional: true,
                startup,
            },
            DependencyRef::Task { id, .. } => DependencyRef::Task { id, optional: true },
            DependencyRef::Event { id, .. } => DependencyRef::Event { id, optional: true },
            DependencyRef::Tag { id, startup, .. } => DependencyRef::Tag {
                id,
                optional: true,
                startup,
            },
            DependencyRef::Error { id, .. } => DependencyRef::Error { id, optional: true },
            DependencyRef::AsyncContext { id, .. } => DependencyRef::AsyncContext { id, optional: true },
            DependencyRef::MiddlewareManager => DependencyRef::MiddlewareManager,
        }
    }

    /// Build a `Startup`-wrapped copy: the target must be ready before the
    /// dependent's init begins, in parallel mode.
    #[must_use]
    pub fn startup(self) -> Self {
        match self {
            DependencyRef::Resource { id, optional, .. } => DependencyRef::Resource {
                id,
                optional,
                startup: true,
            },
            DependencyRef::Tag { id, optional, .. } => DependencyRef::Tag {
                id,
                optional,
                startup: true,
            },
            other => other,
        }
    }
}

/// A declared dependency map: key → reference.
pub type DependencyMap = HashMap<String, DependencyRef>;

/// What a dependency map entry *resolves to* once the Dependency Extractor
/// has run.
#[derive(Clone)]
pub enum DependencyValue {
    Resource(ArcAny),
    Task(TaskHandle),
    Event(EventEmitter),
    Tag(TagAccessor),
    Error(Arc<ErrorHelper>),
    AsyncContext(AsyncContextHandle),
    MiddlewareManager(crate::middleware_manager::OwnedMiddlewareHandle),
    /// `Optional` wrapper collapsed because the target is missing.
    Missing,
}

/// The computed, injectable dependency values for one holder (a resource,
/// task, hook, or middleware instance).
#[derive(Clone, Default)]
pub struct ComputedDeps(HashMap<String, DependencyValue>);

impl ComputedDeps {
    #[must_use]
    pub fn new(values: HashMap<String, DependencyValue>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DependencyValue> {
        self.0.get(key)
    }

    /// Fetch a resource dependency and downcast its value to `T`.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if `key` is absent, missing,
    /// not a resource, or the value does not downcast to `T`.
    pub fn resource<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::Resource(value)) => {
                Arc::clone(value).downcast::<T>().map_err(|_| CoreError::DependencyNotFound {
                    what: format!("resource dependency '{key}' has an unexpected type"),
                })
            }
            Some(DependencyValue::Missing) | None => Err(CoreError::DependencyNotFound {
                what: format!("resource dependency '{key}'"),
            }),
            Some(_) => Err(CoreError::DependencyNotFound {
                what: format!("dependency '{key}' is not a resource"),
            }),
        }
    }

    /// Fetch an optional resource dependency; `None` when missing.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if present but of the wrong
    /// kind or type.
    pub fn resource_optional<T: Any + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<Arc<T>>, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::Missing) | None => Ok(None),
            Some(DependencyValue::Resource(value)) => Arc::clone(value)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| CoreError::DependencyNotFound {
                    what: format!("resource dependency '{key}' has an unexpected type"),
                }),
            Some(_) => Err(CoreError::DependencyNotFound {
                what: format!("dependency '{key}' is not a resource"),
            }),
        }
    }

    /// Fetch a task dependency as a callable handle.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if absent or not a task.
    pub fn task(&self, key: &str) -> Result<TaskHandle, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::Task(handle)) => Ok(handle.clone()),
            _ => Err(CoreError::DependencyNotFound {
                what: format!("task dependency '{key}'"),
            }),
        }
    }

    /// Fetch an event dependency as an emitter.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if absent or not an event.
    pub fn event(&self, key: &str) -> Result<EventEmitter, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::Event(emitter)) => Ok(emitter.clone()),
            _ => Err(CoreError::DependencyNotFound {
                what: format!("event dependency '{key}'"),
            }),
        }
    }

    /// Fetch a tag dependency as a scoped accessor.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if absent or not a tag.
    pub fn tag(&self, key: &str) -> Result<TagAccessor, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::Tag(accessor)) => Ok(accessor.clone()),
            _ => Err(CoreError::DependencyNotFound {
                what: format!("tag dependency '{key}'"),
            }),
        }
    }

    /// Fetch a typed error helper dependency.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if absent or not an error.
    pub fn error_helper(&self, key: &str) -> Result<Arc<ErrorHelper>, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::Error(helper)) => Ok(Arc::clone(helper)),
            _ => Err(CoreError::DependencyNotFound {
                what: format!("error dependency '{key}'"),
            }),
        }
    }

    /// Fetch an async-context dependency.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if absent or not an async context.
    pub fn async_context(&self, key: &str) -> Result<AsyncContextHandle, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::AsyncContext(handle)) => Ok(handle.clone()),
            _ => Err(CoreError::DependencyNotFound {
                what: format!("asyncContext dependency '{key}'"),
            }),
        }
    }

    /// Fetch the owner-aware middleware manager facade.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if absent.
    pub fn middleware_manager(
        &self,
        key: &str,
    ) -> Result<crate::middleware_manager::OwnedMiddlewareHandle, CoreError> {
        match self.0.get(key) {
            Some(DependencyValue::MiddlewareManager(handle)) => Ok(handle.clone()),
            _ => Err(CoreError::DependencyNotFound {
                what: format!("middlewareManager dependency '{key}'"),
            }),
        }
    }
}
