//! The definition model: the immutable, type-erased records the Store
//! registers and the Dependency Processor walks.
//!
//! Builders in the submodules here are generic over the holder's config and
//! value types (`Resource<C, V>`, `Task<I, O>`, …) so user code keeps the
//! type checker's help; `build()` erases that into the `*Def` records this
//! module exposes, since the Store itself must hold a heterogeneous
//! collection of definitions keyed by kind rather than per-kind generic
//! storage.

pub mod error_helper;
pub mod hook;
pub mod middleware;
pub mod resource;
pub mod tag;
pub mod task;
pub mod validate;

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dependency::{ArcAny, DependencyMap};
use crate::errors::CoreError;

/// A boxed, `Send` future — the shape every erased behavior closure
/// (`init`, `run`, middleware bodies, …) returns.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A declared dependency map, either a fixed object or a function of the
/// holder's (type-erased) config.
#[derive(Clone)]
pub enum DependencyMapSource {
    Static(DependencyMap),
    OfConfig(Arc<dyn Fn(&ArcAny) -> DependencyMap + Send + Sync>),
}

impl DependencyMapSource {
    #[must_use]
    pub fn resolve(&self, config: &ArcAny) -> DependencyMap {
        match self {
            DependencyMapSource::Static(map) => map.clone(),
            DependencyMapSource::OfConfig(f) => f(config),
        }
    }
}

impl Default for DependencyMapSource {
    fn default() -> Self {
        DependencyMapSource::Static(DependencyMap::new())
    }
}

/// Any one registered definition, erased to a common enum so the Store can
/// hold all nine kinds in one walk order (`crate::kind::Kind::processing_order`).
#[derive(Clone)]
pub enum AnyDefinition {
    Resource(Arc<resource::ResourceDef>),
    Task(Arc<task::TaskDef>),
    TaskMiddleware(Arc<middleware::TaskMiddlewareDef>),
    ResourceMiddleware(Arc<middleware::ResourceMiddlewareDef>),
    Hook(Arc<hook::HookDef>),
    Event(Arc<crate::event::EventDef>),
    Tag(Arc<tag::TagDef>),
    Error(Arc<error_helper::ErrorHelperDef>),
    AsyncContext(Arc<crate::async_context::AsyncContextDef>),
}

/// Downcast an erased value back to its known concrete type. The mismatch
/// branch is unreachable in practice (each `ArcAny` here was boxed from the
/// same `T` it is later downcast to by construction) but builders still
/// return a [`CoreError`] rather than panicking, per this workspace's
/// no-`unwrap`/no-`expect` discipline.
pub(crate) fn downcast_any<T: Any + Send + Sync>(
    value: ArcAny,
    what: &str,
) -> Result<Arc<T>, CoreError> {
    value.downcast::<T>().map_err(|_| CoreError::Wrapped {
        message: format!("internal type mismatch: {what}"),
    })
}

impl AnyDefinition {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            AnyDefinition::Resource(d) => &d.id,
            AnyDefinition::Task(d) => &d.id,
            AnyDefinition::TaskMiddleware(d) => &d.id,
            AnyDefinition::ResourceMiddleware(d) => &d.id,
            AnyDefinition::Hook(d) => &d.id,
            AnyDefinition::Event(d) => d.id(),
            AnyDefinition::Tag(d) => &d.id,
            AnyDefinition::Error(d) => &d.id,
            AnyDefinition::AsyncContext(d) => d.id(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> crate::kind::Kind {
        use crate::kind::Kind;
        match self {
            AnyDefinition::Resource(_) => Kind::Resource,
            AnyDefinition::Task(_) => Kind::Task,
            AnyDefinition::TaskMiddleware(_) => Kind::TaskMiddleware,
            AnyDefinition::ResourceMiddleware(_) => Kind::ResourceMiddleware,
            AnyDefinition::Hook(_) => Kind::Hook,
            AnyDefinition::Event(_) => Kind::Event,
            AnyDefinition::Tag(_) => Kind::Tag,
            AnyDefinition::Error(_) => Kind::Error,
            AnyDefinition::AsyncContext(_) => Kind::AsyncContext,
        }
    }
}
