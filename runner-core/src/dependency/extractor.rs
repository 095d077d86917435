//! Dependency Extractor: turns a declared dependency map into injectable
//! runtime values, initializing resources on demand with single-flight
//! coalescing and DFS cycle detection.
//!
//! Cycle detection threads the chain of resource ids currently being
//! resolved through the recursive calls as a plain `Vec<String>` (DFS path,
//! the gray/white/black idea adapted from a one-shot whole-graph pass to an
//! on-demand walk): a resource's own dependencies are only discovered by
//! actually extracting them, so the path is built lazily as resolution
//! descends rather than from a pre-built adjacency list.

use std::collections::HashMap;
use std::sync::Arc;

use crate::async_context::AsyncContextHandle;
use crate::definition::error_helper::ErrorHelper;
use crate::definition::resource::ResourceDef;
use crate::definition::tag::TagAccessor;
use crate::dependency::{ArcAny, ComputedDeps, DependencyMap, DependencyRef, DependencyValue};
use crate::errors::CoreError;
use crate::event::EventEmitter;
use crate::initializer::ResourceInitializer;
use crate::middleware_manager::OwnedMiddlewareHandle;
use crate::store::Store;
use crate::task_runner::{TaskHandle, TaskRunner};

/// Drives dependency-map → [`ComputedDeps`] resolution for any holder
/// (resource, task, hook, or middleware).
pub struct DependencyExtractor {
    store: Arc<Store>,
    task_runner: Arc<TaskRunner>,
}

impl DependencyExtractor {
    #[must_use]
    pub fn new(store: Arc<Store>, task_runner: Arc<TaskRunner>) -> Self {
        Self { store, task_runner }
    }

    /// Resolve `map` for `owner_id`, with no resources currently on the
    /// resolution stack (the entry point for top-level callers: the
    /// Dependency Processor, the Resource Scheduler).
    ///
    /// # Errors
    /// Propagates [`CoreError::DependencyNotFound`], [`CoreError::CircularDependencies`],
    /// or any resource `init` failure encountered while resolving.
    pub async fn extract(&self, owner_id: &str, map: &DependencyMap) -> Result<ComputedDeps, CoreError> {
        self.extract_with_path(owner_id, map, &[]).await
    }

    async fn extract_with_path(
        &self,
        owner_id: &str,
        map: &DependencyMap,
        path: &[String],
    ) -> Result<ComputedDeps, CoreError> {
        let mut values = HashMap::with_capacity(map.len());
        for (key, reference) in map {
            let value = self.resolve(owner_id, reference, path).await?;
            values.insert(key.clone(), value);
        }
        Ok(ComputedDeps::new(values))
    }

    async fn resolve(
        &self,
        owner_id: &str,
        reference: &DependencyRef,
        path: &[String],
    ) -> Result<DependencyValue, CoreError> {
        match reference {
            DependencyRef::Resource { id, optional, .. } => {
                if self.store.get_resource(id).is_none() {
                    return optional_or_missing(*optional, "Resource", id);
                }
                let value = self.ensure_resource_initialized(id, path).await?;
                Ok(DependencyValue::Resource(value))
            }
            DependencyRef::Task { id, optional } => {
                if self.store.get_task(id).is_none() {
                    return optional_or_missing(*optional, "Task", id);
                }
                Ok(DependencyValue::Task(TaskHandle::new(
                    id.clone(),
                    owner_id.to_string(),
                    Arc::clone(&self.task_runner),
                )))
            }
            DependencyRef::Event { id, optional } => {
                if self.store.get_event(id).is_none() {
                    return optional_or_missing(*optional, "Event", id);
                }
                Ok(DependencyValue::Event(EventEmitter {
                    event_id: id.clone(),
                    source: owner_id.to_string(),
                    manager: self.store.event_manager(),
                }))
            }
            DependencyRef::Tag { id, optional, .. } => {
                if self.store.get_tag(id).is_none() {
                    return optional_or_missing(*optional, "Tag", id);
                }
                Ok(DependencyValue::Tag(TagAccessor {
                    tag_id: id.clone(),
                    store: Arc::clone(&self.store),
                }))
            }
            DependencyRef::Error { id, optional } => match self.store.get_error(id) {
                Some(def) => Ok(DependencyValue::Error(Arc::new(ErrorHelper::from_def(def)))),
                None => optional_or_missing(*optional, "Error", id),
            },
            DependencyRef::AsyncContext { id, optional } => {
                if self.store.get_async_context(id).is_none() {
                    return optional_or_missing(*optional, "AsyncContext", id);
                }
                Ok(DependencyValue::AsyncContext(AsyncContextHandle { id: id.clone() }))
            }
            DependencyRef::MiddlewareManager => Ok(DependencyValue::MiddlewareManager(OwnedMiddlewareHandle::new(
                owner_id.to_string(),
                self.store.middleware_manager(),
            ))),
        }
    }

    /// Ensure resource `id` has finished `init`, recursing into its own
    /// dependency map as needed; single-flight via [`Store::resource_init_cell`].
    ///
    /// # Errors
    /// Returns [`CoreError::CircularDependencies`] if `id` is already on
    /// `path`; [`CoreError::DependencyNotFound`] if unregistered; otherwise
    /// propagates `init` failure wrapped in [`CoreError::ResourceInit`].
    pub async fn ensure_resource_initialized(&self, id: &str, path: &[String]) -> Result<ArcAny, CoreError> {
        if let Some(pos) = path.iter().position(|p| p == id) {
            let mut cycle: Vec<String> = path[pos..].to_vec();
            cycle.push(id.to_string());
            return Err(CoreError::CircularDependencies { path: cycle });
        }
        if let Some(value) = self.store.resource_value(id) {
            return Ok(value);
        }
        let Some(def) = self.store.get_resource(id) else {
            return Err(CoreError::DependencyNotFound {
                what: format!("Resource {id}"),
            });
        };

        let mut next_path = path.to_vec();
        next_path.push(id.to_string());

        let cell = self.store.resource_init_cell(id);
        cell.get_or_try_init(|| self.init_resource(def, next_path))
            .await
            .map(Arc::clone)
    }

    async fn init_resource(&self, def: Arc<ResourceDef>, path: Vec<String>) -> Result<ArcAny, CoreError> {
        let map = def.dependencies();
        let deps = self
            .extract_with_path(def.id(), &map, &path)
            .await
            .map_err(|e| match e {
                CoreError::CircularDependencies { path } => CoreError::CircularDependencies { path },
                other => CoreError::ResourceInit {
                    resource_id: def.id().to_string(),
                    source: Box::new(other),
                },
            })?;

        let (value, context) =
            ResourceInitializer::initialize(&def, deps.clone(), &self.store, &self.store.middleware_manager())
                .await
                .map_err(|e| CoreError::ResourceInit {
                    resource_id: def.id().to_string(),
                    source: Box::new(e),
                })?;

        self.store.set_resource_deps(def.id(), deps);
        self.store.record_initialized(def.id(), Arc::clone(&value), context);
        Ok(value)
    }
}

fn optional_or_missing(optional: bool, what: &str, id: &str) -> Result<DependencyValue, CoreError> {
    if optional {
        Ok(DependencyValue::Missing)
    } else {
        Err(CoreError::DependencyNotFound {
            what: format!("{what} {id}"),
        })
    }
}
