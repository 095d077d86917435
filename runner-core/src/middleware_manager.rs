//! Middleware Manager: holds the two ordered lists of *global*
//! interceptors (task-kind and resource-kind), each append-only and
//! owner-tracked.
//!
//! Lists are stored behind `arc_swap::ArcSwap` for lock-free snapshot
//! reads instead of `Mutex<Vec<_>>` in hot paths: every call into
//! `TaskRunner`/resource init loads the current snapshot once rather
//! than holding a lock across `.await`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::dependency::ArcAny;
use crate::errors::CoreError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a global task interceptor receives: the task id and its current
/// input.
#[derive(Clone)]
pub struct TaskInterceptInput {
    pub task_id: String,
    pub input: ArcAny,
}

/// What a global resource interceptor receives: the resource id and its
/// current config.
#[derive(Clone)]
pub struct ResourceInterceptInput {
    pub resource_id: String,
    pub config: ArcAny,
}

pub type TaskNextFn = Arc<dyn Fn(TaskInterceptInput) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync>;
pub type TaskInterceptorFn =
    Arc<dyn Fn(TaskNextFn, TaskInterceptInput) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync>;

pub type ResourceNextFn =
    Arc<dyn Fn(ResourceInterceptInput) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync>;
pub type ResourceInterceptorFn = Arc<
    dyn Fn(ResourceNextFn, ResourceInterceptInput) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync,
>;

struct OwnedEntry<F> {
    owner_id: String,
    interceptor: F,
}

/// Holds the two global interceptor lists and owner bookkeeping.
/// Owner-aware registration records the registering resource id alongside
/// each interceptor.
pub struct MiddlewareManager {
    task_interceptors: ArcSwap<Vec<Arc<OwnedEntry<TaskInterceptorFn>>>>,
    resource_interceptors: ArcSwap<Vec<Arc<OwnedEntry<ResourceInterceptorFn>>>>,
    task_middleware_interceptors: DashMap<String, Mutex<Vec<TaskInterceptorFn>>>,
    resource_middleware_interceptors: DashMap<String, Mutex<Vec<ResourceInterceptorFn>>>,
}

impl Default for MiddlewareManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            task_interceptors: ArcSwap::from_pointee(Vec::new()),
            resource_interceptors: ArcSwap::from_pointee(Vec::new()),
            task_middleware_interceptors: DashMap::new(),
            resource_middleware_interceptors: DashMap::new(),
        }
    }

    /// Attach an interceptor onto one specific task-middleware definition.
    /// Callers are expected to have already checked the middleware id is registered —
    /// see [`crate::store::Store::intercept_task_middleware`], which applies
    /// the "unknown identities are silently ignored" rule at the call site.
    pub(crate) fn intercept_task_middleware(&self, middleware_id: &str, interceptor: TaskInterceptorFn) {
        self.task_middleware_interceptors
            .entry(middleware_id.to_string())
            .or_insert_with(|| Mutex::new(Vec::new()))
            .lock()
            .push(interceptor);
    }

    /// Attach an interceptor onto one specific resource-middleware
    /// definition; see [`MiddlewareManager::intercept_task_middleware`].
    pub(crate) fn intercept_resource_middleware(&self, middleware_id: &str, interceptor: ResourceInterceptorFn) {
        self.resource_middleware_interceptors
            .entry(middleware_id.to_string())
            .or_insert_with(|| Mutex::new(Vec::new()))
            .lock()
            .push(interceptor);
    }

    /// Interceptors attached directly to task-middleware `middleware_id`,
    /// in registration order.
    #[must_use]
    pub fn task_middleware_interceptors(&self, middleware_id: &str) -> Vec<TaskInterceptorFn> {
        self.task_middleware_interceptors
            .get(middleware_id)
            .map(|entries| entries.lock().clone())
            .unwrap_or_default()
    }

    /// Interceptors attached directly to resource-middleware `middleware_id`,
    /// in registration order.
    #[must_use]
    pub fn resource_middleware_interceptors(&self, middleware_id: &str) -> Vec<ResourceInterceptorFn> {
        self.resource_middleware_interceptors
            .get(middleware_id)
            .map(|entries| entries.lock().clone())
            .unwrap_or_default()
    }

    pub fn intercept_task(&self, owner_id: impl Into<String>, interceptor: TaskInterceptorFn) {
        let mut next = (**self.task_interceptors.load()).clone();
        next.push(Arc::new(OwnedEntry {
            owner_id: owner_id.into(),
            interceptor,
        }));
        self.task_interceptors.store(Arc::new(next));
    }

    pub fn intercept_resource(&self, owner_id: impl Into<String>, interceptor: ResourceInterceptorFn) {
        let mut next = (**self.resource_interceptors.load()).clone();
        next.push(Arc::new(OwnedEntry {
            owner_id: owner_id.into(),
            interceptor,
        }));
        self.resource_interceptors.store(Arc::new(next));
    }

    #[must_use]
    pub fn task_interceptors(&self) -> Vec<TaskInterceptorFn> {
        self.task_interceptors
            .load()
            .iter()
            .map(|e| Arc::clone(&e.interceptor))
            .collect()
    }

    #[must_use]
    pub fn resource_interceptors(&self) -> Vec<ResourceInterceptorFn> {
        self.resource_interceptors
            .load()
            .iter()
            .map(|e| Arc::clone(&e.interceptor))
            .collect()
    }

    /// Resource ids that have registered a global task interceptor, in
    /// registration order.
    #[must_use]
    pub fn task_interceptor_owner_ids(&self) -> Vec<String> {
        self.task_interceptors.load().iter().map(|e| e.owner_id.clone()).collect()
    }

    #[must_use]
    pub fn resource_interceptor_owner_ids(&self) -> Vec<String> {
        self.resource_interceptors
            .load()
            .iter()
            .map(|e| e.owner_id.clone())
            .collect()
    }
}

/// Owner-aware facade injected when a holder depends on the middleware
/// manager: interceptor registrations made through it are tagged with
/// `owner_id`.
#[derive(Clone)]
pub struct OwnedMiddlewareHandle {
    pub(crate) owner_id: String,
    pub(crate) manager: Arc<MiddlewareManager>,
}

impl OwnedMiddlewareHandle {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, manager: Arc<MiddlewareManager>) -> Self {
        Self {
            owner_id: owner_id.into(),
            manager,
        }
    }

    pub fn intercept_task(&self, interceptor: TaskInterceptorFn) {
        self.manager.intercept_task(self.owner_id.clone(), interceptor);
    }

    pub fn intercept_resource(&self, interceptor: ResourceInterceptorFn) {
        self.manager.intercept_resource(self.owner_id.clone(), interceptor);
    }

    /// Attach an interceptor directly onto task-middleware `middleware_id`.
    /// This facade has no Store handle to validate `middleware_id` against,
    /// so callers reaching this through
    /// [`crate::store::Store::intercept_task_middleware`] get the "unknown
    /// ids are silently ignored" behavior; called directly here, an
    /// unknown id is stored but never consumed since nothing will ever
    /// compose a chain for it.
    pub fn intercept_task_middleware(&self, middleware_id: &str, interceptor: TaskInterceptorFn) {
        self.manager.intercept_task_middleware(middleware_id, interceptor);
    }

    /// Attach an interceptor directly onto resource-middleware
    /// `middleware_id`; see [`OwnedMiddlewareHandle::intercept_task_middleware`].
    pub fn intercept_resource_middleware(&self, middleware_id: &str, interceptor: ResourceInterceptorFn) {
        self.manager.intercept_resource_middleware(middleware_id, interceptor);
    }
}
