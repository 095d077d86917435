//! Task Runner: composes, per invocation, the chain `[global task
//! interceptors] ∘ [global "everywhere" task middlewares] ∘ [task-local
//! middlewares] ∘ [task.run]`.
//!
//! The chain is recomposed on every call by reading the current
//! middleware/interceptor snapshots fresh, rather than caching a composed
//! closure — cheap since each snapshot read is a lock-free
//! `arc_swap`/`dashmap` load.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::definition::middleware::{NextFn, TaskMiddlewareDef};
use crate::dependency::{ArcAny, ComputedDeps};
use crate::errors::CoreError;
use crate::middleware_manager::{
    MiddlewareManager, TaskInterceptInput, TaskInterceptorFn, TaskNextFn,
};
use crate::store::Store;

/// Drives task invocation: looks up the task, computes its middleware
/// chain, and runs it.
pub struct TaskRunner {
    store: Arc<Store>,
    middleware_manager: Arc<MiddlewareManager>,
    local_interceptors: DashMap<String, Mutex<Vec<(String, TaskInterceptorFn)>>>,
}

impl TaskRunner {
    #[must_use]
    pub fn new(store: Arc<Store>, middleware_manager: Arc<MiddlewareManager>) -> Self {
        Self {
            store,
            middleware_manager,
            local_interceptors: DashMap::new(),
        }
    }

    pub(crate) fn add_local_interceptor(
        &self,
        task_id: &str,
        owner_id: String,
        interceptor: TaskInterceptorFn,
    ) {
        self.local_interceptors
            .entry(task_id.to_string())
            .or_insert_with(|| Mutex::new(Vec::new()))
            .lock()
            .push((owner_id, interceptor));
    }

    pub(crate) fn local_interceptor_owner_ids(&self, task_id: &str) -> Vec<String> {
        self.local_interceptors
            .get(task_id)
            .map(|entries| entries.lock().iter().map(|(owner, _)| owner.clone()).collect())
            .unwrap_or_default()
    }

    /// Invoke `task_id` with `input`.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if the task is no longer
    /// registered; otherwise propagates whatever the composed chain
    /// returns.
    pub async fn invoke(&self, task_id: &str, input: ArcAny) -> Result<ArcAny, CoreError> {
        let task_def = self.store.get_task(task_id).ok_or_else(|| CoreError::DependencyNotFound {
            what: format!("Task {task_id}"),
        })?;
        let deps = self.store.task_computed_deps(task_id).unwrap_or_default();

        let base_def = Arc::clone(&task_def);
        let base_deps = deps.clone();
        let mut chain: NextFn = Arc::new(move |input: ArcAny| {
            let def = Arc::clone(&base_def);
            let deps = base_deps.clone();
            Box::pin(async move { def.call(input, deps).await })
        });

        for mw_id in task_def.middleware_ids().iter().rev() {
            if let Some(mw_def) = self.store.get_task_middleware(mw_id) {
                let mw_deps = self.store.task_middleware_computed_deps(mw_id).unwrap_or_default();
                chain = wrap_task_middleware(mw_def, mw_deps, chain);
                chain = wrap_interceptors(task_id, self.middleware_manager.task_middleware_interceptors(mw_id), chain);
            }
        }

        for (mw_def, mw_deps) in self.store.everywhere_task_middlewares_for(task_id).into_iter().rev() {
            let mw_id = mw_def.id().to_string();
            chain = wrap_task_middleware(mw_def, mw_deps, chain);
            chain = wrap_interceptors(task_id, self.middleware_manager.task_middleware_interceptors(&mw_id), chain);
        }

        let mut interceptors = self.middleware_manager.task_interceptors();
        if let Some(locals) = self.local_interceptors.get(task_id) {
            interceptors.extend(locals.lock().iter().map(|(_, f)| Arc::clone(f)));
        }
        let chain = wrap_interceptors(task_id, interceptors, chain);

        chain(input).await
    }
}

fn wrap_task_middleware(mw: Arc<TaskMiddlewareDef>, deps: ComputedDeps, inner: NextFn) -> NextFn {
    Arc::new(move |input: ArcAny| {
        let mw = Arc::clone(&mw);
        let deps = deps.clone();
        let inner = Arc::clone(&inner);
        Box::pin(async move { mw.invoke(inner, input, deps).await })
    })
}

fn wrap_interceptors(task_id: &str, interceptors: Vec<TaskInterceptorFn>, inner: NextFn) -> NextFn {
    let task_id = task_id.to_string();
    interceptors.into_iter().rev().fold(inner, |next, interceptor| {
        let task_id = task_id.clone();
        Arc::new(move |input: ArcAny| {
            let next = Arc::clone(&next);
            let interceptor = Arc::clone(&interceptor);
            let task_id = task_id.clone();
            let next_fn: TaskNextFn = Arc::new(move |intercepted: TaskInterceptInput| {
                let next = Arc::clone(&next);
                Box::pin(async move { next(intercepted.input).await })
            });
            Box::pin(async move { interceptor(next_fn, TaskInterceptInput { task_id, input }).await })
        }) as NextFn
    })
}

/// The injectable form of a task dependency: a callable handle bound to the
/// task's id, plus `.intercept()` / `.get_intercepting_resource_ids()`.
#[derive(Clone)]
pub struct TaskHandle {
    task_id: String,
    owner_id: String,
    runner: Arc<TaskRunner>,
}

impl TaskHandle {
    #[must_use]
    pub fn new(task_id: impl Into<String>, owner_id: impl Into<String>, runner: Arc<TaskRunner>) -> Self {
        Self {
            task_id: task_id.into(),
            owner_id: owner_id.into(),
            runner,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.task_id
    }

    /// Call this task with an already-erased input value.
    ///
    /// # Errors
    /// See [`TaskRunner::invoke`].
    pub async fn call(&self, input: ArcAny) -> Result<ArcAny, CoreError> {
        self.runner.invoke(&self.task_id, input).await
    }

    /// Register an interceptor scoped to this task, attributed to the
    /// resource/task that extracted this handle.
    pub fn intercept(&self, interceptor: TaskInterceptorFn) {
        self.runner
            .add_local_interceptor(&self.task_id, self.owner_id.clone(), interceptor);
    }

    #[must_use]
    pub fn get_intercepting_resource_ids(&self) -> Vec<String> {
        self.runner.local_interceptor_owner_ids(&self.task_id)
    }
}
