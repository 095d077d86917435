//! Run Orchestrator: the public entry point. A fixed, logged sequence of
//! phases — register, resolve overrides, validate, compute dependencies,
//! schedule resource initialization, lock, initialize the root — each
//! phase a private step, composed by one public async entry point.

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::{Mode, RunOptions};
use crate::definition::resource::ResourceDef;
use crate::dependency::extractor::DependencyExtractor;
use crate::dependency::{ArcAny, DependencyRef};
use crate::errors::CoreError;
use crate::event_manager::EventManager;
use crate::middleware_manager::MiddlewareManager;
use crate::processor::DependencyProcessor;
use crate::scheduler::ResourceScheduler;
use crate::store::Store;
use crate::task_runner::TaskRunner;

/// Run the graph rooted at `root`, returning a handle to the now-initialized
/// system.
///
/// # Errors
/// Propagates any registration, validation, dependency, or initialization
/// failure encountered along the way.
pub async fn run(root: Arc<ResourceDef>, options: RunOptions) -> Result<RunResult, CoreError> {
    let root_id = root.id().to_string();
    info!(root = %root_id, mode = ?options.mode, "runner-core: run() starting");

    let event_manager = Arc::new(EventManager::new(options.debug.runtime_event_cycle_detection));
    let middleware_manager = Arc::new(MiddlewareManager::new());
    let store = Store::new(Arc::clone(&event_manager), Arc::clone(&middleware_manager));
    let task_runner = Arc::new(TaskRunner::new(Arc::clone(&store), Arc::clone(&middleware_manager)));
    let extractor = Arc::new(DependencyExtractor::new(Arc::clone(&store), Arc::clone(&task_runner)));
    let processor = DependencyProcessor::new(Arc::clone(&store), Arc::clone(&extractor));
    let scheduler = ResourceScheduler::new(Arc::clone(&store), Arc::clone(&extractor));

    // Phase 1: deep-register the user graph, resolve overrides, validate.
    info!("runner-core: phase 1 — register");
    store.register_deeply(Arc::clone(&root))?;
    store.process_overrides();
    store.validate()?;
    let root_def = store.get_resource(&root_id).unwrap_or(root);

    // Phase 2: compute dependencies for middlewares/tasks/hooks, attaching
    // each hook to the EventManager as its own deps resolve.
    info!("runner-core: phase 2 — compute dependencies");
    processor.process_all().await?;

    // Phase 3: initialize non-root resources.
    info!("runner-core: phase 3 — initialize resources");
    match options.mode {
        Mode::Parallel if options.parallel_startup_only => {
            let required = scheduler.collect_startup_required_resource_ids(&root_def.dependencies());
            scheduler
                .initialize_uninitialized_resources_parallel(Some(&required), &root_id)
                .await?;
        }
        Mode::Parallel => {
            scheduler
                .initialize_uninitialized_resources_parallel(None, &root_id)
                .await?;
        }
        Mode::Sequential | Mode::Test => {
            processor.initialize_uninitialized_resources(&root_id).await?;
        }
    }

    // Phase 4: lock the store — no further registration is permitted.
    info!("runner-core: phase 4 — lock");
    store.lock();

    // Phase 5: initialize the root.
    info!(root = %root_id, "runner-core: phase 5 — initialize root");
    extractor.ensure_resource_initialized(&root_id, &[]).await?;

    info!(root = %root_id, "runner-core: run() complete");

    Ok(RunResult {
        store,
        task_runner,
        event_manager,
        prefer_init_order_fast_path: options.debug.prefer_init_order_fast_path,
        disposed: Arc::new(AtomicBool::new(false)),
    })
}

/// The handle `run()` returns: runs tasks, emits events, reads
/// initialized resource values, and disposes the graph.
pub struct RunResult {
    store: Arc<Store>,
    task_runner: Arc<TaskRunner>,
    event_manager: Arc<EventManager>,
    prefer_init_order_fast_path: bool,
    disposed: Arc<AtomicBool>,
}

impl RunResult {
    /// Invoke a registered task by id.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if `task_id` is not
    /// registered; otherwise propagates whatever the composed middleware
    /// chain and task body return.
    pub async fn run_task(&self, task_id: &str, input: ArcAny) -> Result<ArcAny, CoreError> {
        self.task_runner.invoke(task_id, input).await
    }

    /// Emit an event from outside the graph.
    ///
    /// # Errors
    /// Returns [`CoreError::EventCycle`] if cycle detection is enabled and
    /// this call re-enters an event already on the current call stack;
    /// otherwise propagates the first listener failure.
    pub async fn emit_event<T: Any + Send + Sync>(&self, event_id: &str, data: T) -> Result<(), CoreError> {
        self.event_manager.emit(event_id, Arc::new(data) as ArcAny, "runResult").await
    }

    /// Read an initialized resource's current value.
    ///
    /// # Errors
    /// Returns [`CoreError::DependencyNotFound`] if `resource_id` has not
    /// finished (or never started) initialization.
    pub fn get_resource_value(&self, resource_id: &str) -> Result<ArcAny, CoreError> {
        self.store.resource_value(resource_id).ok_or_else(|| CoreError::DependencyNotFound {
            what: format!("initialized resource '{resource_id}'"),
        })
    }

    /// Dispose every initialized resource, in reverse `initOrder` (fast
    /// path) or, when `debug.preferInitOrderFastPath` is disabled, in a
    /// topological order with a stable tiebreak on `initOrder`. Sequential;
    /// failures are collected per-resource rather than halting the rest.
    /// Idempotent — a second call is a no-op.
    pub async fn dispose(&self) -> Vec<CoreError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        let order = if self.prefer_init_order_fast_path {
            let mut order = self.store.init_order();
            order.reverse();
            order
        } else {
            self.topo_sorted_dispose_order()
        };

        let mut errors = Vec::new();
        for id in order {
            let Some(def) = self.store.get_resource(&id) else {
                continue;
            };
            let Some(value) = self.store.resource_value(&id) else {
                continue;
            };
            let context = self.store.resource_context(&id).unwrap_or_else(|| Arc::new(()) as ArcAny);
            let deps = self.store.resource_computed_deps(&id).unwrap_or_default();
            if let Err(source) = def.run_dispose(value, deps, context).await {
                errors.push(CoreError::ResourceDispose {
                    resource_id: id,
                    source: Box::new(source),
                });
            }
        }
        errors
    }

    /// Dependents-before-dependencies order computed by a DFS post-order
    /// over each resource's declared resource dependencies, reversed — the
    /// same DFS shape used for cycle detection, minus the cycle bookkeeping
    /// (a cycle here would already have surfaced as `CircularDependenciesError`
    /// at init time). `initOrder` seeds the DFS roots, the only stable
    /// ordering the Store records.
    fn topo_sorted_dispose_order(&self) -> Vec<String> {
        let init_order = self.store.init_order();
        let mut order = Vec::with_capacity(init_order.len());
        let mut visited = HashSet::new();
        for id in &init_order {
            self.visit_dispose(id, &mut visited, &mut order);
        }
        order.reverse();
        order
    }

    fn visit_dispose(&self, id: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if !visited.insert(id.to_string()) {
            return;
        }
        if let Some(def) = self.store.get_resource(id) {
            for reference in def.dependencies().values() {
                if let DependencyRef::Resource { id: dep_id, .. } = reference {
                    if self.store.is_resource_initialized(dep_id) {
                        self.visit_dispose(dep_id, visited, order);
                    }
                }
            }
        }
        order.push(id.to_string());
    }
}
