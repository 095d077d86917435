//! Store Registry: owns the nine registration maps, enforces cross-kind
//! id uniqueness, and drives the deep `register` walk.
//!
//! Split into an accumulating, mutable phase (before `lock()`) and a
//! read-only phase after. Definitions arrive at runtime from
//! user-constructed builders rather than a fixed, compile-time module
//! list, so every map is a `dashmap::DashMap` built up incrementally
//! rather than a `Vec` assembled once up front.

pub mod override_manager;
pub mod validator;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::definition::error_helper::ErrorHelperDef;
use crate::definition::hook::HookDef;
use crate::definition::middleware::{ResourceMiddlewareDef, TaskMiddlewareDef};
use crate::definition::resource::ResourceDef;
use crate::definition::tag::{TagDef, TagUsage};
use crate::definition::task::TaskDef;
use crate::definition::AnyDefinition;
use crate::dependency::{ArcAny, ComputedDeps};
use crate::errors::CoreError;
use crate::event::EventDef;
use crate::event_manager::EventManager;
use crate::kind::Kind;
use crate::middleware_manager::MiddlewareManager;

use override_manager::OverrideManager;
use validator::StoreValidator;

/// Reserved tag id marking a definition as part of the core's own
/// bootstrap surface rather than user code: a global middleware never
/// wraps user code except when both are system-tagged.
pub const SYSTEM_TAG: &str = "__runner_core_system__";

/// The Store Registry. One instance per `run()` call — there is no
/// global mutable state; each run creates its own Store.
pub struct Store {
    resources: DashMap<String, Arc<ResourceDef>>,
    tasks: DashMap<String, Arc<TaskDef>>,
    task_middlewares: DashMap<String, Arc<TaskMiddlewareDef>>,
    resource_middlewares: DashMap<String, Arc<ResourceMiddlewareDef>>,
    hooks: DashMap<String, Arc<HookDef>>,
    events: DashMap<String, Arc<EventDef>>,
    tags: DashMap<String, Arc<TagDef>>,
    errors: DashMap<String, Arc<ErrorHelperDef>>,
    async_contexts: DashMap<String, Arc<crate::async_context::AsyncContextDef>>,

    /// Every id seen so far, across all kinds, enforcing cross-kind id
    /// uniqueness.
    all_ids: DashMap<String, Kind>,
    /// Definition-time tag attachments, by owner id.
    tag_usages: DashMap<String, Vec<TagUsage>>,

    overrides: OverrideManager,
    override_requests_by_target: DashMap<String, Vec<String>>,

    resource_deps: DashMap<String, ComputedDeps>,
    task_deps: DashMap<String, ComputedDeps>,
    task_middleware_deps: DashMap<String, ComputedDeps>,
    resource_middleware_deps: DashMap<String, ComputedDeps>,
    hook_deps: DashMap<String, ComputedDeps>,

    resource_values: DashMap<String, ArcAny>,
    resource_contexts: DashMap<String, ArcAny>,
    resource_init_cells: DashMap<String, Arc<tokio::sync::OnceCell<ArcAny>>>,
    init_order: Mutex<Vec<String>>,

    locked: AtomicBool,

    event_manager: Arc<EventManager>,
    middleware_manager: Arc<MiddlewareManager>,
}

impl Store {
    #[must_use]
    pub fn new(event_manager: Arc<EventManager>, middleware_manager: Arc<MiddlewareManager>) -> Arc<Self> {
        Arc::new(Self {
            resources: DashMap::new(),
            tasks: DashMap::new(),
            task_middlewares: DashMap::new(),
            resource_middlewares: DashMap::new(),
            hooks: DashMap::new(),
            events: DashMap::new(),
            tags: DashMap::new(),
            errors: DashMap::new(),
            async_contexts: DashMap::new(),
            all_ids: DashMap::new(),
            tag_usages: DashMap::new(),
            overrides: OverrideManager::new(),
            override_requests_by_target: DashMap::new(),
            resource_deps: DashMap::new(),
            task_deps: DashMap::new(),
            task_middleware_deps: DashMap::new(),
            resource_middleware_deps: DashMap::new(),
            hook_deps: DashMap::new(),
            resource_values: DashMap::new(),
            resource_contexts: DashMap::new(),
            resource_init_cells: DashMap::new(),
            init_order: Mutex::new(Vec::new()),
            locked: AtomicBool::new(false),
            event_manager,
            middleware_manager,
        })
    }

    #[must_use]
    pub fn event_manager(&self) -> Arc<EventManager> {
        Arc::clone(&self.event_manager)
    }

    #[must_use]
    pub fn middleware_manager(&self) -> Arc<MiddlewareManager> {
        Arc::clone(&self.middleware_manager)
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Lock the store, forbidding further registration. Idempotent.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    fn check_unlocked(&self, what: &str) -> Result<(), CoreError> {
        if self.is_locked() {
            Err(CoreError::StoreLocked { what: what.to_string() })
        } else {
            Ok(())
        }
    }

    fn check_unique(&self, id: &str) -> Result<(), CoreError> {
        if let Some(existing) = self.all_ids.get(id) {
            return Err(CoreError::DuplicateRegistration {
                id: id.to_string(),
                existing_kind: existing.label(),
            });
        }
        Ok(())
    }

    fn claim_id(&self, id: &str, kind: Kind) {
        self.all_ids.insert(id.to_string(), kind);
    }

    fn record_tags(&self, owner_id: &str, tags: &[TagUsage]) -> Result<(), CoreError> {
        StoreValidator::check_duplicate_tags(owner_id, tags)?;
        if !tags.is_empty() {
            self.tag_usages.insert(owner_id.to_string(), tags.to_vec());
        }
        Ok(())
    }

    // ---- per-kind writers ---------------------------------------------------

    /// # Errors
    /// Returns [`CoreError::StoreLocked`] if the store is locked, or
    /// [`CoreError::DuplicateRegistration`] / tag invariant errors.
    pub fn store_resource(&self, def: Arc<ResourceDef>) -> Result<(), CoreError> {
        self.check_unlocked("resource")?;
        self.check_unique(def.id())?;
        StoreValidator::check_self_tag_dependency(def.id(), def.tags(), &def.dependencies())?;
        self.record_tags(def.id(), def.tags())?;
        for over in &def.overrides {
            self.overrides.record(over.id().to_string(), def.id().to_string());
            self.override_requests_by_target
                .entry(over.id().to_string())
                .or_default()
                .push(def.id().to_string());
        }
        self.claim_id(def.id(), Kind::Resource);
        self.resources.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_task(&self, def: Arc<TaskDef>) -> Result<(), CoreError> {
        self.check_unlocked("task")?;
        self.check_unique(def.id())?;
        StoreValidator::check_self_tag_dependency(def.id(), def.tags(), &def.dependencies())?;
        self.record_tags(def.id(), def.tags())?;
        self.claim_id(def.id(), Kind::Task);
        self.tasks.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_task_middleware(&self, def: Arc<TaskMiddlewareDef>) -> Result<(), CoreError> {
        self.check_unlocked("taskMiddleware")?;
        self.check_unique(def.id())?;
        self.record_tags(def.id(), def.tags())?;
        self.claim_id(def.id(), Kind::TaskMiddleware);
        self.task_middlewares.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_resource_middleware(&self, def: Arc<ResourceMiddlewareDef>) -> Result<(), CoreError> {
        self.check_unlocked("resourceMiddleware")?;
        self.check_unique(def.id())?;
        self.record_tags(def.id(), def.tags())?;
        self.claim_id(def.id(), Kind::ResourceMiddleware);
        self.resource_middlewares.insert(def.id().to_string(), def);
        Ok(())
    }

    /// Stores a hook. `mode_override = true` bypasses the duplicate check.
    ///
    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_hook(&self, def: Arc<HookDef>, mode_override: bool) -> Result<(), CoreError> {
        self.check_unlocked("hook")?;
        if !mode_override {
            self.check_unique(def.id())?;
        }
        let targets: &[String] = match def.on() {
            crate::definition::hook::HookTarget::Event(id) => std::slice::from_ref(id),
            crate::definition::hook::HookTarget::Events(ids) => ids.as_slice(),
            crate::definition::hook::HookTarget::Wildcard => &[],
        };
        for event_id in targets {
            if !self.events.contains_key(event_id) {
                return Err(CoreError::EventNotFound {
                    hook_id: def.id().to_string(),
                    event_id: event_id.clone(),
                });
            }
        }
        self.claim_id(def.id(), Kind::Hook);
        self.hooks.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_event(&self, def: Arc<EventDef>) -> Result<(), CoreError> {
        self.check_unlocked("event")?;
        self.check_unique(def.id())?;
        self.claim_id(def.id(), Kind::Event);
        self.event_manager
            .register_event(def.id().to_string(), def.tags().to_vec(), def.excludes_global_hooks());
        self.events.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_tag(&self, def: Arc<TagDef>) -> Result<(), CoreError> {
        self.check_unlocked("tag")?;
        self.check_unique(def.id())?;
        self.claim_id(def.id(), Kind::Tag);
        self.tags.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_error(&self, def: Arc<ErrorHelperDef>) -> Result<(), CoreError> {
        self.check_unlocked("error")?;
        self.check_unique(def.id())?;
        self.claim_id(def.id(), Kind::Error);
        self.errors.insert(def.id().to_string(), def);
        Ok(())
    }

    /// # Errors
    /// See [`Store::store_resource`].
    pub fn store_async_context(&self, def: Arc<crate::async_context::AsyncContextDef>) -> Result<(), CoreError> {
        self.check_unlocked("asyncContext")?;
        self.check_unique(def.id())?;
        self.claim_id(def.id(), Kind::AsyncContext);
        self.async_contexts.insert(def.id().to_string(), def);
        Ok(())
    }

    /// Dispatches a type-erased definition to the right per-kind writer.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownItemType`] only in principle — every
    /// variant of [`AnyDefinition`] matches a known kind, so this is
    /// effectively infallible, but the signature stays fallible to mirror
    /// the dynamic-dispatch contract callers build against.
    pub fn store_generic_item(&self, item: AnyDefinition) -> Result<(), CoreError> {
        match item {
            AnyDefinition::Resource(def) => self.store_resource(def),
            AnyDefinition::Task(def) => self.store_task(def),
            AnyDefinition::TaskMiddleware(def) => self.store_task_middleware(def),
            AnyDefinition::ResourceMiddleware(def) => self.store_resource_middleware(def),
            AnyDefinition::Hook(def) => self.store_hook(def, false),
            AnyDefinition::Event(def) => self.store_event(def),
            AnyDefinition::Tag(def) => self.store_tag(def),
            AnyDefinition::Error(def) => self.store_error(def),
            AnyDefinition::AsyncContext(def) => self.store_async_context(def),
        }
    }

    /// Deep registration walk: recursively materializes each resource's
    /// `register` children, registering children before their parent so a
    /// child resource that a parent also depends on is already present
    /// when dependency extraction walks the parent.
    ///
    /// # Errors
    /// Propagates the first registration failure.
    pub fn register_deeply(self: &Arc<Self>, root: Arc<ResourceDef>) -> Result<(), CoreError> {
        let children = root.children();
        for child in children {
            self.register_deeply_any(child)?;
        }
        self.store_resource(root)
    }

    fn register_deeply_any(self: &Arc<Self>, item: AnyDefinition) -> Result<(), CoreError> {
        if let AnyDefinition::Resource(def) = item {
            self.register_deeply(def)
        } else {
            self.store_generic_item(item)
        }
    }

    /// Apply every recorded override request.
    pub fn process_overrides(&self) {
        self.overrides.process(&self.resources);
    }

    /// Run the one-time cross-cutting sanity checks: tag/self-tag checks
    /// already ran at registration time; this pass
    /// re-validates after overrides have rewritten the registry, since an
    /// override can introduce a fresh self-tag cycle the original
    /// registration order didn't expose.
    ///
    /// # Errors
    /// Propagates the first violation found.
    pub fn validate(&self) -> Result<(), CoreError> {
        for entry in &self.resources {
            let def = entry.value();
            StoreValidator::check_duplicate_tags(def.id(), def.tags())?;
            StoreValidator::check_self_tag_dependency(def.id(), def.tags(), &def.dependencies())?;
        }
        Ok(())
    }

    // ---- queries -----------------------------------------------------------

    #[must_use]
    pub fn get_resource(&self, id: &str) -> Option<Arc<ResourceDef>> {
        self.resources.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_task(&self, id: &str) -> Option<Arc<TaskDef>> {
        self.tasks.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_task_middleware(&self, id: &str) -> Option<Arc<TaskMiddlewareDef>> {
        self.task_middlewares.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_resource_middleware(&self, id: &str) -> Option<Arc<ResourceMiddlewareDef>> {
        self.resource_middlewares.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_hook(&self, id: &str) -> Option<Arc<HookDef>> {
        self.hooks.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_event(&self, id: &str) -> Option<Arc<EventDef>> {
        self.events.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_tag(&self, id: &str) -> Option<Arc<TagDef>> {
        self.tags.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_error(&self, id: &str) -> Option<Arc<ErrorHelperDef>> {
        self.errors.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn get_async_context(&self, id: &str) -> Option<Arc<crate::async_context::AsyncContextDef>> {
        self.async_contexts.get(id).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn resource_ids(&self) -> Vec<String> {
        self.resources.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn hook_ids(&self) -> Vec<String> {
        self.hooks.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn task_middleware_ids(&self) -> Vec<String> {
        self.task_middlewares.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn resource_middleware_ids(&self) -> Vec<String> {
        self.resource_middlewares.iter().map(|e| e.key().clone()).collect()
    }

    /// Whether `id` (of any kind) carries `tag_id`.
    #[must_use]
    pub fn has_tag(&self, id: &str, tag_id: &str) -> bool {
        self.tag_usages
            .get(id)
            .is_some_and(|usages| usages.iter().any(|u| u.tag_id() == tag_id))
    }

    /// The config value `id` attached alongside `tag_id`, if any.
    #[must_use]
    pub fn tag_config(&self, id: &str, tag_id: &str) -> Option<ArcAny> {
        self.tag_usages.get(id).and_then(|usages| {
            usages
                .iter()
                .find(|u| u.tag_id() == tag_id)
                .and_then(|u| u.config.clone())
        })
    }

    /// Every id (of any kind) carrying `tag_id`.
    #[must_use]
    pub fn ids_with_tag(&self, tag_id: &str) -> Vec<String> {
        self.tag_usages
            .iter()
            .filter(|e| e.value().iter().any(|u| u.tag_id() == tag_id))
            .map(|e| e.key().clone())
            .collect()
    }

    #[must_use]
    pub fn resources_with_tag(&self, tag_id: &str) -> Vec<String> {
        self.ids_with_tag(tag_id)
            .into_iter()
            .filter(|id| self.resources.contains_key(id))
            .collect()
    }

    #[must_use]
    pub fn tasks_with_tag(&self, tag_id: &str) -> Vec<String> {
        self.ids_with_tag(tag_id)
            .into_iter()
            .filter(|id| self.tasks.contains_key(id))
            .collect()
    }

    /// Global middlewares whose `everywhere` predicate covers `target_id`:
    /// a system-tagged middleware never wraps user code — it only applies
    /// when `target_id` is itself system-tagged. A non-system middleware
    /// applies regardless of the target's system status.
    #[must_use]
    pub fn everywhere_task_middlewares_for(&self, target_id: &str) -> Vec<(Arc<TaskMiddlewareDef>, ComputedDeps)> {
        let target_is_system = self.has_tag(target_id, SYSTEM_TAG);
        self.task_middlewares
            .iter()
            .filter(|e| e.value().everywhere().matches(target_id))
            .filter(|e| target_is_system || !e.value().tags().iter().any(|u| u.tag_id() == SYSTEM_TAG))
            .map(|e| {
                let deps = self.task_middleware_deps.get(e.key()).map(|d| d.clone()).unwrap_or_default();
                (Arc::clone(e.value()), deps)
            })
            .collect()
    }

    #[must_use]
    pub fn everywhere_resource_middlewares_for(
        &self,
        target_id: &str,
    ) -> Vec<(Arc<ResourceMiddlewareDef>, ComputedDeps)> {
        let target_is_system = self.has_tag(target_id, SYSTEM_TAG);
        self.resource_middlewares
            .iter()
            .filter(|e| e.value().everywhere().matches(target_id))
            .filter(|e| target_is_system || !e.value().tags().iter().any(|u| u.tag_id() == SYSTEM_TAG))
            .map(|e| {
                let deps = self.resource_middleware_deps.get(e.key()).map(|d| d.clone()).unwrap_or_default();
                (Arc::clone(e.value()), deps)
            })
            .collect()
    }

    /// Attach an interceptor to one specific task-middleware definition.
    /// Unknown middleware ids are silently ignored rather than erroring —
    /// a defensive no-op for a reference that never resolves to a real
    /// chain anyway.
    pub fn intercept_task_middleware(
        &self,
        middleware_id: &str,
        interceptor: crate::middleware_manager::TaskInterceptorFn,
    ) {
        if self.task_middlewares.contains_key(middleware_id) {
            self.middleware_manager.intercept_task_middleware(middleware_id, interceptor);
        }
    }

    /// Attach an interceptor to one specific resource-middleware definition;
    /// see [`Store::intercept_task_middleware`].
    pub fn intercept_resource_middleware(
        &self,
        middleware_id: &str,
        interceptor: crate::middleware_manager::ResourceInterceptorFn,
    ) {
        if self.resource_middlewares.contains_key(middleware_id) {
            self.middleware_manager
                .intercept_resource_middleware(middleware_id, interceptor);
        }
    }

    // ---- computed dependencies ---------------------------------------------

    pub fn set_resource_deps(&self, id: &str, deps: ComputedDeps) {
        self.resource_deps.insert(id.to_string(), deps);
    }

    #[must_use]
    pub fn resource_computed_deps(&self, id: &str) -> Option<ComputedDeps> {
        self.resource_deps.get(id).map(|d| d.clone())
    }

    pub fn set_task_deps(&self, id: &str, deps: ComputedDeps) {
        self.task_deps.insert(id.to_string(), deps);
    }

    #[must_use]
    pub fn task_computed_deps(&self, id: &str) -> Option<ComputedDeps> {
        self.task_deps.get(id).map(|d| d.clone())
    }

    pub fn set_task_middleware_deps(&self, id: &str, deps: ComputedDeps) {
        self.task_middleware_deps.insert(id.to_string(), deps);
    }

    #[must_use]
    pub fn task_middleware_computed_deps(&self, id: &str) -> Option<ComputedDeps> {
        self.task_middleware_deps.get(id).map(|d| d.clone())
    }

    pub fn set_resource_middleware_deps(&self, id: &str, deps: ComputedDeps) {
        self.resource_middleware_deps.insert(id.to_string(), deps);
    }

    #[must_use]
    pub fn resource_middleware_computed_deps(&self, id: &str) -> Option<ComputedDeps> {
        self.resource_middleware_deps.get(id).map(|d| d.clone())
    }

    pub fn set_hook_deps(&self, id: &str, deps: ComputedDeps) {
        self.hook_deps.insert(id.to_string(), deps);
    }

    #[must_use]
    pub fn hook_computed_deps(&self, id: &str) -> Option<ComputedDeps> {
        self.hook_deps.get(id).map(|d| d.clone())
    }

    // ---- resource lifecycle -------------------------------------------------

    #[must_use]
    pub fn is_resource_initialized(&self, id: &str) -> bool {
        self.resource_values.contains_key(id)
    }

    #[must_use]
    pub fn resource_value(&self, id: &str) -> Option<ArcAny> {
        self.resource_values.get(id).map(|v| Arc::clone(&v))
    }

    #[must_use]
    pub fn resource_context(&self, id: &str) -> Option<ArcAny> {
        self.resource_contexts.get(id).map(|v| Arc::clone(&v))
    }

    /// The single-flight cell for `id`'s `init`, created on first access:
    /// concurrent extractions share a single in-flight initialization.
    #[must_use]
    pub fn resource_init_cell(&self, id: &str) -> Arc<tokio::sync::OnceCell<ArcAny>> {
        Arc::clone(
            self.resource_init_cells
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::OnceCell::new()))
                .value(),
        )
    }

    /// Record that `id` finished `init` with `value`/`context`, appending it
    /// to `initOrder`.
    pub fn record_initialized(&self, id: &str, value: ArcAny, context: ArcAny) {
        self.resource_values.insert(id.to_string(), value);
        self.resource_contexts.insert(id.to_string(), context);
        self.init_order.lock().push(id.to_string());
    }

    #[must_use]
    pub fn init_order(&self) -> Vec<String> {
        self.init_order.lock().clone()
    }

    /// Ids that were claimed (via `overrides`/`register`/direct calls) but
    /// never reached [`Store::store_resource`] at all — used for debugging
    /// dangling override targets; not exercised on the happy path.
    #[must_use]
    pub fn known_ids(&self) -> HashSet<String> {
        self.all_ids.iter().map(|e| e.key().clone()).collect()
    }
}
