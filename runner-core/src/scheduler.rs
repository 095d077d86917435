//! Resource Scheduler: parallel-mode startup-set discovery and wave-based
//! parallel initialization.
//!
//! Wave computation and the startup-required fixed point follow the shape
//! of a Kahn's-algorithm topological sort: compute readiness, drain
//! everything with no unmet dependency, repeat. There is no single static
//! graph to sort up front (a resource's dependencies are only known once
//! its definition is registered, not before), so readiness is recomputed
//! each wave instead of once.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::dependency::extractor::DependencyExtractor;
use crate::dependency::{DependencyMap, DependencyRef};
use crate::errors::CoreError;
use crate::store::Store;

pub struct ResourceScheduler {
    store: Arc<Store>,
    extractor: Arc<DependencyExtractor>,
}

impl ResourceScheduler {
    #[must_use]
    pub fn new(store: Arc<Store>, extractor: Arc<DependencyExtractor>) -> Self {
        Self { store, extractor }
    }

    /// Fixed-point traversal from every middleware, hook, and task's
    /// dependency map, plus `root_deps`.
    #[must_use]
    pub fn collect_startup_required_resource_ids(&self, root_deps: &DependencyMap) -> HashSet<String> {
        let mut required = HashSet::new();
        let mut visited_holders = HashSet::new();

        for id in self.store.task_middleware_ids() {
            if let Some(def) = self.store.get_task_middleware(&id) {
                self.walk_map(&def.dependencies(), &mut required, &mut visited_holders);
            }
        }
        for id in self.store.resource_middleware_ids() {
            if let Some(def) = self.store.get_resource_middleware(&id) {
                self.walk_map(&def.dependencies(), &mut required, &mut visited_holders);
            }
        }
        for id in self.store.hook_ids() {
            if let Some(def) = self.store.get_hook(&id) {
                self.walk_map(&def.dependencies(), &mut required, &mut visited_holders);
            }
        }
        for id in self.store.task_ids() {
            if let Some(def) = self.store.get_task(&id) {
                self.walk_map(&def.dependencies(), &mut required, &mut visited_holders);
            }
        }
        self.walk_map(root_deps, &mut required, &mut visited_holders);

        required
    }

    fn walk_map(&self, map: &DependencyMap, required: &mut HashSet<String>, visited_holders: &mut HashSet<String>) {
        for reference in map.values() {
            self.walk_ref(reference, required, visited_holders);
        }
    }

    fn walk_ref(&self, reference: &DependencyRef, required: &mut HashSet<String>, visited_holders: &mut HashSet<String>) {
        match reference {
            DependencyRef::Resource { id, .. } => self.walk_resource(id, required, visited_holders),
            DependencyRef::Tag { id: tag_id, .. } => {
                if self.store.get_tag(tag_id).is_none() {
                    return;
                }
                for resource_id in self.store.resources_with_tag(tag_id) {
                    self.walk_resource(&resource_id, required, visited_holders);
                }
                for holder_id in self.store.ids_with_tag(tag_id) {
                    if !visited_holders.insert(holder_id.clone()) {
                        continue;
                    }
                    let holder_deps = self
                        .store
                        .get_task(&holder_id)
                        .map(|d| d.dependencies())
                        .or_else(|| self.store.get_hook(&holder_id).map(|d| d.dependencies()))
                        .or_else(|| self.store.get_task_middleware(&holder_id).map(|d| d.dependencies()))
                        .or_else(|| self.store.get_resource_middleware(&holder_id).map(|d| d.dependencies()));
                    if let Some(holder_deps) = holder_deps {
                        self.walk_map(&holder_deps, required, visited_holders);
                    }
                }
            }
            DependencyRef::Task { .. }
            | DependencyRef::Event { .. }
            | DependencyRef::Error { .. }
            | DependencyRef::AsyncContext { .. }
            | DependencyRef::MiddlewareManager => {}
        }
    }

    fn walk_resource(&self, id: &str, required: &mut HashSet<String>, visited_holders: &mut HashSet<String>) {
        let Some(def) = self.store.get_resource(id) else {
            return;
        };
        if !required.insert(id.to_string()) {
            return;
        }
        self.walk_map(&def.dependencies(), required, visited_holders);
    }

    /// Whether every dependency of resource `id` is satisfied: resource
    /// deps are ready when their target is initialized (or missing and
    /// optional); tag deps are ready when every resource carrying that tag
    /// is initialized.
    fn is_ready(&self, id: &str) -> bool {
        let Some(def) = self.store.get_resource(id) else {
            return false;
        };
        def.dependencies().values().all(|reference| self.ref_ready(reference))
    }

    fn ref_ready(&self, reference: &DependencyRef) -> bool {
        match reference {
            DependencyRef::Resource { id, optional, .. } => match self.store.get_resource(id) {
                Some(_) => self.store.is_resource_initialized(id),
                None => *optional,
            },
            DependencyRef::Tag { id: tag_id, optional, .. } => {
                if self.store.get_tag(tag_id).is_none() {
                    return *optional;
                }
                self.store
                    .resources_with_tag(tag_id)
                    .iter()
                    .all(|resource_id| self.store.is_resource_initialized(resource_id))
            }
            DependencyRef::Task { .. }
            | DependencyRef::Event { .. }
            | DependencyRef::Error { .. }
            | DependencyRef::AsyncContext { .. }
            | DependencyRef::MiddlewareManager => true,
        }
    }

    /// Repeatedly initialize the wave of resources that are fully ready,
    /// until `target` (or every non-root resource, if `None`) is
    /// initialized. Each wave runs with all-settled semantics.
    ///
    /// # Errors
    /// Returns [`CoreError::ParallelInitScheduling`] if a wave is empty
    /// while work remains; [`CoreError::Aggregate`] if more than one
    /// resource in a wave fails; otherwise re-throws the single failure.
    pub async fn initialize_uninitialized_resources_parallel(
        &self,
        target: Option<&HashSet<String>>,
        root_id: &str,
    ) -> Result<(), CoreError> {
        loop {
            let pending: Vec<String> = match target {
                Some(set) => set
                    .iter()
                    .filter(|id| id.as_str() != root_id && !self.store.is_resource_initialized(id))
                    .cloned()
                    .collect(),
                None => self
                    .store
                    .resource_ids()
                    .into_iter()
                    .filter(|id| id.as_str() != root_id && !self.store.is_resource_initialized(id))
                    .collect(),
            };
            if pending.is_empty() {
                return Ok(());
            }

            let ready: Vec<String> = pending.iter().filter(|id| self.is_ready(id)).cloned().collect();
            if ready.is_empty() {
                return Err(CoreError::ParallelInitScheduling { remaining: pending });
            }
            debug!(wave_size = ready.len(), "initializing parallel resource wave");

            let results = futures_util::future::join_all(ready.iter().map(|id| {
                let extractor = Arc::clone(&self.extractor);
                let id = id.clone();
                async move { extractor.ensure_resource_initialized(&id, &[]).await }
            }))
            .await;

            let mut errors = results.into_iter().filter_map(Result::err);
            match (errors.next(), errors.next()) {
                (None, _) => {}
                (Some(only), None) => return Err(only),
                (Some(first), Some(second)) => {
                    let mut all = vec![first, second];
                    all.extend(errors);
                    return Err(CoreError::aggregate(all));
                }
            }
        }
    }
}
