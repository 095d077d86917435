//! Dependency Processor: drives dependency extraction for every registered
//! entity in the fixed order middlewares (task then resource) → tasks →
//! hooks, storing each entity's `computedDependencies` on the [`Store`] as
//! it goes. Hooks are wired onto the
//! [`crate::event_manager::EventManager`] as soon as their own dependencies
//! are known.
//!
//! Resources are not walked here directly — a resource's dependencies are
//! only discovered by initializing it, so
//! [`DependencyProcessor::initialize_uninitialized_resources`] drives that
//! instead, via the [`crate::dependency::extractor::DependencyExtractor`].

use std::sync::Arc;

use crate::definition::hook::HookTarget;
use crate::dependency::extractor::DependencyExtractor;
use crate::errors::CoreError;
use crate::store::Store;

pub struct DependencyProcessor {
    store: Arc<Store>,
    extractor: Arc<DependencyExtractor>,
}

impl DependencyProcessor {
    #[must_use]
    pub fn new(store: Arc<Store>, extractor: Arc<DependencyExtractor>) -> Self {
        Self { store, extractor }
    }

    /// Run the fixed-order walk: task middlewares, resource middlewares,
    /// tasks, then hooks.
    ///
    /// # Errors
    /// Propagates the first extraction failure encountered.
    pub async fn process_all(&self) -> Result<(), CoreError> {
        self.process_task_middlewares().await?;
        self.process_resource_middlewares().await?;
        self.process_tasks().await?;
        self.process_hooks().await?;
        Ok(())
    }

    async fn process_task_middlewares(&self) -> Result<(), CoreError> {
        for id in self.store.task_middleware_ids() {
            let Some(def) = self.store.get_task_middleware(&id) else {
                continue;
            };
            let deps = self.extractor.extract(&id, &def.dependencies()).await?;
            self.store.set_task_middleware_deps(&id, deps);
        }
        Ok(())
    }

    async fn process_resource_middlewares(&self) -> Result<(), CoreError> {
        for id in self.store.resource_middleware_ids() {
            let Some(def) = self.store.get_resource_middleware(&id) else {
                continue;
            };
            let deps = self.extractor.extract(&id, &def.dependencies()).await?;
            self.store.set_resource_middleware_deps(&id, deps);
        }
        Ok(())
    }

    async fn process_tasks(&self) -> Result<(), CoreError> {
        for id in self.store.task_ids() {
            let Some(def) = self.store.get_task(&id) else {
                continue;
            };
            let deps = self.extractor.extract(&id, &def.dependencies()).await?;
            self.store.set_task_deps(&id, deps);
        }
        Ok(())
    }

    /// Compute each hook's dependencies and register it with the
    /// [`crate::event_manager::EventManager`] as a listener on its declared
    /// event(s), or as a global listener when `on === "*"`.
    async fn process_hooks(&self) -> Result<(), CoreError> {
        let event_manager = self.store.event_manager();
        for id in self.store.hook_ids() {
            let Some(def) = self.store.get_hook(&id) else {
                continue;
            };
            let deps = self.extractor.extract(&id, &def.dependencies()).await?;
            self.store.set_hook_deps(&id, deps.clone());

            match def.on() {
                HookTarget::Event(event_id) => {
                    event_manager.add_listener(Some(event_id), Arc::clone(&def), deps);
                }
                HookTarget::Events(event_ids) => {
                    for event_id in event_ids {
                        event_manager.add_listener(Some(event_id), Arc::clone(&def), deps.clone());
                    }
                }
                HookTarget::Wildcard => {
                    event_manager.add_listener(None, Arc::clone(&def), deps);
                }
            }
        }
        Ok(())
    }

    /// After all explicit dependency walks finish, initialize every
    /// resource still uninitialized, except `root_id` — the orchestrator
    /// always initializes the root last. Sequential mode: resources are
    /// initialized one at a time, in registration order.
    ///
    /// # Errors
    /// Propagates the first resource `init` failure.
    pub async fn initialize_uninitialized_resources(&self, root_id: &str) -> Result<(), CoreError> {
        for id in self.store.resource_ids() {
            if id == root_id || self.store.is_resource_initialized(&id) {
                continue;
            }
            self.extractor.ensure_resource_initialized(&id, &[]).await?;
        }
        Ok(())
    }
}
