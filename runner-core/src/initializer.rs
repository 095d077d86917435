//! Resource Initializer: runs a resource's `init` wrapped in its
//! resource-middleware chain — local middleware first (declaration
//! order, inside-out), then global "everywhere" resource middlewares, then
//! any global resource interceptors registered on the
//! [`crate::middleware_manager::MiddlewareManager`] — and returns the
//! resulting value alongside the `context()` seed. Emits no lifecycle
//! events of its own; dispatching lifecycle hooks is the orchestrator's
//! job, not this component's.

use std::sync::Arc;

use crate::definition::middleware::{NextFn, ResourceMiddlewareDef};
use crate::definition::resource::ResourceDef;
use crate::dependency::{ArcAny, ComputedDeps};
use crate::errors::CoreError;
use crate::middleware_manager::{
    MiddlewareManager, ResourceInterceptInput, ResourceInterceptorFn, ResourceNextFn,
};
use crate::store::Store;

pub struct ResourceInitializer;

impl ResourceInitializer {
    /// # Errors
    /// Propagates whatever `init` or any wrapping middleware layer returns.
    pub async fn initialize(
        def: &Arc<ResourceDef>,
        deps: ComputedDeps,
        store: &Arc<Store>,
        middleware_manager: &Arc<MiddlewareManager>,
    ) -> Result<(ArcAny, ArcAny), CoreError> {
        let context = def.make_context();

        let base_def = Arc::clone(def);
        let base_deps = deps;
        let base_context = Arc::clone(&context);
        let mut chain: NextFn = Arc::new(move |_config: ArcAny| {
            let def = Arc::clone(&base_def);
            let deps = base_deps.clone();
            let context = Arc::clone(&base_context);
            Box::pin(async move { def.run_init(deps, context).await })
        });

        for mw_id in def.middleware_ids().iter().rev() {
            if let Some(mw_def) = store.get_resource_middleware(mw_id) {
                let mw_deps = store.resource_middleware_computed_deps(mw_id).unwrap_or_default();
                chain = wrap(mw_def, mw_deps, chain);
                chain = wrap_interceptors(def.id(), middleware_manager.resource_middleware_interceptors(mw_id), chain);
            }
        }
        for (mw_def, mw_deps) in store.everywhere_resource_middlewares_for(def.id()).into_iter().rev() {
            let mw_id = mw_def.id().to_string();
            chain = wrap(mw_def, mw_deps, chain);
            chain = wrap_interceptors(def.id(), middleware_manager.resource_middleware_interceptors(&mw_id), chain);
        }

        let interceptors = middleware_manager.resource_interceptors();
        let chain = wrap_interceptors(def.id(), interceptors, chain);

        let value = chain(def.config()).await?;
        Ok((value, context))
    }
}

fn wrap(mw: Arc<ResourceMiddlewareDef>, deps: ComputedDeps, inner: NextFn) -> NextFn {
    Arc::new(move |config: ArcAny| {
        let mw = Arc::clone(&mw);
        let deps = deps.clone();
        let inner = Arc::clone(&inner);
        Box::pin(async move { mw.invoke(inner, config, deps).await })
    })
}

fn wrap_interceptors(resource_id: &str, interceptors: Vec<ResourceInterceptorFn>, inner: NextFn) -> NextFn {
    let resource_id = resource_id.to_string();
    interceptors.into_iter().rev().fold(inner, |next, interceptor| {
        let resource_id = resource_id.clone();
        Arc::new(move |config: ArcAny| {
            let next = Arc::clone(&next);
            let interceptor = Arc::clone(&interceptor);
            let resource_id = resource_id.clone();
            let next_fn: ResourceNextFn = Arc::new(move |intercepted: ResourceInterceptInput| {
                let next = Arc::clone(&next);
                Box::pin(async move { next(intercepted.config).await })
            });
            Box::pin(async move {
                interceptor(next_fn, ResourceInterceptInput { resource_id, config }).await
            })
        }) as NextFn
    })
}
