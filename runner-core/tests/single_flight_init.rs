//! For every concurrent pair of extractions of the same resource, `init`
//! call count is 1 — single-flight coalescing.
//!
//! Drives the Dependency Extractor directly rather than through `run()`:
//! the full orchestrator always initializes every resource a task/hook/
//! middleware depends on during its own sequential phase 2 walk, so by the
//! time `RunResult` exists there is nothing left to race concurrently.
//! Single-flight coalescing is instead the thing protecting concurrent
//! `ensure_resource_initialized` callers *during* that walk (and in
//! parallel-mode wave scheduling) from double-running the same `init`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use runner_core::dependency::extractor::DependencyExtractor;
use runner_core::{EventManager, MiddlewareManager, ResourceBuilder, Store, TaskRunner};

#[tokio::test]
async fn concurrent_extractions_of_the_same_resource_init_once() {
    let init_calls = Arc::new(AtomicUsize::new(0));
    let init_calls_for_resource = Arc::clone(&init_calls);

    let shared = ResourceBuilder::<(), u64>::new("shared")
        .init(move |_cfg, _deps, _ctx| {
            let init_calls = Arc::clone(&init_calls_for_resource);
            async move {
                init_calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(42_u64)
            }
        })
        .build()
        .expect("shared builds");

    let event_manager = Arc::new(EventManager::new(true));
    let middleware_manager = Arc::new(MiddlewareManager::new());
    let store = Store::new(Arc::clone(&event_manager), Arc::clone(&middleware_manager));
    store.store_resource(shared.def()).expect("resource registers");

    let task_runner = Arc::new(TaskRunner::new(Arc::clone(&store), Arc::clone(&middleware_manager)));
    let extractor = Arc::new(DependencyExtractor::new(Arc::clone(&store), task_runner));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let extractor = Arc::clone(&extractor);
        handles.push(tokio::spawn(async move {
            extractor.ensure_resource_initialized("shared", &[]).await
        }));
    }

    for handle in handles {
        let value = handle.await.expect("join succeeds").expect("init succeeds");
        let value = *value.downcast::<u64>().expect("u64 value");
        assert_eq!(value, 42);
    }

    assert_eq!(init_calls.load(Ordering::SeqCst), 1);
}
