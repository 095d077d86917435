//! An event tagged `excludeFromGlobalHooks` is delivered to hooks that
//! target it explicitly, but never to `"*"` wildcard subscribers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use runner_core::definition::AnyDefinition;
use runner_core::{orchestrator, EventBuilder, HookBuilder, ResourceBuilder, RunOptions};

#[tokio::test]
async fn excluded_event_skips_wildcard_hooks() {
    let event = Arc::new(EventBuilder::new("E").exclude_from_global_hooks().build());

    let wildcard_calls = Arc::new(AtomicUsize::new(0));
    let targeted_calls = Arc::new(AtomicUsize::new(0));

    let wildcard_counter = Arc::clone(&wildcard_calls);
    let wildcard_hook = Arc::new(
        HookBuilder::new("wildcard-hook")
            .on_wildcard()
            .run(move |_emission, _deps| {
                let counter = Arc::clone(&wildcard_counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .expect("wildcard hook builds"),
    );

    let targeted_counter = Arc::clone(&targeted_calls);
    let targeted_hook = Arc::new(
        HookBuilder::new("targeted-hook")
            .on_event("E")
            .run(move |_emission, _deps| {
                let counter = Arc::clone(&targeted_counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .expect("targeted hook builds"),
    );

    let root = ResourceBuilder::<(), ()>::new("root")
        .register(move |_cfg| {
            vec![
                AnyDefinition::Event(Arc::clone(&event)),
                AnyDefinition::Hook(Arc::clone(&wildcard_hook)),
                AnyDefinition::Hook(Arc::clone(&targeted_hook)),
            ]
        })
        .build()
        .expect("root builds");

    let result = orchestrator::run(root.def(), RunOptions::default())
        .await
        .expect("run succeeds");

    result.emit_event("E", "payload".to_string()).await.expect("emit succeeds");

    assert_eq!(targeted_calls.load(Ordering::SeqCst), 1);
    assert_eq!(wildcard_calls.load(Ordering::SeqCst), 0);

    let errors = result.dispose().await;
    assert!(errors.is_empty());
}
