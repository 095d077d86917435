//! In parallel mode, a resource depending on a tag is withheld from the
//! first wave and only admitted once every resource carrying that tag has
//! finished `init`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use runner_core::definition::AnyDefinition;
use runner_core::{orchestrator, Mode, ResourceBuilder, RunOptions, Tag, TagBuilder};

#[tokio::test]
async fn consumer_waits_for_tagged_resource_in_parallel_mode() {
    let tag = Tag::<()>::new("group");
    let tag_def = Arc::new(TagBuilder::new(tag.id().to_string()).build());
    let dep_initialized = Arc::new(AtomicBool::new(false));

    let dep_flag = Arc::clone(&dep_initialized);
    let dep = ResourceBuilder::<(), String>::new("dep")
        .tags([tag.id().to_string()])
        .init(move |_cfg, _deps, _ctx| {
            let dep_flag = Arc::clone(&dep_flag);
            async move {
                dep_flag.store(true, Ordering::SeqCst);
                Ok("d".to_string())
            }
        })
        .build()
        .expect("dep builds");

    let consumer_flag = Arc::clone(&dep_initialized);
    let consumer = ResourceBuilder::<(), bool>::new("consumer")
        .dependencies([("t".to_string(), tag.dep())].into_iter().collect())
        .init(move |_cfg, deps, _ctx| {
            let consumer_flag = Arc::clone(&consumer_flag);
            async move {
                let _ = deps.tag("t")?;
                // By the time consumer's init runs, the scheduler must have
                // already finished initializing every resource tagged `group`.
                Ok(consumer_flag.load(Ordering::SeqCst))
            }
        })
        .build()
        .expect("consumer builds");

    let dep_def = dep.as_definition();
    let consumer_def = consumer.as_definition();

    let root = ResourceBuilder::<(), ()>::new("root")
        .register(move |_cfg| {
            vec![
                AnyDefinition::Tag(Arc::clone(&tag_def)),
                dep_def.clone(),
                consumer_def.clone(),
            ]
        })
        .dependencies([("consumer".to_string(), consumer.dep())].into_iter().collect())
        .build()
        .expect("root builds");

    let options = RunOptions {
        mode: Mode::Parallel,
        ..RunOptions::default()
    };

    let result = orchestrator::run(root.def(), options).await.expect("run succeeds");

    let consumer_saw_dep_ready = result.get_resource_value("consumer").expect("consumer initialized");
    let consumer_saw_dep_ready = *consumer_saw_dep_ready.downcast::<bool>().expect("bool value");
    assert!(consumer_saw_dep_ready);

    let dep_value = result.get_resource_value("dep").expect("dep initialized");
    assert_eq!(*dep_value.downcast::<String>().expect("string"), "d");

    let errors = result.dispose().await;
    assert!(errors.is_empty());
}
