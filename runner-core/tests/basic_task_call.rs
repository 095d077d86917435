//! A resource provides a value; a task depends on it and is invoked through
//! `RunResult::run_task` after `run()` completes.

use std::sync::Arc;

use runner_core::definition::AnyDefinition;
use runner_core::{orchestrator, ArcAny, ResourceBuilder, RunOptions, TaskBuilder};

#[tokio::test]
async fn task_reads_its_resource_dependency() {
    let prefix = ResourceBuilder::<(), String>::new("greeting.prefix")
        .init(|_config, _deps, _ctx| async move { Ok("Hello".to_string()) })
        .build()
        .expect("prefix resource builds");

    let greet = TaskBuilder::<String, String>::new("greeting.greet")
        .dependencies([("prefix".to_string(), prefix.dep())].into_iter().collect())
        .run(|name, deps| async move {
            let prefix = deps.resource::<String>("prefix")?;
            Ok(format!("{prefix}, {name}!"))
        })
        .build()
        .expect("greet task builds");

    let prefix_def = prefix.as_definition();
    let greet_def = greet.def();

    let root = ResourceBuilder::<(), ()>::new("app")
        .register(move |_cfg| vec![prefix_def.clone(), AnyDefinition::Task(Arc::clone(&greet_def))])
        .build()
        .expect("root resource builds");

    let result = orchestrator::run(root.def(), RunOptions::default())
        .await
        .expect("run succeeds");

    let input: ArcAny = Arc::new("World".to_string());
    let output = result
        .run_task("greeting.greet", input)
        .await
        .expect("task call succeeds");

    let output = output.downcast::<String>().expect("string output");
    assert_eq!(*output, "Hello, World!");

    let errors = result.dispose().await;
    assert!(errors.is_empty());
}
