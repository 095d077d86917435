//! Task middlewares compose inside-out, in declaration order — the
//! last-declared middleware sits closest to the task body.

use std::sync::Arc;

use runner_core::definition::AnyDefinition;
use runner_core::{orchestrator, ArcAny, ResourceBuilder, RunOptions, TaskBuilder, TaskMiddlewareBuilder};

#[tokio::test]
async fn task_middlewares_compose_declaration_order_inside_out() {
    let m1 = TaskMiddlewareBuilder::<()>::new("m1")
        .run(|next, input, deps, _cfg| async move {
            let out = next(input).await?;
            let n = *out.downcast::<i64>().map_err(|_| runner_core::CoreError::wrap_non_error("bad type"))?;
            let _ = deps;
            Ok(Arc::new(n + 1) as ArcAny)
        })
        .build()
        .expect("m1 builds");

    let m2 = TaskMiddlewareBuilder::<()>::new("m2")
        .run(|next, input, _deps, _cfg| async move {
            let out = next(input).await?;
            let n = *out.downcast::<i64>().map_err(|_| runner_core::CoreError::wrap_non_error("bad type"))?;
            Ok(Arc::new(n * 2) as ArcAny)
        })
        .build()
        .expect("m2 builds");

    let add_five = TaskBuilder::<i64, i64>::new("add_five")
        .middleware(["m1", "m2"])
        .run(|n, _deps| async move { Ok(*n + 5) })
        .build()
        .expect("task builds");

    let task_def = add_five.def();
    let m1_id = m1.id().to_string();
    let m2_id = m2.id().to_string();

    let root = ResourceBuilder::<(), ()>::new("app")
        .register(move |_cfg| {
            vec![
                AnyDefinition::TaskMiddleware(Arc::clone(&m1)),
                AnyDefinition::TaskMiddleware(Arc::clone(&m2)),
                AnyDefinition::Task(Arc::clone(&task_def)),
            ]
        })
        .build()
        .expect("root builds");

    let result = orchestrator::run(root.def(), RunOptions::default())
        .await
        .expect("run succeeds");

    assert_eq!(m1_id, "m1");
    assert_eq!(m2_id, "m2");

    let input: ArcAny = Arc::new(5_i64);
    let output = result.run_task("add_five", input).await.expect("task call succeeds");
    let output = *output.downcast::<i64>().expect("i64 output");

    // ((5+5)*2)+1 = 21
    assert_eq!(output, 21);

    let errors = result.dispose().await;
    assert!(errors.is_empty());
}
