//! A resource registered with `overrides: [X_v1]` replaces `X_v1`
//! everywhere it is depended upon, under `X_v1`'s own id.

use runner_core::{orchestrator, ResourceBuilder, RunOptions};

#[tokio::test]
async fn override_replaces_target_definition_by_id() {
    let x_v1 = ResourceBuilder::<(), String>::new("x")
        .init(|_cfg, _deps, _ctx| async move { Ok("v1".to_string()) })
        .build()
        .expect("x_v1 builds");

    let x_v2 = ResourceBuilder::<(), String>::new("x_v2")
        .overrides([x_v1.def()])
        .init(|_cfg, _deps, _ctx| async move { Ok("v2".to_string()) })
        .build()
        .expect("x_v2 builds");

    let consumer = ResourceBuilder::<(), String>::new("consumer")
        .dependencies([("x".to_string(), x_v1.dep())].into_iter().collect())
        .init(|_cfg, deps, _ctx| async move {
            let x = deps.resource::<String>("x")?;
            Ok((*x).clone())
        })
        .build()
        .expect("consumer builds");

    let x_v1_def = x_v1.as_definition();
    let x_v2_def = x_v2.as_definition();
    let consumer_def = consumer.as_definition();

    let root = ResourceBuilder::<(), ()>::new("root")
        .register(move |_cfg| vec![x_v1_def.clone(), x_v2_def.clone(), consumer_def.clone()])
        .dependencies([("consumer".to_string(), consumer.dep())].into_iter().collect())
        .build()
        .expect("root builds");

    let result = orchestrator::run(root.def(), RunOptions::default())
        .await
        .expect("run succeeds");

    let value = result.get_resource_value("consumer").expect("consumer initialized");
    let value = value.downcast::<String>().expect("string value");
    assert_eq!(*value, "v2");

    // The override target id ("x") is what got initialized, not the
    // override source's own id ("x_v2") — the source definition answers to
    // the target's id after rebinding.
    assert!(result.get_resource_value("x").is_ok());

    let errors = result.dispose().await;
    assert!(errors.is_empty());
}
