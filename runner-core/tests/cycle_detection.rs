//! A resource dependency cycle A→B→C→A is rejected with
//! `CircularDependenciesError` containing the cycle path.

use runner_core::{orchestrator, CoreError, ResourceBuilder, RunOptions};

#[tokio::test]
async fn three_resource_cycle_is_rejected() {
    // Resources close a cycle through their `dependencies`, not through
    // `register` — a, b, c all need to exist in the registry up front, so
    // each is registered as a root child and the cycle only surfaces once
    // their `init`s are actually extracted.
    let a = ResourceBuilder::<(), ()>::new("a")
        .dependencies([("b".to_string(), runner_core::DependencyRef::Resource {
            id: "b".to_string(),
            optional: false,
            startup: false,
        })].into_iter().collect())
        .init(|_cfg, deps, _ctx| async move {
            let _ = deps.resource::<()>("b");
            Ok(())
        })
        .build()
        .expect("a builds");

    let b = ResourceBuilder::<(), ()>::new("b")
        .dependencies([("c".to_string(), runner_core::DependencyRef::Resource {
            id: "c".to_string(),
            optional: false,
            startup: false,
        })].into_iter().collect())
        .init(|_cfg, deps, _ctx| async move {
            let _ = deps.resource::<()>("c");
            Ok(())
        })
        .build()
        .expect("b builds");

    let c = ResourceBuilder::<(), ()>::new("c")
        .dependencies([("a".to_string(), runner_core::DependencyRef::Resource {
            id: "a".to_string(),
            optional: false,
            startup: false,
        })].into_iter().collect())
        .init(|_cfg, deps, _ctx| async move {
            let _ = deps.resource::<()>("a");
            Ok(())
        })
        .build()
        .expect("c builds");

    let a_def = a.as_definition();
    let b_def = b.as_definition();
    let c_def = c.as_definition();

    let root = ResourceBuilder::<(), ()>::new("root")
        .register(move |_cfg| vec![a_def.clone(), b_def.clone(), c_def.clone()])
        .dependencies([("a".to_string(), a.dep())].into_iter().collect())
        .build()
        .expect("root builds");

    let err = orchestrator::run(root.def(), RunOptions::default())
        .await
        .expect_err("cycle must be rejected");
    assert_eq!(err.kind(), "CircularDependenciesError");

    let CoreError::CircularDependencies { path } = &err else {
        panic!("expected CircularDependencies, got {err:?}");
    };
    assert!(path.contains(&"a".to_string()));
    assert!(path.contains(&"b".to_string()));
    assert!(path.contains(&"c".to_string()));
}
