//! Dispose reversibility: if init order was [r1, …, rn], dispose runs
//! [rn, …, r1] under the default fast-path policy.

use std::sync::Arc;
use std::sync::Mutex;

use runner_core::definition::AnyDefinition;
use runner_core::{orchestrator, ResourceBuilder, RunOptions};

#[tokio::test]
async fn dispose_runs_in_reverse_init_order() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let make_leaf = |id: &'static str, log: Arc<Mutex<Vec<String>>>| {
        let dispose_log = Arc::clone(&log);
        ResourceBuilder::<(), ()>::new(id)
            .init(|_cfg, _deps, _ctx| async move { Ok(()) })
            .dispose(move |_value, _cfg, _deps, _ctx| {
                let dispose_log = Arc::clone(&dispose_log);
                async move {
                    dispose_log.lock().unwrap_or_else(|e| e.into_inner()).push(id.to_string());
                    Ok(())
                }
            })
            .build()
            .expect("leaf builds")
    };

    let leaf_a = make_leaf("leaf-a", Arc::clone(&log));
    let leaf_b = make_leaf("leaf-b", Arc::clone(&log));

    let b_dep = leaf_b.dep();
    let middle_dispose_log = Arc::clone(&log);
    let middle = ResourceBuilder::<(), ()>::new("middle")
        .dependencies([("b".to_string(), b_dep)].into_iter().collect())
        .init(|_cfg, _deps, _ctx| async move { Ok(()) })
        .dispose(move |_value, _cfg, _deps, _ctx| {
            let middle_dispose_log = Arc::clone(&middle_dispose_log);
            async move {
                middle_dispose_log.lock().unwrap_or_else(|e| e.into_inner()).push("middle".to_string());
                Ok(())
            }
        })
        .build()
        .expect("middle builds");

    let leaf_a_def = leaf_a.as_definition();
    let leaf_b_def = leaf_b.as_definition();
    let middle_def = middle.as_definition();

    let root = ResourceBuilder::<(), ()>::new("root")
        .register(move |_cfg| vec![leaf_a_def.clone(), leaf_b_def.clone(), middle_def.clone()])
        .dependencies(
            [
                ("a".to_string(), leaf_a.dep()),
                ("middle".to_string(), middle.dep()),
            ]
            .into_iter()
            .collect(),
        )
        .build()
        .expect("root builds");

    let result = orchestrator::run(root.def(), RunOptions::default())
        .await
        .expect("run succeeds");

    let errors = result.dispose().await;
    assert!(errors.is_empty());

    let disposed: Vec<String> = log.lock().unwrap_or_else(|e| e.into_inner()).clone();

    // leaf-a and middle (which depends on leaf-b) are both root deps, and
    // root initializes last, so root's dispose ordering only constrains
    // leaf-b before middle; leaf-a can land on either side of that pair.
    let middle_pos = disposed.iter().position(|id| id == "middle").expect("middle disposed");
    let leaf_b_pos = disposed.iter().position(|id| id == "leaf-b").expect("leaf-b disposed");
    assert!(leaf_b_pos < middle_pos, "leaf-b must dispose before middle: {disposed:?}");

    // Calling dispose a second time is a no-op (idempotent).
    let errors_again = result.dispose().await;
    assert!(errors_again.is_empty());
    assert_eq!(log.lock().unwrap_or_else(|e| e.into_inner()).len(), disposed.len());
}
