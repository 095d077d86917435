//! Override Manager: accumulates overrides from every registered
//! resource's `overrides` list and rewrites the targeted registry entries
//! in place.
//!
//! Override graphs may cycle (A overrides B, B overrides A); resolution
//! iterates a bounded number of passes (at most one per recorded request)
//! rather than recursing, so a cycle just stops changing instead of
//! blowing the stack.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::definition::resource::ResourceDef;

/// One `source` resource's request to replace `target`.
struct OverrideRequest {
    target_id: String,
    source_id: String,
}

#[derive(Default)]
pub struct OverrideManager {
    requests: Mutex<Vec<OverrideRequest>>,
}

impl OverrideManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source_id` overrides `target_id`.
    pub fn record(&self, target_id: impl Into<String>, source_id: impl Into<String>) {
        self.requests.lock().push(OverrideRequest {
            target_id: target_id.into(),
            source_id: source_id.into(),
        });
    }

    /// Apply every recorded request against `resources`, rewriting the
    /// `target_id` entry to the `source_id` entry's definition (rebound to
    /// answer to `target_id`). Runs fixed-point passes so override chains
    /// (A replaced by B, B replaced by C) converge; a cycle simply reaches
    /// a stable point instead of looping forever.
    ///
    /// Convergence is tracked by the identity of the *source* `Arc` last
    /// used for each target, not the rebound one — `rebind_id` always
    /// allocates a fresh `Arc`, so comparing the rebound pointer against the
    /// stored entry would never match and every pass would look "changed".
    /// The source pointer, by contrast, only changes when some other
    /// request has actually rewritten that entry since the last pass.
    pub fn process(&self, resources: &DashMap<String, Arc<ResourceDef>>) {
        let requests = self.requests.lock();
        let max_passes = requests.len().max(1);
        let mut last_source: std::collections::HashMap<String, Arc<ResourceDef>> = std::collections::HashMap::new();
        for _ in 0..max_passes {
            let mut changed = false;
            for request in requests.iter() {
                let Some(source_def) = resources.get(&request.source_id).map(|r| Arc::clone(&r)) else {
                    continue;
                };
                let unchanged = last_source
                    .get(&request.target_id)
                    .is_some_and(|prev| Arc::ptr_eq(prev, &source_def));
                if unchanged {
                    continue;
                }
                let rebound = source_def.rebind_id(request.target_id.clone());
                resources.insert(request.target_id.clone(), rebound);
                last_source.insert(request.target_id.clone(), source_def);
                changed = true;
            }
            if !changed {
                break;
            }
        }
    }
}
