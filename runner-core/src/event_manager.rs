//! Event Manager: publishes events to ordered listeners, supports the
//! `"*"` wildcard, hook interception, and reentrancy detection.
//!
//! Reentrancy detection reuses the same "async-boundary-safe scoped
//! carrier" shape as [`crate::async_context`]: a `tokio::task_local!`
//! holding the chain of event ids currently being emitted on this task.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::dependency::{ArcAny, ComputedDeps};
use crate::definition::hook::HookDef;
use crate::errors::CoreError;
use crate::event::Emission;

tokio::task_local! {
    static EVENT_CALL_STACK: RefCell<Vec<String>>;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type NextHookFn = Arc<dyn Fn(Emission) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>;
type HookInterceptor =
    Arc<dyn Fn(NextHookFn, Arc<HookDef>, Emission) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>;

struct ListenerEntry {
    hook: Arc<HookDef>,
    deps: ComputedDeps,
    order: i32,
    seq: usize,
}

/// Per-run event dispatcher. One instance is created per `run()` call;
/// nothing about dispatch is held in module-level global state.
pub struct EventManager {
    cycle_detection: bool,
    listeners: Mutex<std::collections::HashMap<String, Vec<ListenerEntry>>>,
    wildcard: Mutex<Vec<ListenerEntry>>,
    excluded: Mutex<std::collections::HashSet<String>>,
    event_tags: Mutex<std::collections::HashMap<String, Vec<String>>>,
    hook_interceptors: ArcSwap<Vec<HookInterceptor>>,
    seq: std::sync::atomic::AtomicUsize,
}

impl EventManager {
    #[must_use]
    pub fn new(cycle_detection: bool) -> Self {
        Self {
            cycle_detection,
            listeners: Mutex::new(std::collections::HashMap::new()),
            wildcard: Mutex::new(Vec::new()),
            excluded: Mutex::new(std::collections::HashSet::new()),
            event_tags: Mutex::new(std::collections::HashMap::new()),
            hook_interceptors: ArcSwap::from_pointee(Vec::new()),
            seq: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Record `event_id`'s declared tags and whether it is tagged
    /// `excludeFromGlobalHooks`.
    pub fn register_event(&self, event_id: impl Into<String>, tags: Vec<String>, exclude_from_global_hooks: bool) {
        let event_id = event_id.into();
        if exclude_from_global_hooks {
            self.excluded.lock().insert(event_id.clone());
        }
        if !tags.is_empty() {
            self.event_tags.lock().insert(event_id, tags);
        }
    }

    /// Attach a hook as a listener, stably ordered by `(order, registration
    /// order)`.
    pub fn add_listener(&self, event_id: Option<&str>, hook: Arc<HookDef>, deps: ComputedDeps) {
        let seq = self.seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let entry = ListenerEntry {
            order: hook.order(),
            hook,
            deps,
            seq,
        };
        match event_id {
            Some(id) => {
                let mut listeners = self.listeners.lock();
                let bucket = listeners.entry(id.to_string()).or_default();
                bucket.push(entry);
                bucket.sort_by_key(|e| (e.order, e.seq));
            }
            None => {
                let mut wildcard = self.wildcard.lock();
                wildcard.push(entry);
                wildcard.sort_by_key(|e| (e.order, e.seq));
            }
        }
    }

    /// Register a global hook interceptor.
    pub fn intercept_hook(&self, interceptor: HookInterceptor) {
        let mut next = (**self.hook_interceptors.load()).clone();
        next.push(interceptor);
        self.hook_interceptors.store(Arc::new(next));
    }

    /// Emit `data` on `event_id` from `source`, dispatching to every
    /// listener in order (plus wildcard listeners, unless excluded).
    ///
    /// # Errors
    /// Returns [`CoreError::EventCycle`] if cycle detection is enabled and
    /// this call re-enters an event already on the current call stack;
    /// otherwise propagates the first listener failure.
    pub async fn emit(&self, event_id: &str, data: ArcAny, source: &str) -> Result<(), CoreError> {
        let has_scope = EVENT_CALL_STACK.try_with(|_| ()).is_ok();
        if has_scope {
            self.emit_checked(event_id, data, source).await
        } else {
            EVENT_CALL_STACK
                .scope(RefCell::new(Vec::new()), self.emit_checked(event_id, data, source))
                .await
        }
    }

    async fn emit_checked(&self, event_id: &str, data: ArcAny, source: &str) -> Result<(), CoreError> {
        let _guard = if self.cycle_detection {
            let reentered =
                EVENT_CALL_STACK.with(|stack| stack.borrow().iter().any(|e| e == event_id));
            if reentered {
                return Err(CoreError::EventCycle {
                    event_id: event_id.to_string(),
                });
            }
            EVENT_CALL_STACK.with(|stack| stack.borrow_mut().push(event_id.to_string()));
            Some(StackGuard)
        } else {
            None
        };

        let tags = self.event_tags.lock().get(event_id).cloned().unwrap_or_default();
        let emission = Emission {
            id: Uuid::now_v7(),
            event_id: event_id.to_string(),
            data,
            source: source.to_string(),
            tags,
            timestamp: Utc::now(),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let excluded = self.excluded.lock().contains(event_id);

        let mut entries: Vec<(Arc<HookDef>, ComputedDeps)> = self
            .listeners
            .lock()
            .get(event_id)
            .map(|bucket| bucket.iter().map(|e| (Arc::clone(&e.hook), e.deps.clone())).collect())
            .unwrap_or_default();

        if !excluded {
            let wildcard = self.wildcard.lock();
            entries.extend(wildcard.iter().map(|e| (Arc::clone(&e.hook), e.deps.clone())));
        }
        entries.sort_by_key(|(hook, _)| hook.order());

        for (hook, deps) in entries {
            if hook.id() == source {
                continue;
            }
            if emission.is_stopped() {
                break;
            }
            self.invoke_hook(&hook, emission.clone(), deps).await?;
        }

        Ok(())
    }

    async fn invoke_hook(
        &self,
        hook: &Arc<HookDef>,
        emission: Emission,
        deps: ComputedDeps,
    ) -> Result<(), CoreError> {
        let interceptors = self.hook_interceptors.load();
        let hook_for_base = Arc::clone(hook);
        let base: NextHookFn = Arc::new(move |emission: Emission| {
            let hook = Arc::clone(&hook_for_base);
            let deps = deps.clone();
            Box::pin(async move { hook.invoke(emission, deps).await })
        });

        let chain = interceptors.iter().cloned().rev().fold(base, |next, interceptor| {
            let hook = Arc::clone(hook);
            let interceptor = Arc::clone(&interceptor);
            Arc::new(move |emission: Emission| {
                let next = Arc::clone(&next);
                let hook = Arc::clone(&hook);
                interceptor(next, hook, emission)
            }) as NextHookFn
        });

        chain(emission).await
    }
}

struct StackGuard;

impl Drop for StackGuard {
    fn drop(&mut self) {
        let _ = EVENT_CALL_STACK.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
