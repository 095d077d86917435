//! Event definitions and emissions.
//!
//! An [`EventDef`] carries no behavior of its own; the behavior lives in
//! the [`crate::event_manager::EventManager`] that dispatches emissions
//! of it to listening hooks.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dependency::ArcAny;
use crate::errors::CoreError;
use crate::kind::Meta;

/// A registered event definition.
pub struct EventDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) tags: Vec<String>,
    /// Events tagged `excludeFromGlobalHooks` are not delivered to `"*"`
    /// subscribers.
    pub(crate) exclude_from_global_hooks: bool,
}

impl EventDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn excludes_global_hooks(&self) -> bool {
        self.exclude_from_global_hooks
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Builder for [`EventDef`].
pub struct EventBuilder {
    id: String,
    meta: Meta,
    tags: Vec<String>,
    exclude_from_global_hooks: bool,
}

impl EventBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
            tags: Vec::new(),
            exclude_from_global_hooks: false,
        }
    }

    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Mark this event as excluded from `"*"` wildcard hooks.
    #[must_use]
    pub fn exclude_from_global_hooks(mut self) -> Self {
        self.exclude_from_global_hooks = true;
        self
    }

    #[must_use]
    pub fn build(self) -> EventDef {
        EventDef {
            id: self.id,
            meta: self.meta,
            tags: self.tags,
            exclude_from_global_hooks: self.exclude_from_global_hooks,
        }
    }
}

/// One dispatched occurrence of an event: an `{id, data, source, tags,
/// timestamp}` emission handed to each listening hook.
#[derive(Clone)]
pub struct Emission {
    pub id: Uuid,
    pub event_id: String,
    pub data: ArcAny,
    pub source: String,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub(crate) stop: Arc<AtomicBool>,
}

impl Emission {
    #[must_use]
    pub fn data_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Halt delivery to the remaining listeners of this emission.
    pub fn stop_propagation(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// The injectable form of an event dependency: a callable
/// `(payload) -> Future<Result<(), CoreError>>` bound to the event's id and
/// the owning resource/task's id as `source`.
#[derive(Clone)]
pub struct EventEmitter {
    pub(crate) event_id: String,
    pub(crate) source: String,
    pub(crate) manager: Arc<crate::event_manager::EventManager>,
}

impl EventEmitter {
    /// Emit `data` on this emitter's bound event id.
    ///
    /// # Errors
    /// Returns [`CoreError::EventCycle`] if reentrancy detection is enabled
    /// and this call re-enters an event already on the current call stack.
    pub async fn emit<T: Any + Send + Sync>(&self, data: T) -> Result<(), CoreError> {
        self.manager
            .emit(&self.event_id, Arc::new(data) as ArcAny, &self.source)
            .await
    }
}
