//! Hook: a listener bound to an event or `"*"`.

use std::sync::Arc;

use crate::definition::{BoxFuture, DependencyMapSource};
use crate::dependency::{ArcAny, ComputedDeps, DependencyMap};
use crate::errors::CoreError;
use crate::event::Emission;
use crate::kind::Meta;

/// What a hook listens on.
#[derive(Clone)]
pub enum HookTarget {
    Event(String),
    Events(Vec<String>),
    Wildcard,
}

type HookRunFn = Arc<dyn Fn(Emission, ComputedDeps) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>;

/// A registered hook definition.
pub struct HookDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) on: HookTarget,
    pub(crate) dependencies: DependencyMapSource,
    pub(crate) order: i32,
    pub(crate) run: HookRunFn,
}

impl HookDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn on(&self) -> &HookTarget {
        &self.on
    }

    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    #[must_use]
    pub fn dependencies(&self) -> DependencyMap {
        let empty: ArcAny = Arc::new(());
        self.dependencies.resolve(&empty)
    }

    /// # Errors
    /// Propagates whatever the declared `run` closure returns.
    pub async fn invoke(&self, emission: Emission, deps: ComputedDeps) -> Result<(), CoreError> {
        (self.run)(emission, deps).await
    }
}

/// Builder for [`HookDef`].
pub struct HookBuilder {
    id: String,
    meta: Meta,
    on: Option<HookTarget>,
    dependencies: DependencyMapSource,
    order: i32,
    run: Option<HookRunFn>,
}

impl HookBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
            on: None,
            dependencies: DependencyMapSource::default(),
            order: 0,
            run: None,
        }
    }

    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn on_event(mut self, event_id: impl Into<String>) -> Self {
        self.on = Some(HookTarget::Event(event_id.into()));
        self
    }

    #[must_use]
    pub fn on_events(mut self, event_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.on = Some(HookTarget::Events(event_ids.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn on_wildcard(mut self) -> Self {
        self.on = Some(HookTarget::Wildcard);
        self
    }

    #[must_use]
    pub fn dependencies(mut self, map: DependencyMap) -> Self {
        self.dependencies = DependencyMapSource::Static(map);
        self
    }

    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn run<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Emission, ComputedDeps) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        self.run = Some(Arc::new(move |emission, deps| Box::pin(f(emission, deps))));
        self
    }

    /// # Errors
    /// Returns [`CoreError::BuilderIncomplete`] if no `on` target or `run`
    /// was declared.
    pub fn build(self) -> Result<HookDef, CoreError> {
        let Some(on) = self.on else {
            return Err(CoreError::BuilderIncomplete {
                id: self.id,
                missing: "on",
            });
        };
        let Some(run) = self.run else {
            return Err(CoreError::BuilderIncomplete {
                id: self.id,
                missing: "run",
            });
        };
        Ok(HookDef {
            id: self.id,
            meta: self.meta,
            on,
            dependencies: self.dependencies,
            order: self.order,
            run,
        })
    }
}
