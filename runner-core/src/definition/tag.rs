//! Tag: a typed, attachable marker supporting `.with(cfg)` (definition
//! side) and, once injected, `.extract`/`.exists`/`.all*` (runtime side,
//! scoped to the registry).

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::dependency::{ArcAny, DependencyRef};
use crate::kind::Meta;

/// A registered tag definition. Carries no behavior; it exists purely as a
/// unique id other definitions can attach to.
pub struct TagDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
}

impl TagDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Builder for [`TagDef`].
pub struct TagBuilder {
    id: String,
    meta: Meta,
}

impl TagBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
        }
    }

    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn build(self) -> TagDef {
        TagDef {
            id: self.id,
            meta: self.meta,
        }
    }
}

/// A tag's definition-time attachment to some owner: the tag id plus an
/// optional typed config value (from `.with(cfg)`).
#[derive(Clone)]
pub struct TagUsage {
    pub(crate) tag_id: String,
    pub(crate) config: Option<ArcAny>,
}

impl TagUsage {
    #[must_use]
    pub fn tag_id(&self) -> &str {
        &self.tag_id
    }
}

impl From<&str> for TagUsage {
    fn from(id: &str) -> Self {
        TagUsage {
            tag_id: id.to_string(),
            config: None,
        }
    }
}

impl From<String> for TagUsage {
    fn from(id: String) -> Self {
        TagUsage {
            tag_id: id,
            config: None,
        }
    }
}

/// A typed, cloneable handle used at definition time, e.g.
/// `Tag::<RetryConfig>::new("retryable")`.
#[derive(Clone)]
pub struct Tag<Cfg> {
    id: String,
    _marker: PhantomData<fn() -> Cfg>,
}

impl<Cfg: Any + Send + Sync> Tag<Cfg> {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attach this tag with a config value to a definition's tag list.
    #[must_use]
    pub fn with(&self, config: Cfg) -> TagUsage {
        TagUsage {
            tag_id: self.id.clone(),
            config: Some(Arc::new(config)),
        }
    }

    /// Reference this tag as a dependency.
    #[must_use]
    pub fn dep(&self) -> DependencyRef {
        DependencyRef::Tag {
            id: self.id.clone(),
            optional: false,
            startup: false,
        }
    }

    #[must_use]
    pub fn optional(&self) -> DependencyRef {
        self.dep().optional()
    }

    #[must_use]
    pub fn startup(&self) -> DependencyRef {
        self.dep().startup()
    }
}

/// The injectable runtime handle for a tag dependency, scoped to the
/// registry it was extracted from.
#[derive(Clone)]
pub struct TagAccessor {
    pub(crate) tag_id: String,
    pub(crate) store: Arc<crate::store::Store>,
}

impl TagAccessor {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.tag_id
    }

    /// Every definition id (of any kind) carrying this tag.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        self.store.ids_with_tag(&self.tag_id)
    }

    #[must_use]
    pub fn all_tasks(&self) -> Vec<String> {
        self.store.tasks_with_tag(&self.tag_id)
    }

    #[must_use]
    pub fn all_resources(&self) -> Vec<String> {
        self.store.resources_with_tag(&self.tag_id)
    }

    /// The config value `target` attached when carrying this tag, if any.
    #[must_use]
    pub fn extract<T: Any + Send + Sync + Clone>(&self, target: &str) -> Option<T> {
        self.store
            .tag_config(target, &self.tag_id)
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    #[must_use]
    pub fn exists(&self, target: &str) -> bool {
        self.store.has_tag(target, &self.tag_id)
    }
}
