//! Middleware: wraps task execution (`TaskMiddleware`) or resource init
//! (`ResourceMiddleware`); may be local (declared on a task/resource) or
//! global (`everywhere`).

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::definition::validate::Validate;
use crate::definition::{downcast_any, BoxFuture, DependencyMapSource};
use crate::dependency::{ArcAny, ComputedDeps, DependencyMap};
use crate::errors::CoreError;
use crate::kind::Meta;

/// Continuation handle passed to a middleware's `run`: call it with the
/// input the next layer should see (the middleware's own `input` argument,
/// unchanged, to pass through; any other value to override it — made total
/// since Rust has no optional positional arguments).
pub type NextFn = Arc<dyn Fn(ArcAny) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync>;

/// Whether a global middleware applies to a given target id.
#[derive(Clone)]
pub enum EverywherePredicate {
    Never,
    Always,
    Targeted(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl EverywherePredicate {
    #[must_use]
    pub fn matches(&self, target_id: &str) -> bool {
        match self {
            EverywherePredicate::Never => false,
            EverywherePredicate::Always => true,
            EverywherePredicate::Targeted(f) => f(target_id),
        }
    }

    #[must_use]
    pub fn is_everywhere(&self) -> bool {
        !matches!(self, EverywherePredicate::Never)
    }
}

type MiddlewareRunFn = Arc<
    dyn Fn(NextFn, ArcAny, ComputedDeps, ArcAny) -> BoxFuture<'static, Result<ArcAny, CoreError>>
        + Send
        + Sync,
>;

/// A registered, type-erased task-middleware definition.
pub struct TaskMiddlewareDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) tags: Vec<crate::definition::tag::TagUsage>,
    pub(crate) dependencies: DependencyMapSource,
    pub(crate) everywhere: EverywherePredicate,
    pub(crate) config_schema: Option<Arc<dyn Validate<ArcAny>>>,
    pub(crate) config: ArcAny,
    pub(crate) run: MiddlewareRunFn,
}

impl TaskMiddlewareDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn tags(&self) -> &[crate::definition::tag::TagUsage] {
        &self.tags
    }

    #[must_use]
    pub fn everywhere(&self) -> &EverywherePredicate {
        &self.everywhere
    }

    #[must_use]
    pub fn dependencies(&self) -> DependencyMap {
        self.dependencies.resolve(&self.config)
    }

    /// Invoke this middleware layer.
    ///
    /// # Errors
    /// Propagates whatever `next` or the middleware body return.
    pub async fn invoke(
        &self,
        next: NextFn,
        input: ArcAny,
        deps: ComputedDeps,
    ) -> Result<ArcAny, CoreError> {
        (self.run)(next, input, deps, Arc::clone(&self.config)).await
    }
}

/// A registered, type-erased resource-middleware definition.
pub struct ResourceMiddlewareDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) tags: Vec<crate::definition::tag::TagUsage>,
    pub(crate) dependencies: DependencyMapSource,
    pub(crate) everywhere: EverywherePredicate,
    pub(crate) config_schema: Option<Arc<dyn Validate<ArcAny>>>,
    pub(crate) config: ArcAny,
    pub(crate) run: MiddlewareRunFn,
}

impl ResourceMiddlewareDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn tags(&self) -> &[crate::definition::tag::TagUsage] {
        &self.tags
    }

    #[must_use]
    pub fn everywhere(&self) -> &EverywherePredicate {
        &self.everywhere
    }

    #[must_use]
    pub fn dependencies(&self) -> DependencyMap {
        self.dependencies.resolve(&self.config)
    }

    /// # Errors
    /// Propagates whatever `next` or the middleware body return.
    pub async fn invoke(
        &self,
        next: NextFn,
        resource_config: ArcAny,
        deps: ComputedDeps,
    ) -> Result<ArcAny, CoreError> {
        (self.run)(next, resource_config, deps, Arc::clone(&self.config)).await
    }
}

macro_rules! middleware_builder {
    ($builder:ident, $def:ident) => {
        pub struct $builder<Cfg> {
            id: String,
            meta: Meta,
            tags: Vec<crate::definition::tag::TagUsage>,
            dependencies: DependencyMapSource,
            everywhere: EverywherePredicate,
            config_schema: Option<Arc<dyn Validate<ArcAny>>>,
            config: Option<Cfg>,
            run: Option<
                Arc<
                    dyn Fn(NextFn, ArcAny, ComputedDeps, Arc<Cfg>) -> BoxFuture<'static, Result<ArcAny, CoreError>>
                        + Send
                        + Sync,
                >,
            >,
            _marker: PhantomData<fn() -> Cfg>,
        }

        impl<Cfg> $builder<Cfg>
        where
            Cfg: Any + Send + Sync + Default,
        {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self {
                    id: id.into(),
                    meta: Meta::new(),
                    tags: Vec::new(),
                    dependencies: DependencyMapSource::default(),
                    everywhere: EverywherePredicate::Never,
                    config_schema: None,
                    config: None,
                    run: None,
                    _marker: PhantomData,
                }
            }

            #[must_use]
            pub fn meta(mut self, meta: Meta) -> Self {
                self.meta = meta;
                self
            }

            #[must_use]
            pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<crate::definition::tag::TagUsage>>) -> Self {
                self.tags.extend(tags.into_iter().map(Into::into));
                self
            }

            #[must_use]
            pub fn dependencies(mut self, map: DependencyMap) -> Self {
                self.dependencies = DependencyMapSource::Static(map);
                self
            }

            #[must_use]
            pub fn everywhere(mut self) -> Self {
                self.everywhere = EverywherePredicate::Always;
                self
            }

            #[must_use]
            pub fn everywhere_if<F>(mut self, predicate: F) -> Self
            where
                F: Fn(&str) -> bool + Send + Sync + 'static,
            {
                self.everywhere = EverywherePredicate::Targeted(Arc::new(predicate));
                self
            }

            #[must_use]
            pub fn config_schema(mut self, schema: Arc<dyn Validate<ArcAny>>) -> Self {
                self.config_schema = Some(schema);
                self
            }

            #[must_use]
            pub fn config(mut self, config: Cfg) -> Self {
                self.config = Some(config);
                self
            }

            #[must_use]
            pub fn run<F, Fut>(mut self, f: F) -> Self
            where
                F: Fn(NextFn, ArcAny, ComputedDeps, Arc<Cfg>) -> Fut + Send + Sync + 'static,
                Fut: std::future::Future<Output = Result<ArcAny, CoreError>> + Send + 'static,
            {
                self.run = Some(Arc::new(move |next, input, deps, cfg| Box::pin(f(next, input, deps, cfg))));
                self
            }

            /// # Errors
            /// Returns [`CoreError::BuilderIncomplete`] if no `run` was declared.
            pub fn build(self) -> Result<Arc<$def>, CoreError> {
                let Some(run) = self.run else {
                    return Err(CoreError::BuilderIncomplete {
                        id: self.id,
                        missing: "run",
                    });
                };
                let config: ArcAny = Arc::new(self.config.unwrap_or_default());
                let erased_run: MiddlewareRunFn = Arc::new(move |next, input, deps, config: ArcAny| {
                    let run = Arc::clone(&run);
                    Box::pin(async move {
                        let typed_config = downcast_any::<Cfg>(config, "middleware config")?;
                        run(next, input, deps, typed_config).await
                    })
                });
                Ok(Arc::new($def {
                    id: self.id,
                    meta: self.meta,
                    tags: self.tags,
                    dependencies: self.dependencies,
                    everywhere: self.everywhere,
                    config_schema: self.config_schema,
                    config,
                    run: erased_run,
                }))
            }
        }
    };
}

middleware_builder!(TaskMiddlewareBuilder, TaskMiddlewareDef);
middleware_builder!(ResourceMiddlewareBuilder, ResourceMiddlewareDef);
