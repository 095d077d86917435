//! Resource: a long-lived singleton with `init`/`dispose`, optionally
//! registering child entities.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::dependency::{ArcAny, DependencyMap, DependencyRef};
use crate::definition::tag::TagUsage;
use crate::definition::validate::Validate;
use crate::definition::{downcast_any, AnyDefinition, BoxFuture, DependencyMapSource};
use crate::errors::CoreError;
use crate::kind::Meta;

type InitFn = Arc<dyn Fn(ArcAny, crate::dependency::ComputedDeps, ArcAny) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync>;
type DisposeFn = Arc<dyn Fn(ArcAny, ArcAny, crate::dependency::ComputedDeps, ArcAny) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>;
type ContextFn = Arc<dyn Fn(&ArcAny) -> ArcAny + Send + Sync>;
type RegisterFn = Arc<dyn Fn(&ArcAny) -> Vec<AnyDefinition> + Send + Sync>;

/// A registered, type-erased resource definition. The Store and every
/// downstream component (`processor`, `initializer`, `scheduler`) operate
/// on this; only the builder and the typed [`Resource<C, V>`] handle know
/// the concrete `C`/`V`.
pub struct ResourceDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) tags: Vec<TagUsage>,
    pub(crate) dependencies: DependencyMapSource,
    pub(crate) middleware: Vec<String>,
    pub(crate) overrides: Vec<Arc<ResourceDef>>,
    pub(crate) register: Option<RegisterFn>,
    pub(crate) context_fn: Option<ContextFn>,
    pub(crate) init: Option<InitFn>,
    pub(crate) dispose: Option<DisposeFn>,
    pub(crate) config_schema: Option<Arc<dyn Validate<ArcAny>>>,
    pub(crate) config: ArcAny,
}

impl ResourceDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn tags(&self) -> &[TagUsage] {
        &self.tags
    }

    #[must_use]
    pub fn middleware_ids(&self) -> &[String] {
        &self.middleware
    }

    #[must_use]
    pub fn dependencies(&self) -> DependencyMap {
        self.dependencies.resolve(&self.config)
    }

    #[must_use]
    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    #[must_use]
    pub fn config(&self) -> ArcAny {
        Arc::clone(&self.config)
    }

    /// Materialize this resource's children via its `register` factory, if
    /// any.
    #[must_use]
    pub fn children(&self) -> Vec<AnyDefinition> {
        self.register
            .as_ref()
            .map_or_else(Vec::new, |f| f(&self.config))
    }

    /// Produce this resource's context seed, or `()` if no `context()`
    /// factory was declared.
    #[must_use]
    pub fn make_context(&self) -> ArcAny {
        self.context_fn.as_ref().map_or_else(
            || Arc::new(()) as ArcAny,
            |f| f(&self.config),
        )
    }

    /// Run this resource's `init`, or fall back to `()` when none was
    /// declared.
    ///
    /// # Errors
    /// Propagates whatever the declared `init` closure returns.
    pub async fn run_init(
        &self,
        deps: crate::dependency::ComputedDeps,
        context: ArcAny,
    ) -> Result<ArcAny, CoreError> {
        match &self.init {
            Some(init) => init(Arc::clone(&self.config), deps, context).await,
            None => Ok(Arc::new(()) as ArcAny),
        }
    }

    /// Clone this definition with its runtime config value replaced — used
    /// by the orchestrator to bind the root resource's config, which is
    /// supplied to `run()` rather than baked into the definition.
    #[must_use]
    pub(crate) fn with_runtime_config(self: &Arc<Self>, config: ArcAny) -> Arc<ResourceDef> {
        Arc::new(ResourceDef {
            id: self.id.clone(),
            meta: self.meta.clone(),
            tags: self.tags.clone(),
            dependencies: self.dependencies.clone(),
            middleware: self.middleware.clone(),
            overrides: self.overrides.clone(),
            register: self.register.clone(),
            context_fn: self.context_fn.clone(),
            init: self.init.clone(),
            dispose: self.dispose.clone(),
            config_schema: self.config_schema.clone(),
            config,
        })
    }

    /// Clone this definition under a different id — how the Override
    /// Manager makes an overriding resource's definition answer to its
    /// target's id.
    #[must_use]
    pub(crate) fn rebind_id(self: &Arc<Self>, new_id: String) -> Arc<ResourceDef> {
        Arc::new(ResourceDef {
            id: new_id,
            meta: self.meta.clone(),
            tags: self.tags.clone(),
            dependencies: self.dependencies.clone(),
            middleware: self.middleware.clone(),
            overrides: self.overrides.clone(),
            register: self.register.clone(),
            context_fn: self.context_fn.clone(),
            init: self.init.clone(),
            dispose: self.dispose.clone(),
            config_schema: self.config_schema.clone(),
            config: Arc::clone(&self.config),
        })
    }

    /// Run this resource's `dispose`, if declared.
    ///
    /// # Errors
    /// Propagates whatever the declared `dispose` closure returns.
    pub async fn run_dispose(
        &self,
        value: ArcAny,
        deps: crate::dependency::ComputedDeps,
        context: ArcAny,
    ) -> Result<(), CoreError> {
        match &self.dispose {
            Some(dispose) => dispose(value, Arc::clone(&self.config), deps, context).await,
            None => Ok(()),
        }
    }
}

/// Builder for [`ResourceDef`], generalized over the resource's config (`C`)
/// and value (`V`) types.
pub struct ResourceBuilder<C, V> {
    id: String,
    meta: Meta,
    tags: Vec<TagUsage>,
    dependencies: DependencyMapSource,
    middleware: Vec<String>,
    overrides: Vec<Arc<ResourceDef>>,
    register: Option<RegisterFn>,
    context_fn: Option<ContextFn>,
    init: Option<Arc<dyn Fn(Arc<C>, crate::dependency::ComputedDeps, ArcAny) -> BoxFuture<'static, Result<V, CoreError>> + Send + Sync>>,
    dispose: Option<Arc<dyn Fn(Arc<V>, Arc<C>, crate::dependency::ComputedDeps, ArcAny) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>>,
    config_schema: Option<Arc<dyn Validate<ArcAny>>>,
    config: Option<C>,
    _marker: PhantomData<fn() -> V>,
}

impl<C, V> ResourceBuilder<C, V>
where
    C: Any + Send + Sync + Default,
    V: Any + Send + Sync,
{
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
            tags: Vec::new(),
            dependencies: DependencyMapSource::default(),
            middleware: Vec::new(),
            overrides: Vec::new(),
            register: None,
            context_fn: None,
            init: None,
            dispose: None,
            config_schema: None,
            config: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<TagUsage>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn dependencies(mut self, map: DependencyMap) -> Self {
        self.dependencies = DependencyMapSource::Static(map);
        self
    }

    #[must_use]
    pub fn dependencies_of_config<F>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> DependencyMap + Send + Sync + 'static,
    {
        self.dependencies = DependencyMapSource::OfConfig(Arc::new(move |config: &ArcAny| {
            config
                .downcast_ref::<C>()
                .map_or_else(DependencyMap::new, &f)
        }));
        self
    }

    #[must_use]
    pub fn middleware(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.middleware.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn overrides(mut self, overrides: impl IntoIterator<Item = Arc<ResourceDef>>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    #[must_use]
    pub fn register<F>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> Vec<AnyDefinition> + Send + Sync + 'static,
    {
        self.register = Some(Arc::new(move |config: &ArcAny| {
            config.downcast_ref::<C>().map_or_else(Vec::new, &f)
        }));
        self
    }

    #[must_use]
    pub fn context<F, Ctx>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> Ctx + Send + Sync + 'static,
        Ctx: Any + Send + Sync,
    {
        self.context_fn = Some(Arc::new(move |config: &ArcAny| {
            config
                .downcast_ref::<C>()
                .map_or_else(|| Arc::new(()) as ArcAny, |c| Arc::new(f(c)) as ArcAny)
        }));
        self
    }

    #[must_use]
    pub fn init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<C>, crate::dependency::ComputedDeps, ArcAny) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<V, CoreError>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |config, deps, ctx| Box::pin(f(config, deps, ctx))));
        self
    }

    #[must_use]
    pub fn dispose<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<V>, Arc<C>, crate::dependency::ComputedDeps, ArcAny) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        self.dispose = Some(Arc::new(move |value, config, deps, ctx| {
            Box::pin(f(value, config, deps, ctx))
        }));
        self
    }

    #[must_use]
    pub fn config_schema(mut self, schema: Arc<dyn Validate<ArcAny>>) -> Self {
        self.config_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn config(mut self, config: C) -> Self {
        self.config = Some(config);
        self
    }

    /// Finalize this builder into an immutable [`Resource<C, V>`] handle.
    ///
    /// # Errors
    /// Returns [`CoreError::BuilderIncomplete`] only if a declared
    /// `configSchema` rejects the (default or supplied) config value; a
    /// missing `init` is not an error, the value is simply `()`.
    pub fn build(self) -> Result<Resource<C, V>, CoreError> {
        let config = self.config.unwrap_or_default();
        let config: ArcAny = Arc::new(config);
        if let Some(schema) = &self.config_schema {
            schema.parse(Arc::clone(&config))?;
        }

        let init = self.init.map(|f| {
            let f = Arc::clone(&f);
            Arc::new(move |config: ArcAny, deps, ctx| {
                let f = Arc::clone(&f);
                let fut: BoxFuture<'static, Result<ArcAny, CoreError>> = Box::pin(async move {
                    let typed = downcast_any::<C>(config, "resource config")?;
                    let value = f(typed, deps, ctx).await?;
                    Ok(Arc::new(value) as ArcAny)
                });
                fut
            }) as InitFn
        });

        let dispose = self.dispose.map(|f| {
            Arc::new(move |value: ArcAny, config: ArcAny, deps, ctx| {
                let f = Arc::clone(&f);
                let fut: BoxFuture<'static, Result<(), CoreError>> = Box::pin(async move {
                    let typed_value = downcast_any::<V>(value, "resource value")?;
                    let typed_config = downcast_any::<C>(config, "resource config")?;
                    f(typed_value, typed_config, deps, ctx).await
                });
                fut
            }) as DisposeFn
        });

        Ok(Resource {
            def: Arc::new(ResourceDef {
                id: self.id,
                meta: self.meta,
                tags: self.tags,
                dependencies: self.dependencies,
                middleware: self.middleware,
                overrides: self.overrides,
                register: self.register,
                context_fn: self.context_fn,
                init,
                dispose,
                config_schema: self.config_schema,
                config,
            }),
            _marker: PhantomData,
        })
    }
}

/// The typed handle user code keeps around: to reference this resource as a
/// dependency, list it as an override target, or read its id.
pub struct Resource<C, V> {
    def: Arc<ResourceDef>,
    _marker: PhantomData<fn() -> (C, V)>,
}

impl<C, V> Clone for Resource<C, V> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            _marker: PhantomData,
        }
    }
}

impl<C, V: Any + Send + Sync> Resource<C, V> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.def.id
    }

    #[must_use]
    pub fn def(&self) -> Arc<ResourceDef> {
        Arc::clone(&self.def)
    }

    #[must_use]
    pub fn as_definition(&self) -> AnyDefinition {
        AnyDefinition::Resource(Arc::clone(&self.def))
    }

    #[must_use]
    pub fn dep(&self) -> DependencyRef {
        DependencyRef::Resource {
            id: self.def.id.clone(),
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

impl<C: Any + Send + Sync, V: Any + Send + Sync> Resource<C, V> {
    /// Bind a runtime config value, overriding whatever the builder set —
    /// the mechanism the orchestrator uses to pass `run(root, config)`'s
    /// `config` into the root resource.
    #[must_use]
    pub fn bind_config(&self, config: C) -> Resource<C, V> {
        Resource {
            def: self.def.with_runtime_config(Arc::new(config)),
            _marker: PhantomData,
        }
    }
}
