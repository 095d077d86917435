//! Task: a one-shot callable with dependencies, middleware, and
//! input/result schemas.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::definition::tag::TagUsage;
use crate::definition::validate::Validate;
use crate::definition::{downcast_any, BoxFuture, DependencyMapSource};
use crate::dependency::{ArcAny, ComputedDeps, DependencyMap, DependencyRef};
use crate::errors::CoreError;
use crate::kind::Meta;

type RunFn = Arc<dyn Fn(ArcAny, ComputedDeps) -> BoxFuture<'static, Result<ArcAny, CoreError>> + Send + Sync>;

/// A registered, type-erased task definition.
pub struct TaskDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) tags: Vec<TagUsage>,
    pub(crate) dependencies: DependencyMapSource,
    pub(crate) middleware: Vec<String>,
    pub(crate) throws: Vec<String>,
    pub(crate) input_schema: Option<Arc<dyn Validate<ArcAny>>>,
    pub(crate) result_schema: Option<Arc<dyn Validate<ArcAny>>>,
    pub(crate) run: RunFn,
}

impl TaskDef {
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
    pub fn throws(&self) -> &[String] {
        &self.throws
    }

    /// The task's declared dependency map. Tasks' maps are never a function
    /// of config (tasks have no config) — always static.
    #[must_use]
    pub fn dependencies(&self) -> DependencyMap {
        let empty: ArcAny = Arc::new(());
        self.dependencies.resolve(&empty)
    }

    /// Invoke this task's `run`, after `inputSchema` validation (if any).
    ///
    /// # Errors
    /// Propagates validation failures or whatever `run` returns.
    pub async fn call(&self, input: ArcAny, deps: ComputedDeps) -> Result<ArcAny, CoreError> {
        let input = if let Some(schema) = &self.input_schema {
            schema.parse(input)?
        } else {
            input
        };
        let output = (self.run)(input, deps).await?;
        if let Some(schema) = &self.result_schema {
            schema.parse(output)
        } else {
            Ok(output)
        }
    }
}

/// Builder for [`TaskDef`], generalized over input (`I`) and output (`O`).
pub struct TaskBuilder<I, O> {
    id: String,
    meta: Meta,
    tags: Vec<TagUsage>,
    dependencies: DependencyMapSource,
    middleware: Vec<String>,
    throws: Vec<String>,
    input_schema: Option<Arc<dyn Validate<ArcAny>>>,
    result_schema: Option<Arc<dyn Validate<ArcAny>>>,
    run: Option<Arc<dyn Fn(Arc<I>, ComputedDeps) -> BoxFuture<'static, Result<O, CoreError>> + Send + Sync>>,
    _marker: PhantomData<fn() -> (I, O)>,
}

impl<I, O> TaskBuilder<I, O>
where
    I: Any + Send + Sync,
    O: Any + Send + Sync,
{
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
            tags: Vec::new(),
            dependencies: DependencyMapSource::default(),
            middleware: Vec::new(),
            throws: Vec::new(),
            input_schema: None,
            result_schema: None,
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
    pub fn middleware(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.middleware.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn throws(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.throws.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn input_schema(mut self, schema: Arc<dyn Validate<ArcAny>>) -> Self {
        self.input_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn result_schema(mut self, schema: Arc<dyn Validate<ArcAny>>) -> Self {
        self.result_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn run<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<I>, ComputedDeps) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<O, CoreError>> + Send + 'static,
    {
        self.run = Some(Arc::new(move |input, deps| Box::pin(f(input, deps))));
        self
    }

    /// Finalize this builder.
    ///
    /// # Errors
    /// Returns [`CoreError::BuilderIncomplete`] if no `run` was declared: a
    /// builder missing a required behavior fails fast rather than building
    /// a definition that would panic later.
    pub fn build(self) -> Result<Task<I, O>, CoreError> {
        let Some(run) = self.run else {
            return Err(CoreError::BuilderIncomplete {
                id: self.id,
                missing: "run",
            });
        };

        let erased_run: RunFn = Arc::new(move |input: ArcAny, deps: ComputedDeps| {
            let run = Arc::clone(&run);
            Box::pin(async move {
                let typed = downcast_any::<I>(input, "task input")?;
                let output = run(typed, deps).await?;
                Ok(Arc::new(output) as ArcAny)
            })
        });

        Ok(Task {
            def: Arc::new(TaskDef {
                id: self.id,
                meta: self.meta,
                tags: self.tags,
                dependencies: self.dependencies,
                middleware: self.middleware,
                throws: self.throws,
                input_schema: self.input_schema,
                result_schema: self.result_schema,
                run: erased_run,
            }),
            _marker: PhantomData,
        })
    }
}

/// The typed handle user code keeps around for a registered task.
pub struct Task<I, O> {
    def: Arc<TaskDef>,
    _marker: PhantomData<fn() -> (I, O)>,
}

impl<I, O> Clone for Task<I, O> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            _marker: PhantomData,
        }
    }
}

impl<I, O> Task<I, O> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.def.id
    }

    #[must_use]
    pub fn def(&self) -> Arc<TaskDef> {
        Arc::clone(&self.def)
    }

    #[must_use]
    pub fn dep(&self) -> DependencyRef {
        DependencyRef::Task {
            id: self.def.id.clone(),
            optional: false,
        }
    }

    #[must_use]
    pub fn optional(&self) -> DependencyRef {
        self.dep().optional()
    }
}
