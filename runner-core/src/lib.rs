//! runner-core: the runtime of a modular dependency-injection application
//! framework — resources, tasks, events, hooks, middlewares, and tags wired
//! together by a store, a dependency processor, a task runner, an event
//! manager, a resource scheduler, and a run orchestrator.
//!
//! A registry of type-erased definitions, a deterministic processing order,
//! `Arc`-shared state behind `DashMap` and `ArcSwap`, and a single public
//! `run()` entry point. See `DESIGN.md` for the full grounding ledger.

pub mod async_context;
pub mod config;
pub mod definition;
pub mod dependency;
pub mod errors;
pub mod event;
pub mod event_manager;
pub mod initializer;
pub mod kind;
pub mod middleware_manager;
pub mod orchestrator;
pub mod processor;
pub mod scheduler;
pub mod store;
pub mod task_runner;

pub use config::{DebugConfig, LogOptions, Mode, RunOptions};
pub use definition::error_helper::{ErrorHelper, ErrorHelperBuilder, TypedError};
pub use definition::hook::{HookBuilder, HookTarget};
pub use definition::middleware::{
    EverywherePredicate, ResourceMiddlewareBuilder, ResourceMiddlewareDef, TaskMiddlewareBuilder,
    TaskMiddlewareDef,
};
pub use definition::resource::{Resource, ResourceBuilder, ResourceDef};
pub use definition::tag::{Tag, TagAccessor, TagBuilder, TagUsage};
pub use definition::task::{Task, TaskBuilder, TaskDef};
pub use dependency::extractor::DependencyExtractor;
pub use dependency::{ArcAny, ComputedDeps, DependencyMap, DependencyRef, DependencyValue};
pub use errors::CoreError;
pub use event::{Emission, EventBuilder, EventDef, EventEmitter};
pub use event_manager::EventManager;
pub use kind::Kind;
pub use middleware_manager::MiddlewareManager;
pub use orchestrator::{run, RunResult};
pub use store::Store;
pub use task_runner::{TaskHandle, TaskRunner};
