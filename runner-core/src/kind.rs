//! Kind tags and the structural predicates (`is_resource`, `is_task`, …)
//! over a registered definition's kind.

use std::fmt;

/// The kind of a registrable definition. Every [`crate::definition::AnyDefinition`]
/// carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Resource,
    Task,
    TaskMiddleware,
    ResourceMiddleware,
    Hook,
    Event,
    Tag,
    Error,
    AsyncContext,
}

impl Kind {
    /// All kinds, in the fixed order the Dependency Processor walks them:
    /// resources, middlewares (task then resource), tasks, hooks. `Event`,
    /// `Tag`, `Error` and `AsyncContext` are not themselves walked for
    /// dependency extraction (they carry no `dependencies` of their own)
    /// and are listed last for completeness.
    #[must_use]
    pub const fn processing_order() -> [Kind; 9] {
        [
            Kind::Resource,
            Kind::TaskMiddleware,
            Kind::ResourceMiddleware,
            Kind::Task,
            Kind::Hook,
            Kind::Event,
            Kind::Tag,
            Kind::Error,
            Kind::AsyncContext,
        ]
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Kind::Resource => "resource",
            Kind::Task => "task",
            Kind::TaskMiddleware => "taskMiddleware",
            Kind::ResourceMiddleware => "resourceMiddleware",
            Kind::Hook => "hook",
            Kind::Event => "event",
            Kind::Tag => "tag",
            Kind::Error => "error",
            Kind::AsyncContext => "asyncContext",
        }
    }

    #[must_use]
    pub const fn is_resource(self) -> bool {
        matches!(self, Kind::Resource)
    }

    #[must_use]
    pub const fn is_task(self) -> bool {
        matches!(self, Kind::Task)
    }

    #[must_use]
    pub const fn is_hook(self) -> bool {
        matches!(self, Kind::Hook)
    }

    #[must_use]
    pub const fn is_middleware(self) -> bool {
        matches!(self, Kind::TaskMiddleware | Kind::ResourceMiddleware)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Arbitrary metadata attached to a definition for tooling (`meta(obj)`).
/// Kept as a `serde_json::Value` map since the core never interprets it
/// itself.
pub type Meta = serde_json::Map<String, serde_json::Value>;
