//! Typed Error Helper: `id`, `format(data)`, optional `httpCode`, `is(e)`.
//! The core raises these *by kind*, never by class identity —
//! [`TypedError`] carries the declaring helper's id so
//! [`CoreError::kind`](crate::errors::CoreError::kind) can return it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::dependency::ArcAny;
use crate::errors::CoreError;
use crate::kind::Meta;

/// A business error raised through an [`ErrorHelper`]. Implements
/// `std::error::Error` so `CoreError::Business` can wrap it transparently.
#[derive(Debug, Clone)]
pub struct TypedError {
    pub(crate) helper_id: String,
    pub(crate) message: String,
    pub(crate) data: ArcAny,
}

impl TypedError {
    #[must_use]
    pub fn helper_id(&self) -> &str {
        &self.helper_id
    }

    #[must_use]
    pub fn data_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Display for TypedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TypedError {}

/// A registered error-helper definition.
pub struct ErrorHelperDef {
    pub(crate) id: String,
    pub(crate) meta: Meta,
    pub(crate) format: Arc<dyn Fn(&ArcAny) -> String + Send + Sync>,
    pub(crate) http_code: Option<u16>,
}

impl ErrorHelperDef {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Builder for [`ErrorHelperDef`].
pub struct ErrorHelperBuilder {
    id: String,
    meta: Meta,
    format: Arc<dyn Fn(&ArcAny) -> String + Send + Sync>,
    http_code: Option<u16>,
}

impl ErrorHelperBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::new(),
            format: Arc::new(|_| "error".to_string()),
            http_code: None,
        }
    }

    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn format<F>(mut self, f: F) -> Self
    where
        F: Fn(&ArcAny) -> String + Send + Sync + 'static,
    {
        self.format = Arc::new(f);
        self
    }

    #[must_use]
    pub fn http_code(mut self, code: u16) -> Self {
        self.http_code = Some(code);
        self
    }

    #[must_use]
    pub fn build(self) -> ErrorHelperDef {
        ErrorHelperDef {
            id: self.id,
            meta: self.meta,
            format: self.format,
            http_code: self.http_code,
        }
    }
}

/// The injectable runtime handle for an error-helper dependency.
#[derive(Clone)]
pub struct ErrorHelper {
    def: Arc<ErrorHelperDef>,
}

impl ErrorHelper {
    #[must_use]
    pub fn from_def(def: Arc<ErrorHelperDef>) -> Self {
        Self { def }
    }

    #[must_use]
    pub fn helper_id(&self) -> &str {
        &self.def.id
    }

    #[must_use]
    pub fn http_code(&self) -> Option<u16> {
        self.def.http_code
    }

    /// Raise this helper's error kind with `data` as payload, using its
    /// `format` function to produce the message.
    pub fn error<T: Any + Send + Sync>(&self, data: T) -> CoreError {
        let data: ArcAny = Arc::new(data);
        let message = (self.def.format)(&data);
        CoreError::Business(TypedError {
            helper_id: self.def.id.clone(),
            message,
            data,
        })
    }

    /// Whether `e` is a business error raised by this helper.
    #[must_use]
    pub fn is(&self, e: &CoreError) -> bool {
        matches!(e, CoreError::Business(typed) if typed.helper_id == self.def.id)
    }
}
