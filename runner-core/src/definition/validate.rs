//! Opaque "validate" objects for `inputSchema`/`resultSchema`/`configSchema`:
//! the core stays schema-library agnostic, exposing only a `parse` contract
//! callers can back with whatever validation crate they like.

use crate::errors::CoreError;

/// A schema-like validator: takes a value, returns it (possibly coerced) or
/// rejects it.
///
/// # Errors
/// Implementors return [`CoreError::ValidationFailed`] on rejection.
pub trait Validate<T>: Send + Sync {
    fn parse(&self, value: T) -> Result<T, CoreError>;
}

/// Adapts a plain closure into a [`Validate`] implementation.
pub struct FnValidate<F> {
    f: F,
}

impl<F> FnValidate<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Validate<T> for FnValidate<F>
where
    F: Fn(T) -> Result<T, CoreError> + Send + Sync,
{
    fn parse(&self, value: T) -> Result<T, CoreError> {
        (self.f)(value)
    }
}
