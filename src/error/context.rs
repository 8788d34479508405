//! Context helpers for wrapping foreign errors into `XportError`.

use super::XportError;

/// Attach a context message to any error result.
pub trait ResultExt<T> {
    /// Wrap the error with a context message.
    ///
    /// # Errors
    ///
    /// Returns `XportError::WithContext` when `self` is an error.
    fn context(self, context: impl Into<String>) -> Result<T, XportError>;

    /// Like [`ResultExt::context`] but builds the message lazily.
    ///
    /// # Errors
    ///
    /// Returns `XportError::WithContext` when `self` is an error.
    fn with_context<F, S>(self, f: F) -> Result<T, XportError>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T, XportError> {
        self.map_err(|source| XportError::WithContext {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T, XportError>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| XportError::WithContext {
            context: f().into(),
            source: Box::new(source),
        })
    }
}
