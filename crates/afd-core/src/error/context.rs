//! Context wrapping for [`AfdError`] results.

use super::types::AfdError;

/// Prefix an error with what the caller was doing when it happened.
///
/// The wrapped error keeps its code, its recoverability, and its transport
/// kind; only the message gains the prefix.
///
/// # Example
///
/// ```rust
/// use afd_core::error::{AfdError, AfdResultExt};
///
/// fn refresh() -> Result<(), AfdError> {
///     let result: Result<(), AfdError> = Err(AfdError::internal("oops"));
///     result.context("Failed to refresh the command list")?;
///     Ok(())
/// }
/// ```
pub trait AfdResultExt<T> {
    /// Wrap the error, if any, in [`AfdError::WithContext`].
    fn context(self, context: impl Into<String>) -> Result<T, AfdError>;
}

impl<T> AfdResultExt<T> for Result<T, AfdError> {
    fn context(self, context: impl Into<String>) -> Self {
        self.map_err(|source| AfdError::WithContext {
            context: context.into(),
            source: Box::new(source),
        })
    }
}
