//! Substitute a default result for a failed provider call.

use std::future::Future;

use crate::ports::{ErrorReporter, PortError};

/// Await `operation`, returning its value on success.
///
/// On failure the error is handed to `reporter` under `context` and `default` is
/// returned instead, so the caller never sees the error.
pub async fn with_fallback<T, F>(
    context: &str,
    operation: F,
    default: T,
    reporter: &dyn ErrorReporter,
) -> T
where
    F: Future<Output = Result<T, PortError>>,
{
    match operation.await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(context, "falling back to default");
            reporter.report(context, &err);
            default
        }
    }
}
