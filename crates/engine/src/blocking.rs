//! Store and identity work called from async operations.

use crate::error::{ServiceError, ServiceResult};

/// Run `work` on the blocking pool inside the caller's span.
///
/// Store commits sleep between retries and enrollment hashes passwords, so
/// neither may run on an executor thread.
pub(crate) async fn run<T, F>(work: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "blocking engine task did not complete");
            ServiceError::Internal
        })?
}
