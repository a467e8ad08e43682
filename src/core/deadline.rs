//! Per-request deadline enforcement
//!
//! Every service entry point runs its body through [`with_deadline`]. When the
//! budget elapses the inner future is dropped, which cancels whatever store or
//! storage call was in flight.

use std::future::Future;
use std::time::Duration;

use crate::core::error::{AppError, Result};

/// Run `fut` under `budget`, mapping expiry to [`AppError::Timeout`]
pub async fn with_deadline<T, F>(budget: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "{} exceeded its deadline of {}ms",
                operation,
                budget.as_millis()
            );
            Err(AppError::Timeout(format!("{} timed out", operation)))
        }
    }
}
