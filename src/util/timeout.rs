//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::PilotError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, PilotError>>,
) -> Result<T, PilotError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(PilotError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out() {
        let err = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, PilotError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PilotError::Timeout(50)));
    }
}
