//! Caller-side readiness polling before the first chat request.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::PilotConfig;
use crate::error::PilotError;
use crate::provider::ChatProvider;

/// How long and how often to probe `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub deadline: Duration,
    pub ping_timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::from_config(&PilotConfig::default())
    }
}

impl ReadinessPolicy {
    pub fn from_config(config: &PilotConfig) -> Self {
        Self {
            poll_interval: config.ready_poll_interval(),
            deadline: config.ready_deadline(),
            ping_timeout: config.ping_timeout(),
        }
    }
}

/// Poll until the service answers, returning how long it took.
pub async fn wait_until_ready(
    provider: &dyn ChatProvider,
    policy: &ReadinessPolicy,
) -> Result<Duration, PilotError> {
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if provider.ping(policy.ping_timeout).await {
            let elapsed = started.elapsed();
            debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "service ready");
            return Ok(elapsed);
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.deadline {
            return Err(PilotError::ServiceUnavailable(format!(
                "not ready after {}ms ({attempts} probes)",
                elapsed.as_millis()
            )));
        }
        tokio::time::sleep(policy.poll_interval.min(policy.deadline - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatRequest;
    use crate::types::{ChatCompletion, StreamEvent};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Becomes ready on the `ready_on`-th probe.
    struct Warming {
        ready_on: u32,
        probes: AtomicU32,
    }

    #[async_trait]
    impl ChatProvider for Warming {
        async fn ping(&self, _timeout: Duration) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst) + 1 >= self.ready_on
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion, PilotError> {
            Ok(ChatCompletion::default())
        }

        fn complete_stream(&self, _request: &ChatRequest) -> BoxStream<'static, StreamEvent> {
            Box::pin(futures::stream::iter(vec![StreamEvent::Done]))
        }
    }

    fn policy() -> ReadinessPolicy {
        ReadinessPolicy {
            poll_interval: Duration::from_millis(400),
            deadline: Duration::from_secs(60),
            ping_timeout: Duration::from_millis(800),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_service_answers() {
        let provider = Warming {
            ready_on: 3,
            probes: AtomicU32::new(0),
        };
        let elapsed = wait_until_ready(&provider, &policy()).await.unwrap();
        assert_eq!(provider.probes.load(Ordering::SeqCst), 3);
        assert!(elapsed >= Duration::from_millis(800) && elapsed < Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_deadline() {
        let provider = Warming {
            ready_on: u32::MAX,
            probes: AtomicU32::new(0),
        };
        let err = wait_until_ready(&provider, &policy()).await.unwrap_err();
        assert!(matches!(err, PilotError::ServiceUnavailable(_)));
        // One probe at t=0 and one per interval up to 60s.
        let probes = provider.probes.load(Ordering::SeqCst);
        assert!((150..=152).contains(&probes), "probes = {probes}");
    }
}
