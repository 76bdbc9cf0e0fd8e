use crate::ingest::provider::SourceAdapter;
use crate::ingest::types::{GroupResult, SourceError};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Fixed attempt budget with a fixed pause between attempts (no exponential growth).
///
/// Each attempt runs under its own timeout; an attempt that times out is abandoned and
/// counted against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            attempt_timeout,
        }
    }

    pub async fn run<T, F, Fut>(&self, source: &str, mut op: F) -> GroupResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GroupResult<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let res = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(res) => res,
                Err(_) => Err(SourceError::unavailable(format!(
                    "attempt timed out after {:?}",
                    self.attempt_timeout
                ))),
            };

            match res {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        source,
                        attempt,
                        attempts,
                        delay = ?self.delay,
                        error = %err,
                        "source fetch failed; retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

/// Wraps an adapter whose backing service is flaky.
#[derive(Debug)]
pub struct Retrying<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A> Retrying<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl<A> SourceAdapter for Retrying<A>
where
    A: SourceAdapter,
{
    type Output = A::Output;

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }

    async fn fetch(&self) -> GroupResult<Self::Output> {
        self.policy
            .run(self.inner.source_name(), || self.inner.fetch())
            .await
    }
}
