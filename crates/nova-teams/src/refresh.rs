//! Background job that keeps a [`TeamCache`] current.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use nova_client::CloudClient;

use crate::cache::{RefreshOutcome, TeamCache};

/// Delay until the next refresh.
///
/// After a success the job waits the full interval. After a failure it
/// retries sooner, starting at `retry_delay` and doubling per consecutive
/// failure, never waiting longer than the interval.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    interval: Duration,
    retry_delay: Duration,
    current: Option<Duration>,
}

impl RetryBackoff {
    pub fn new(interval: Duration, retry_delay: Duration) -> Self {
        Self {
            interval,
            retry_delay: retry_delay.min(interval),
            current: None,
        }
    }

    /// Record a cycle's result and return how long to wait.
    pub fn next_delay(&mut self, succeeded: bool) -> Duration {
        if succeeded {
            self.current = None;
            return self.interval;
        }
        let delay = match self.current {
            None => self.retry_delay,
            Some(prev) => (prev * 2).min(self.interval),
        };
        self.current = Some(delay);
        delay
    }

    pub fn is_retrying(&self) -> bool {
        self.current.is_some()
    }
}

/// Periodically refreshes a [`TeamCache`] from the identity service.
pub struct TeamRefresher {
    cache: TeamCache,
    client: Arc<dyn CloudClient>,
    interval: Duration,
    retry_delay: Duration,
}

impl TeamRefresher {
    pub fn new(
        cache: TeamCache,
        client: Arc<dyn CloudClient>,
        interval: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            cache,
            client,
            interval,
            retry_delay,
        }
    }

    /// Run one cycle now. Safe to call while [`TeamRefresher::run`] is
    /// active; overlapping cycles coalesce.
    pub async fn refresh_now(&self) -> bool {
        match self.cache.refresh(self.client.as_ref()).await {
            Ok(RefreshOutcome::Refreshed { .. }) | Ok(RefreshOutcome::Skipped) => true,
            // Already logged by the cache.
            Err(_) => false,
        }
    }

    /// Refresh immediately, then on schedule until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            suffix = %self.cache.suffix(),
            "team refresher started"
        );
        let mut backoff = RetryBackoff::new(self.interval, self.retry_delay);

        loop {
            let ok = tokio::select! {
                ok = self.refresh_now() => ok,
                _ = shutdown.changed() => break,
            };
            let delay = backoff.next_delay(ok);
            if !ok {
                debug!(retry_in_ms = delay.as_millis() as u64, "team refresh failed, retrying");
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("team refresher shutting down");
    }
}
