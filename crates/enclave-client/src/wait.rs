//! Readiness polling for enclave services

use crate::{
    error::{Error, Result},
    orchestrator::Orchestrator,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default delay between readiness checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Cooperative cancellation flag shared between a waiter and its caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Options for [`wait_until_ready`]
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Delay between checks
    pub interval: Duration,
    /// Optional external cancellation
    pub cancel: Option<CancelToken>,
}

impl WaitOptions {
    /// Wait up to `timeout`, polling at the default interval
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
        }
    }

    /// Poll at a different interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop waiting when the token is cancelled
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Poll the orchestrator until every named service reports running
///
/// Listing failures are returned as-is; there is no retry beyond the poll
/// loop itself.
pub async fn wait_until_ready<O>(
    orchestrator: &O,
    enclave_id: &str,
    names: &[String],
    options: WaitOptions,
) -> Result<()>
where
    O: Orchestrator + ?Sized,
{
    let started = Instant::now();
    info!(
        "Waiting for {} services in enclave '{}'",
        names.len(),
        enclave_id
    );

    loop {
        if options.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let services = orchestrator.get_services(enclave_id).await?;
        let pending: Vec<String> = names
            .iter()
            .filter(|name| !services.get(*name).is_some_and(|s| s.is_running()))
            .cloned()
            .collect();

        if pending.is_empty() {
            info!(
                "All services in enclave '{}' ready after {:?}",
                enclave_id,
                started.elapsed()
            );
            return Ok(());
        }

        let waited = started.elapsed();
        if waited >= options.timeout {
            return Err(Error::Timeout { waited, pending });
        }

        debug!(
            "{} services not ready yet: {}",
            pending.len(),
            pending.join(", ")
        );
        let remaining = options.timeout - waited;
        async_io::Timer::after(options.interval.min(remaining)).await;
    }
}
