//! Whole-invocation retries, as done by the scheduler wrapping each run.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info};

use crate::cancel::CancelSignal;
use crate::retry::RetryPolicy;

use super::report::RunReport;

/// Random delay range between two invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Jitter {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = (self.max.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(10))
    }
}

/// Runs `invocation` until it reports success, is cancelled, or `policy`'s
/// attempt budget is spent. Returns the last report.
///
/// `invocation` receives the 1-based attempt number.
pub async fn invoke_with_retries<F, Fut>(
    policy: RetryPolicy,
    jitter: Jitter,
    cancel: &CancelSignal,
    mut invocation: F,
) -> RunReport
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RunReport>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let report = invocation(attempt).await;
        if report.success || report.cancelled || cancel.is_cancelled() {
            return report;
        }

        let detail = report
            .notices
            .iter()
            .map(|notice| format!("{}: {}", notice.message, notice.detail))
            .collect::<Vec<_>>()
            .join("; ");
        error!(
            attempt,
            max_attempts = policy.max_attempts(),
            notices = %detail,
            "Mail ingestion invocation failed"
        );

        if attempt >= policy.max_attempts() {
            return report;
        }

        let delay = jitter.sample();
        info!(delay_ms = delay.as_millis() as u64, "Retrying invocation");
        if cancel.guard(tokio::time::sleep(delay)).await.is_none() {
            return report;
        }
    }
}
