//! Bounded retry policies.
//!
//! Every component that retries (mailbox reconnect, attachment storage, queue
//! publishing, whole invocations) describes its behavior with a [`RetryPolicy`]
//! and a classifier that maps its own error type onto a [`Fault`]. The policy
//! never inspects error types itself.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Safe to retry (timeout, temporary disconnect, broker busy).
    Transient,
    /// Retrying cannot help; abandon the unit of work.
    Fatal,
}

/// Delay applied between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// Doubling delay starting at `initial`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Builds a backoff from millisecond settings. A zero initial delay means no backoff.
    pub fn from_millis(initial_ms: u64, max_ms: u64) -> Self {
        if initial_ms == 0 {
            return Backoff::None;
        }
        let initial = Duration::from_millis(initial_ms);
        let max = Duration::from_millis(max_ms.max(initial_ms));
        if initial == max {
            Backoff::Fixed(initial)
        } else {
            Backoff::Exponential { initial, max }
        }
    }

    /// Delay to wait after `failed_attempts` consecutive failures (1-based).
    pub fn delay(&self, failed_attempts: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = failed_attempts.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(max, |delay| delay.min(max))
            }
        }
    }
}

/// Terminal failure of a retried operation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier declared the error fatal; no further attempts were made.
    Fatal { attempts: u32, error: E },
    /// Every allowed attempt failed with a transient error.
    Exhausted { attempts: u32, error: E },
}

impl<E> RetryError<E> {
    /// Number of attempts that were made, including the last one.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The error returned by the last attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal { error, .. } | RetryError::Exhausted { error, .. } => error,
        }
    }
}

/// Maximum attempts plus the delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` attempts in total (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::None,
        }
    }

    /// A policy allowing `retries` retries after the first attempt.
    pub fn with_retries(retries: u32) -> Self {
        Self::new(retries.saturating_add(1))
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self::new(1)
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after attempt number `attempt` failed with `fault`.
    pub fn should_retry(&self, attempt: u32, fault: Fault) -> bool {
        fault == Fault::Transient && attempt < self.max_attempts
    }

    /// Sleeps for the backoff that follows failed attempt number `attempt`.
    pub async fn pause(&self, attempt: u32) {
        let delay = self.backoff.delay(attempt);
        if !delay.is_zero() {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    /// Runs `op` until it succeeds, fails fatally, or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, C>(&self, mut op: F, classify: C) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> Fault,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match classify(&error) {
                Fault::Fatal => {
                    return Err(RetryError::Fatal {
                        attempts: attempt,
                        error,
                    })
                }
                Fault::Transient if !self.should_retry(attempt, Fault::Transient) => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        error,
                    })
                }
                Fault::Transient => self.pause(attempt).await,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}
