//! Retry policy and request pacing
//!
//! This module handles:
//! - The bounded attempt counter for each page
//! - Randomized delay windows for retry backoff and inter-page pacing
//! - Cancellation-aware sleeping through an injectable `Sleeper`
//!
//! Keeping the sleep behind a trait lets the controller be driven in tests
//! without real delays.

use crate::config::{CrawlerConfig, DelayRangeConfig};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounded number of fetch attempts per page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts (at least one)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns true if another attempt may follow `attempts_made` failures
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// A window from which randomized delays are drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    /// Creates a range; bounds given in the wrong order are swapped
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A range that always yields zero
    pub fn zero() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn contains(&self, delay: Duration) -> bool {
        delay >= self.min && delay <= self.max
    }

    /// Draws a uniformly distributed delay from the range
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let mut rng = rand::thread_rng();
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(self.min, self.max)
    }
}

impl From<DelayRangeConfig> for DelayRange {
    fn from(config: DelayRangeConfig) -> Self {
        Self::new(config.min(), config.max())
    }
}

/// Something that can wait for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Which of the two delays is being taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// Between attempts on the same page
    RetryBackoff,

    /// Between consecutive pages
    InterPage,
}

/// How a pause ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Elapsed,
    Cancelled,
}

/// Draws delays from the configured ranges and sleeps them out
#[derive(Clone)]
pub struct Pacer {
    sleeper: Arc<dyn Sleeper>,
    retry_backoff: DelayRange,
    inter_page: DelayRange,
}

impl Pacer {
    pub fn new(sleeper: Arc<dyn Sleeper>, retry_backoff: DelayRange, inter_page: DelayRange) -> Self {
        Self {
            sleeper,
            retry_backoff,
            inter_page,
        }
    }

    /// Builds a pacer from the crawler configuration
    pub fn from_config(config: &CrawlerConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self::new(
            sleeper,
            config.retry_backoff.into(),
            config.inter_page_delay.into(),
        )
    }

    pub fn range(&self, kind: DelayKind) -> DelayRange {
        match kind {
            DelayKind::RetryBackoff => self.retry_backoff,
            DelayKind::InterPage => self.inter_page,
        }
    }

    /// Draws a delay of the given kind
    pub fn next_delay(&self, kind: DelayKind) -> Duration {
        self.range(kind).sample()
    }

    /// Sleeps for `delay` unless cancellation arrives first
    ///
    /// A cancellation observed before, during or right after the sleep is
    /// reported as `PauseOutcome::Cancelled`.
    pub async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> PauseOutcome {
        if cancel.is_cancelled() {
            return PauseOutcome::Cancelled;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PauseOutcome::Cancelled,
            _ = self.sleeper.sleep(delay) => {}
        }

        if cancel.is_cancelled() {
            PauseOutcome::Cancelled
        } else {
            PauseOutcome::Elapsed
        }
    }
}
