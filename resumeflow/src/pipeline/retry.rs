//! Retry utilities with configurable backoff and jitter strategies.
//!
//! Stages are retried only on transient failures, with exponential backoff
//! and jitter by default. Cancellation is observed before every attempt and
//! wakes a pending backoff sleep immediately.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::cancellation::CancellationToken;
use crate::context::{JobContext, PipelineRun};
use crate::core::StageOutput;
use crate::stages::{Stage, StageError};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
    Linear,
    /// delay = base
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the maximum attempts. Values below one are treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// State tracking for one stage's attempts.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempts: u32,
    previous_delay_ms: Option<u64>,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an attempt is starting.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Returns true if no attempts remain.
    #[must_use]
    pub fn is_exhausted(&self, config: &RetryConfig) -> bool {
        self.attempts >= config.max_attempts.max(1)
    }

    /// Calculates the delay before the next attempt.
    #[must_use]
    pub fn calculate_delay(&mut self, config: &RetryConfig) -> Duration {
        let base = config.base_delay_ms;
        let max = config.max_delay_ms;
        let retry = self.attempts.saturating_sub(1);

        let delay = match config.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(retry)).min(max),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry) + 1).min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let prev = self.previous_delay_ms.unwrap_or(base);
                let upper = prev.saturating_mul(3).min(max);
                let next = if upper <= base {
                    base.min(max)
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                };
                self.previous_delay_ms = Some(next);
                next
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts, give up.
    GiveUp,
    /// The error or the stage is not retryable.
    NotRetryable,
}

/// Decides whether a failed attempt should be retried.
#[must_use]
pub fn should_retry(
    state: &mut RetryState,
    config: &RetryConfig,
    error: &StageError,
    idempotent: bool,
) -> RetryDecision {
    if !error.is_transient() || !idempotent {
        return RetryDecision::NotRetryable;
    }
    if state.is_exhausted(config) {
        return RetryDecision::GiveUp;
    }
    RetryDecision::Retry(state.calculate_delay(config))
}

/// A retry about to happen, reported to the caller of [`run_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryNotice<'a> {
    /// The attempt that failed.
    pub attempt: u32,
    /// Why it failed.
    pub error: &'a StageError,
    /// Backoff before the next attempt.
    pub delay: Duration,
}

/// Result of running a stage under its retry policy.
#[derive(Debug)]
pub struct StageAttempts {
    /// The stage output or the error that ended the attempts.
    pub result: Result<StageOutput, StageError>,
    /// Attempts made.
    pub attempts: u32,
    /// Wall time across all attempts and backoffs.
    pub duration_ms: u64,
}

/// Runs `stage` up to `config.max_attempts` times.
///
/// Only transient failures are retried, and only for idempotent stages.
/// `on_retry` is called before each backoff sleep.
pub async fn run_with_retry<F>(
    stage: &dyn Stage,
    ctx: &JobContext,
    run: &PipelineRun,
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut on_retry: F,
) -> StageAttempts
where
    F: FnMut(RetryNotice<'_>) + Send,
{
    let started = Instant::now();
    let mut state = RetryState::new();
    let elapsed = |started: Instant| u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let result = loop {
        if cancel.is_cancelled() {
            break Err(cancelled_error(stage, cancel));
        }

        state.begin_attempt();
        let error = match stage.run(ctx, run).await {
            Ok(output) if output.stage_id() == stage.id() => break Ok(output),
            Ok(output) => StageError::permanent(
                stage.id(),
                format!("stage produced output for '{}'", output.stage_id()),
            ),
            Err(e) => e,
        };

        match should_retry(&mut state, config, &error, stage.idempotent()) {
            RetryDecision::Retry(delay) => {
                tracing::debug!(
                    stage = %stage.id(),
                    attempt = state.attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Retrying after transient error"
                );
                on_retry(RetryNotice {
                    attempt: state.attempts,
                    error: &error,
                    delay,
                });
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => {
                        break Err(cancelled_error(stage, cancel));
                    }
                }
            }
            RetryDecision::GiveUp | RetryDecision::NotRetryable => break Err(error),
        }
    };

    StageAttempts {
        result,
        attempts: state.attempts,
        duration_ms: elapsed(started),
    }
}

fn cancelled_error(stage: &dyn Stage, cancel: &CancellationToken) -> StageError {
    StageError::cancelled(
        stage.id(),
        cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
    )
}
