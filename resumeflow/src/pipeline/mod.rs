//! Pipeline building and stage execution.
//!
//! This module provides:
//! - The ordered [`AgentPipeline`] and its validating [`PipelineBuilder`]
//! - Per-stage retry policies and [`run_with_retry`]

mod builder;
mod retry;
mod spec;

pub use builder::PipelineBuilder;
pub use retry::{
    run_with_retry, should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision,
    RetryNotice, RetryState, StageAttempts,
};
pub use spec::{AgentPipeline, StageSpec};
