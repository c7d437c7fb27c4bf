//! Testing utilities for resumeflow.
//!
//! This module provides:
//! - Scripted model providers, page fetchers and stages
//! - Sample requests and canned agent replies
//! - Job assertions and polling helpers

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_job_cancelled, assert_job_completed, assert_job_failed_at, wait_for_terminal,
};
pub use fixtures::{
    canned_reply, sample_context, sample_output, sample_request, sample_summary,
    COMPANY_RESEARCH_REPLY, JOB_REQUIREMENTS_REPLY, REPORT_REPLY, RESUME_ANALYSIS_REPLY,
    RESUME_OPTIMIZATION_REPLY, SAMPLE_RESUME, SAMPLE_TARGET,
};
pub use mocks::{
    FailingStage, FlakyStage, ScriptedProvider, ScriptedStage, SlowStage, StaticPageFetcher,
};
