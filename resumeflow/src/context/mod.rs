//! Per-job context handed to stages.
//!
//! This module provides:
//! - [`JobRequest`], the raw submission, and its validated form [`JobContext`]
//! - [`PipelineRun`], the ordered outputs of completed stages

mod request;
mod run;

pub use request::{
    JobContext, JobRequest, MAX_JOB_DESCRIPTION_CHARS, MAX_RESUME_CHARS, MAX_TARGET_CHARS,
};
pub use run::{PipelineRun, StageRecord};
