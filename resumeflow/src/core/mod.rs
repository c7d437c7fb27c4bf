//! Core domain model types for resumeflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Job status enum and its transition graph
//! - The job record, progress, result and error types
//! - Typed stage outputs
//! - Artifact references

mod artifact;
mod job;
mod output;
mod status;

pub(crate) use artifact::sha256_hex;
pub use artifact::{content_type_for, ArtifactRef};
pub use job::{Job, JobError, JobId, JobResult, JobSummary, JobUpdate, Progress, UpdateError};
pub use output::{
    CompanyResearch, FinalReport, JobRequirements, ResumeAnalysis, ResumeOptimization,
    StageOutput,
};
pub use status::JobStatus;
