//! # Resumeflow
//!
//! An asynchronous job service that tailors a resume to a target role with
//! a fixed pipeline of five AI agents.
//!
//! Resumeflow provides:
//!
//! - **Job store**: atomic, compare-and-set job records keyed by id
//! - **Agent pipeline**: resume analyzer, job analyzer, company researcher,
//!   resume writer and report generator, run strictly in that order
//! - **Orchestrator**: drives one job through the stages with bounded retries,
//!   cancellation and progress tracking
//! - **Submission service**: validates requests and runs jobs on a bounded
//!   worker pool, returning the job id immediately
//! - **Artifacts**: immutable per-job files (analyses, optimized resume, report)
//! - **Uploads**: resumes stored once by content hash and referenced by id
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resumeflow::prelude::*;
//!
//! let config = ResumeflowConfig::default();
//! let provider = Arc::new(OpenAiCompatibleProvider::new(config.llm.clone())?);
//! let service = JobService::from_config(&config, provider, None, Arc::new(LoggingEventSink::default()))?;
//!
//! let id = service
//!     .submit(JobRequest::new(resume_text, "Senior AI Engineer, Acme Health"))
//!     .await?;
//! let job = service.status(id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agents;
pub mod artifacts;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod service;
pub mod stages;
pub mod store;
pub mod testing;
pub mod uploads;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "fetch")]
    pub use crate::agents::HttpPageFetcher;
    #[cfg(feature = "llm")]
    pub use crate::agents::OpenAiCompatibleProvider;
    pub use crate::agents::{ModelProvider, PageFetcher, ProviderError};
    pub use crate::artifacts::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ArtifactConfig, FetchConfig, LlmConfig, ResumeflowConfig, WorkerConfig};
    pub use crate::context::{JobContext, JobRequest, PipelineRun};
    pub use crate::core::{Job, JobId, JobResult, JobStatus, Progress, StageOutput};
    pub use crate::errors::{ResumeflowError, ValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::pipeline::{AgentPipeline, PipelineBuilder, RetryConfig};
    pub use crate::service::{JobService, ServiceError};
    pub use crate::stages::{Stage, StageError, StageId};
    pub use crate::store::{InMemoryJobStore, JobStore};
    pub use crate::uploads::{ResumeUploads, UploadedResume};
    pub use std::sync::Arc;
}

/// Version of the resumeflow crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
