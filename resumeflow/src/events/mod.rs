//! Job lifecycle events.
//!
//! The orchestrator reports every job and stage transition to an
//! [`EventSink`]. Payloads are JSON objects that always carry `job_id`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A worker picked the job up.
pub const JOB_STARTED: &str = "job.started";
/// The job finished with a result.
pub const JOB_COMPLETED: &str = "job.completed";
/// The job failed.
pub const JOB_FAILED: &str = "job.failed";
/// The job was cancelled.
pub const JOB_CANCELLED: &str = "job.cancelled";
/// A stage began its first attempt.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage failed transiently and will be retried.
pub const STAGE_RETRYING: &str = "stage.retrying";
/// A stage produced its output.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage gave up.
pub const STAGE_FAILED: &str = "stage.failed";
