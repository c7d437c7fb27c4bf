//! Cooperative cancellation of running jobs.

mod registry;
mod token;

pub use registry::CancellationRegistry;
pub use token::{CancelCallback, CancellationToken};
