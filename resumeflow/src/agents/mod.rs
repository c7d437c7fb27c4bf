//! The five resume agents and the provider seams they depend on.
//!
//! Every agent is a [`Stage`](crate::stages::Stage) that renders a prompt,
//! calls a [`ModelProvider`] and parses the reply into its typed output.

mod analyzers;
mod fetch;
#[cfg(all(test, any(feature = "llm", feature = "fetch")))]
mod local_http;
#[cfg(feature = "llm")]
mod openai;
mod parse;
pub mod prompts;
pub(crate) mod provider;
mod writers;

pub use analyzers::{CompanyResearcher, JobAnalyzer, ResumeAnalyzer};
#[cfg(feature = "fetch")]
pub use fetch::{html_to_text, HttpPageFetcher};
pub use fetch::{FetchedPage, PageFetcher};
#[cfg(feature = "llm")]
pub use openai::OpenAiCompatibleProvider;
pub use parse::{extract_json_object, parse_structured};
pub use provider::{Completion, CompletionRequest, ModelProvider, ProviderError, ProviderErrorKind};
pub use writers::{ReportGenerator, ResumeWriter};

use tracing::debug;

use crate::stages::{StageError, StageId};

/// Sends `request` on behalf of `stage`, attributing any failure to it.
pub(crate) async fn ask(
    provider: &dyn ModelProvider,
    stage: StageId,
    request: CompletionRequest,
) -> Result<String, StageError> {
    let completion = provider
        .complete(request)
        .await
        .map_err(|e| StageError::from_provider(stage, &e))?;
    debug!(
        stage = %stage,
        provider = provider.name(),
        model = %completion.model,
        tokens = completion.total_tokens(),
        "Agent call completed"
    );
    Ok(completion.content)
}
