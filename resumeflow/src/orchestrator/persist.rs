//! Rendering a finished run into artifact files.

use crate::context::PipelineRun;
use crate::core::StageOutput;

/// Artifact name for each structured stage output.
fn file_name(output: &StageOutput) -> Option<&'static str> {
    match output {
        StageOutput::AnalyzeResume(_) => Some("resume_analysis.json"),
        StageOutput::AnalyzeJob(_) => Some("job_analysis.json"),
        StageOutput::Research(_) => Some("company_research.json"),
        StageOutput::Optimize(_) => Some("resume_optimization.json"),
        StageOutput::Report(_) => None,
    }
}

/// The files a completed run leaves behind, in stage order.
///
/// JSON documents for the structured stages, then the optimized resume and
/// the report as markdown.
pub(super) fn render(run: &PipelineRun) -> Result<Vec<(&'static str, Vec<u8>)>, serde_json::Error> {
    let mut files = Vec::with_capacity(run.len() + 1);
    for record in run.records() {
        if let Some(name) = file_name(&record.output) {
            files.push((name, record.output.to_pretty_json()?.into_bytes()));
        }
    }
    if let Some(report) = run.report() {
        files.push(("optimized_resume.md", report.optimized_resume.clone().into_bytes()));
        files.push(("final_report.md", report.report.clone().into_bytes()));
    }
    Ok(files)
}
