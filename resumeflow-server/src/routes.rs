use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use resumeflow::context::JobRequest;
use resumeflow::core::{content_type_for, Job, JobError, JobId, JobResult, JobStatus, JobSummary, Progress};

use crate::error::ApiError;
use crate::state::AppState;

const CANCEL_REASON: &str = "cancelled by client";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/resumes", post(upload_resume))
        .route("/v1/resumes/:file_id", get(get_upload))
        .route("/v1/jobs", post(submit_job).get(list_jobs))
        .route("/v1/jobs/:id", get(get_job).delete(delete_job))
        .route("/v1/jobs/:id/cancel", post(cancel_job))
        .route("/v1/jobs/:id/artifacts/:name", get(get_artifact))
        .with_state(state)
}

/// What clients see of a job.
#[derive(Debug, Serialize)]
struct JobView {
    job_id: JobId,
    status: JobStatus,
    progress: Progress,
    result: Option<JobResult>,
    error: Option<JobError>,
    request: JobSummary,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            result: job.result,
            error: job.error,
            request: job.request,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

fn parse_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::UnknownJobId(raw.to_string()))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Resume optimizer is running",
        "version": resumeflow::VERSION,
    }))
}

async fn upload_resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let upload = state.service.upload_resume(content_type, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "file_id": upload.file_id,
            "content_type": upload.content_type,
            "size": upload.size,
            "sha256": upload.sha256,
            "message": "Resume uploaded",
        })),
    ))
}

async fn get_upload(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let upload = state
        .service
        .uploads()
        .describe(&file_id)
        .ok_or(ApiError::UnknownUpload(file_id))?;
    Ok(Json(json!({
        "file_id": upload.file_id,
        "content_type": upload.content_type,
        "size": upload.size,
        "created_at": upload.created_at,
    })))
}

async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = body?;
    let job_id = state.service.submit(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "status": JobStatus::Queued })),
    ))
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobView>> {
    let jobs = state.service.list().await;
    Json(jobs.into_iter().map(JobView::from).collect())
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job = state.service.status(parse_id(&id)?).await?;
    Ok(Json(job.into()))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job = state.service.cancel(parse_id(&id)?, CANCEL_REASON).await?;
    Ok(Json(job.into()))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job = state.service.delete(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": format!("Job {} deleted", job.id) })))
}

async fn get_artifact(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.service.artifact(parse_id(&id)?, &name).await?;
    let disposition = format!("attachment; filename=\"{name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use resumeflow::artifacts::InMemoryArtifactStore;
    use resumeflow::config::WorkerConfig;
    use resumeflow::orchestrator::Orchestrator;
    use resumeflow::pipeline::AgentPipeline;
    use resumeflow::service::JobService;
    use resumeflow::stages::{Stage, StageId};
    use resumeflow::store::InMemoryJobStore;
    use resumeflow::testing::{wait_for_terminal, ScriptedStage, SlowStage};

    fn app_with(slow: Option<Duration>) -> (Router, Arc<JobService>) {
        let mut builder = AgentPipeline::builder();
        for id in StageId::ALL {
            let stage: Arc<dyn Stage> = match (id, slow) {
                (StageId::AnalyzeResume, Some(delay)) => Arc::new(SlowStage::new(id, delay)),
                _ => Arc::new(ScriptedStage::new(id)),
            };
            builder = builder.stage(stage);
        }
        let orchestrator =
            Orchestrator::new(Arc::new(InMemoryJobStore::new()), Arc::new(builder.build().unwrap()))
                .with_artifacts(Arc::new(InMemoryArtifactStore::new()));
        let service = Arc::new(JobService::new(WorkerConfig::default(), orchestrator));
        (build_router(AppState::new(service.clone())), service)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn submission() -> Value {
        json!({
            "resume_text": "Jane Doe\nML engineer, 6 years of Python.",
            "target": "Senior AI Engineer, Acme Health",
        })
    }

    async fn submit(app: &Router) -> JobId {
        let (status, body) = send(app.clone(), Method::POST, "/v1/jobs", Some(submission())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");
        body["job_id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(None);
        let (status, body) = send(app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_submit_then_poll_until_completed() {
        let (app, service) = app_with(None);
        let id = submit(&app).await;

        wait_for_terminal(&service, id, Duration::from_secs(5)).await.unwrap();
        let (status, body) = send(app.clone(), Method::GET, &format!("/v1/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job_id"], id.to_string());
        assert_eq!(body["status"], "completed");
        assert_eq!(body["progress"]["percent"], 100);
        assert!(body["result"]["report"].as_str().unwrap().contains("Acme Health"));
        assert!(body["error"].is_null());
        assert!(body["completed_at"].is_string());

        let (status, list) = send(app, Method::GET, "/v1/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_submission_is_422() {
        let (app, service) = app_with(None);
        let body = json!({ "resume_text": "   ", "target": "Engineer, Acme" });
        let (status, body) = send(app.clone(), Method::POST, "/v1/jobs", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "resume_text");
        assert!(service.list().await.is_empty());

        let (status, body) = send(app, Method::POST, "/v1/jobs", Some(json!([1, 2]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids_are_404() {
        let (app, _) = app_with(None);
        let (status, body) =
            send(app.clone(), Method::GET, &format!("/v1/jobs/{}", JobId::new()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = send(app, Method::GET, "/v1/jobs/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_then_conflict() {
        let (app, service) = app_with(Some(Duration::from_millis(200)));
        let id = submit(&app).await;

        let uri = format!("/v1/jobs/{id}/cancel");
        let (status, _) = send(app.clone(), Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let job = wait_for_terminal(&service, id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);

        let (status, body) = send(app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_artifact_download_and_delete() {
        let (app, service) = app_with(None);
        let id = submit(&app).await;
        wait_for_terminal(&service, id, Duration::from_secs(5)).await.unwrap();

        let request = Request::builder()
            .uri(format!("/v1/jobs/{id}/artifacts/optimized_resume.md"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/markdown");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8(bytes.to_vec()).unwrap().starts_with("# Jane Doe"));

        let (status, _) = send(
            app.clone(),
            Method::GET,
            &format!("/v1/jobs/{id}/artifacts/missing.md"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(app.clone(), Method::DELETE, &format!("/v1/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains(&id.to_string()));

        let (status, _) = send(app, Method::GET, &format!("/v1/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    async fn upload(app: Router, content_type: &str, body: &'static [u8]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/resumes")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_upload_then_submit_by_file_id() {
        let (app, service) = app_with(None);
        let (status, body) = upload(
            app.clone(),
            "text/plain; charset=utf-8",
            b"Jane Doe\nML engineer, 6 years of Python.",
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["content_type"], "text/plain");
        let file_id = body["file_id"].as_str().unwrap().to_string();
        assert_eq!(file_id.len(), 12);

        let (status, meta) = send(app.clone(), Method::GET, &format!("/v1/resumes/{file_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(meta["size"], body["size"]);

        let submission = json!({
            "resume_file_id": file_id,
            "target": "Senior AI Engineer, Acme Health",
        });
        let (status, body) = send(app.clone(), Method::POST, "/v1/jobs", Some(submission)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let id: JobId = body["job_id"].as_str().unwrap().parse().unwrap();

        let job = wait_for_terminal(&service, id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let (_, body) = send(app, Method::GET, &format!("/v1/jobs/{id}"), None).await;
        assert_eq!(body["request"]["resume_file_id"], file_id);
    }

    #[tokio::test]
    async fn test_bad_uploads_are_rejected() {
        let (app, service) = app_with(None);
        let (status, body) = upload(app.clone(), "application/pdf", b"%PDF-1.7").await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");

        let (status, body) = upload(app.clone(), "text/plain", b"").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["field"], "file");

        let (status, _) = send(app.clone(), Method::GET, "/v1/resumes/000000000000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let submission = json!({ "resume_file_id": "000000000000", "target": "Engineer, Acme" });
        let (status, body) = send(app, Method::POST, "/v1/jobs", Some(submission)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["field"], "resume_file_id");
        assert!(service.uploads().is_empty());
        assert!(service.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_running_job_is_conflict() {
        let (app, service) = app_with(Some(Duration::from_millis(200)));
        let id = submit(&app).await;
        let (status, body) = send(app, Method::DELETE, &format!("/v1/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
        service.shutdown().await;
    }
}
