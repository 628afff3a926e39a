use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use flowforge_core::job::{JobStatusView, JobStore};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/jobs: every job, newest first.
pub async fn list_jobs(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let jobs = app.orchestrator.jobs().clone();
    let result = tokio::task::spawn_blocking(move || {
        let views: Vec<JobStatusView> = jobs.list()?.iter().map(JobStatusView::from).collect();
        Ok::<_, flowforge_core::FlowError>(serde_json::to_value(views)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/jobs/:id: status poll. Terminal jobs return the same record on
/// every poll.
pub async fn get_job(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job_id =
        Uuid::parse_str(&id).map_err(|_| AppError::bad_request(format!("invalid job id '{id}'")))?;
    let orchestrator = app.orchestrator.clone();
    let result = tokio::task::spawn_blocking(move || {
        let view = orchestrator.status(job_id)?;
        Ok::<_, flowforge_core::FlowError>(serde_json::to_value(view)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
