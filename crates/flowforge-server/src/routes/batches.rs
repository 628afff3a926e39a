use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use flowforge_core::job::{BatchRequest, Submission};

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/batches: submit a tabular batch.
///
/// Small batches are processed before responding (200 with the summary).
/// Larger ones are queued (202 with the job id); poll `/api/jobs/:id`.
pub async fn submit_batch(
    State(app): State<AppState>,
    Json(mut req): Json<BatchRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let naming = app.config.naming.policy(
        req.task_name.take(),
        req.auto_id_prefix.take(),
        req.auto_id_start.take(),
    );
    req.task_name = naming.task_name;
    req.auto_id_prefix = naming.auto_id_prefix;
    req.auto_id_start = naming.auto_id_start;

    let orchestrator = app.orchestrator.clone();
    let poll_interval_ms = app.config.jobs.poll_interval_ms;
    let (status, body) = tokio::task::spawn_blocking(move || {
        let template_id = req.flow_template_id.clone();
        let submission = orchestrator.submit(req)?;
        let response = match submission {
            Submission::Inline(summary) => {
                tracing::info!(
                    template = %template_id,
                    created = summary.created_count,
                    errors = summary.error_count,
                    "batch processed inline"
                );
                (
                    StatusCode::OK,
                    serde_json::json!({
                        "mode": "inline",
                        "created_count": summary.created_count,
                        "error_count": summary.error_count,
                        "errors": summary.errors,
                    }),
                )
            }
            // the worker keeps running once the handle is dropped
            Submission::Queued(handle) => {
                let job = orchestrator.status(handle.job_id())?;
                (
                    StatusCode::ACCEPTED,
                    serde_json::json!({
                        "mode": "queued",
                        "job_id": job.job_id,
                        "status": job.status,
                        "total_rows": job.total_rows,
                        "poll_interval_ms": poll_interval_ms,
                    }),
                )
            }
        };
        Ok::<_, flowforge_core::FlowError>(response)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((status, Json(body)))
}
