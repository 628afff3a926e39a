use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use flowforge_core::alias::SiteGroup;
use flowforge_core::batch;
use flowforge_core::job::MaterializeRequest;
use flowforge_core::materialize::NamingPolicy;
use flowforge_core::template::annotate_scopes;
use flowforge_core::template_store::TemplateStore;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/templates: list the template catalog.
pub async fn list_templates(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.templates.clone();
    let result = tokio::task::spawn_blocking(move || {
        let templates = store.list()?;
        let list: Vec<serde_json::Value> = templates
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "category": t.category,
                    "aliases": t.required_aliases(),
                    "activity_count": t.activities.len(),
                })
            })
            .collect();
        Ok::<_, flowforge_core::FlowError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/templates/:id: template with derived scopes.
pub async fn get_template(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.templates.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut t = store.get(&id)?;
        t.validate()?;
        annotate_scopes(&mut t);
        let activities: Vec<serde_json::Value> = t
            .ordered_activities()
            .into_iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "name": a.name,
                    "sequence_order": a.sequence_order,
                    "activity_type": a.activity_type,
                    "assigned_site_aliases": a.assigned_site_aliases,
                    "site_scope": a.site_scope(),
                    "dependencies": a.dependencies,
                    "dependency_scope": a.dependency_scope,
                })
            })
            .collect();
        Ok::<_, flowforge_core::FlowError>(serde_json::json!({
            "id": t.id,
            "name": t.name,
            "category": t.category,
            "sites": t.sites,
            "aliases": t.required_aliases(),
            "activities": activities,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/templates/:id/batch-header: header row for a batch upload.
pub async fn batch_header(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.templates.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = store.get(&id)?;
        let aliases = t.required_aliases();
        Ok::<_, flowforge_core::FlowError>(serde_json::json!({
            "template_id": t.id,
            "aliases": aliases,
            "header": batch::batch_header(&aliases),
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct MaterializeBody {
    pub project_id: String,
    pub site_groups: Vec<SiteGroup>,
    #[serde(default)]
    pub task_naming: NamingPolicy,
}

/// POST /api/templates/:id/materialize: one task per site group.
pub async fn materialize(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MaterializeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let naming = body.task_naming;
    let req = MaterializeRequest {
        flow_template_id: id,
        project_id: body.project_id,
        site_groups: body.site_groups,
        task_naming: app.config.naming.policy(
            naming.task_name,
            naming.auto_id_prefix,
            naming.auto_id_start,
        ),
    };
    let orchestrator = app.orchestrator.clone();
    let result = tokio::task::spawn_blocking(move || {
        let outcome = orchestrator.materialize(&req)?;
        Ok::<_, flowforge_core::FlowError>(serde_json::to_value(outcome)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
