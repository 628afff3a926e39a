use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowforge_core::FlowError;

// ---------------------------------------------------------------------------
// Request validation failures
// ---------------------------------------------------------------------------

/// Malformed request input that never reached the core (bad path params).
#[derive(Debug)]
struct BadRequest(String);

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadRequest {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequest(msg.into()).into())
    }
}

fn status_for(e: &FlowError) -> StatusCode {
    match e {
        FlowError::NotInitialized | FlowError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        FlowError::TemplateNotFound(_) | FlowError::JobNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::InvalidSlug(_)
        | FlowError::MalformedHeader(_)
        | FlowError::ReorderOutOfRange { .. } => StatusCode::BAD_REQUEST,
        FlowError::InvalidTemplate { .. }
        | FlowError::UnresolvedAliases(_)
        | FlowError::DuplicateSequenceOrder { .. }
        | FlowError::DuplicateTaskId(_)
        | FlowError::InvalidTaskId(_)
        | FlowError::TaskIdOverflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::TaskExists(_) | FlowError::InvalidJobTransition { .. } => StatusCode::CONFLICT,
        FlowError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        FlowError::Background(_)
        | FlowError::TaskWrite { .. }
        | FlowError::Io(_)
        | FlowError::Yaml(_)
        | FlowError::Json(_)
        | FlowError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequest>().is_some() {
            StatusCode::BAD_REQUEST
        } else if let Some(e) = self.0.downcast_ref::<FlowError>() {
            status_for(e)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_core::alias::AliasIssue;

    fn status(e: FlowError) -> StatusCode {
        AppError(e.into()).into_response().status()
    }

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(status(FlowError::TemplateNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(FlowError::JobNotFound("x".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn header_problems_map_to_400() {
        assert_eq!(
            status(FlowError::MalformedHeader("batch is empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(FlowError::InvalidSlug("Bad Id".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(FlowError::NotInitialized), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn group_problems_map_to_422() {
        let e = FlowError::UnresolvedAliases(vec![AliasIssue::Missing {
            alias: "Near-end".into(),
        }]);
        assert_eq!(status(e), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(FlowError::DuplicateTaskId("T1".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let e = FlowError::TaskIdOverflow {
            prefix: "MW-".into(),
            start: u64::MAX,
            offset: 1,
        };
        assert_eq!(status(e), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(status(FlowError::TaskExists("T1".into())), StatusCode::CONFLICT);
        let e = FlowError::InvalidJobTransition {
            from: "completed".into(),
            to: "processing".into(),
        };
        assert_eq!(status(e), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_maps_to_503() {
        assert_eq!(
            status(FlowError::Storage("database locked".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn io_and_foreign_errors_map_to_500() {
        assert_eq!(
            status(FlowError::Io(std::io::Error::other("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let e = FlowError::TaskWrite {
            task_id: "T1".into(),
            reason: "disk full".into(),
        };
        assert_eq!(status(e), StatusCode::INTERNAL_SERVER_ERROR);
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let err = AppError::bad_request("invalid job id 'nope'");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(FlowError::JobNotFound("j".into()).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
