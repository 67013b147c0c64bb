use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::{json, Value};

use homefind_core::document::ValidationError;
use homefind_core::webhook::WebhookError;
use homefind_core::{ActionError, GateExit};

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A page load that ends in a redirect or a 404.
    #[error(transparent)]
    Page(#[from] GateExit),

    /// A rejected action, reported to the client as `success: false`.
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("internal error: {0}")]
    Internal(String),
}

fn error_body(status: StatusCode, error_type: &str, message: String) -> Response {
    let body = json!({
        "error": {
            "type": error_type,
            "message": message,
            "statusCode": status.as_u16(),
        }
    });
    (status, Json(body)).into_response()
}

fn internal(err: &dyn std::fmt::Display) -> Response {
    tracing::error!("Internal error: {err}");
    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internalError",
        "An internal error occurred".to_string(),
    )
}

fn page_response(exit: GateExit) -> Response {
    match exit {
        GateExit::Redirect(to) => Redirect::to(to.location()).into_response(),
        GateExit::NotFound(what) => {
            error_body(StatusCode::NOT_FOUND, "notFound", format!("{what} not found"))
        }
        GateExit::InvalidId(e) => error_body(StatusCode::BAD_REQUEST, "badRequest", e.to_string()),
        e @ (GateExit::Store(_) | GateExit::Identity(_)) => internal(&e),
    }
}

fn action_status(err: &ActionError) -> StatusCode {
    match err {
        ActionError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ActionError::RequiresOnboarding
        | ActionError::PlanRequired
        | ActionError::Unauthorized => StatusCode::FORBIDDEN,
        ActionError::NotFound(_) => StatusCode::NOT_FOUND,
        ActionError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ActionError::Conflict => StatusCode::CONFLICT,
        ActionError::Store(_) | ActionError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn action_response(err: ActionError) -> Response {
    let status = action_status(&err);
    let message = if err.is_internal() {
        tracing::error!(error = %err, "action failed");
        "An internal error occurred".to_string()
    } else {
        err.to_string()
    };

    let mut error = json!({ "type": err.kind(), "message": message });
    if let ActionError::Invalid(ValidationError::Fields(fields)) = &err {
        error["fields"] = json!(fields);
    }
    let mut body = json!({ "success": false, "error": error });
    if matches!(err, ActionError::RequiresOnboarding) {
        body["requiresOnboarding"] = Value::Bool(true);
    }
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Page(exit) => page_response(exit),
            ApiError::Action(err) => action_response(err),
            ApiError::Webhook(err) if err.is_rejection() => {
                tracing::warn!(error = %err, "webhook rejected");
                error_body(StatusCode::BAD_REQUEST, "badRequest", err.to_string())
            }
            ApiError::Webhook(err) => internal(&err),
            ApiError::Internal(msg) => internal(&msg),
        }
    }
}

/// Convenience type alias for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
