use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;

use homefind_core::webhook::verify::{ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use homefind_core::webhook::{handle_event, SvixHeaders, WebhookEnvelope, WebhookError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/clerk", post(clerk_webhook))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Verify against the raw body, then act on the event. Unhandled event
/// types still get a 200 so the sender does not retry them.
async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, &'static str)> {
    let verifier = state
        .webhooks()
        .ok_or_else(|| ApiError::Internal("CLERK_WEBHOOK_SECRET is not configured".into()))?;

    let (Some(id), Some(timestamp), Some(signature)) = (
        header(&headers, ID_HEADER),
        header(&headers, TIMESTAMP_HEADER),
        header(&headers, SIGNATURE_HEADER),
    ) else {
        return Err(WebhookError::MissingHeaders.into());
    };
    let svix = SvixHeaders {
        id,
        timestamp,
        signature,
    };
    verifier.verify(&svix, &body, Utc::now())?;

    let envelope = WebhookEnvelope::parse(&body)?;
    let outcome = handle_event(state.caps(), envelope).await?;
    tracing::debug!(?outcome, "webhook processed");
    Ok((StatusCode::OK, "Webhook received"))
}
