pub mod actions;
pub mod health;
pub mod listen;
pub mod pages;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(pages::routes())
        .merge(actions::routes())
        .merge(webhooks::routes())
        .merge(listen::routes())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use homefind_core::events::EventBus;
    use homefind_core::identity::MemoryDirectory;
    use homefind_core::webhook::verify::{ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use homefind_core::webhook::WebhookVerifier;
    use homefind_core::{Capabilities, MemoryStore};

    use super::*;
    use crate::auth::testing::{token, SECRET};
    use crate::auth::SessionVerifier;

    const PLAN: &str = "agent";
    const WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    struct TestApp {
        router: Router,
        store: Arc<MemoryStore>,
    }

    fn app_with(documents: Vec<Value>) -> TestApp {
        let store = Arc::new(MemoryStore::with_documents(documents));
        let caps = Capabilities::new(
            store.clone(),
            Arc::new(MemoryDirectory::new()),
            EventBus::new(16),
            PLAN,
        );
        let webhooks = WebhookVerifier::new(WEBHOOK_SECRET).unwrap();
        let state = AppState::new(caps, SessionVerifier::hs256(SECRET), Some(webhooks));
        TestApp {
            router: build_router(state),
            store,
        }
    }

    fn get(uri: &str, bearer: Option<String>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(t) = bearer {
            req = req.header(AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn buyer(clerk_id: &str) -> Value {
        json!({
            "_id": format!("user-{clerk_id}"),
            "_type": "user",
            "_rev": "r0",
            "_createdAt": "2024-01-01T00:00:00Z",
            "_updatedAt": "2024-01-01T00:00:00Z",
            "clerkId": clerk_id,
            "name": "Bea Buyer",
            "email": "bea@example.com",
            "phone": "555-0100",
            "savedListings": [],
        })
    }

    fn listing(id: &str) -> Value {
        json!({
            "_id": id,
            "_type": "property",
            "_rev": "r0",
            "_createdAt": "2024-01-01T00:00:00Z",
            "_updatedAt": "2024-01-01T00:00:00Z",
            "title": "Bright bungalow",
            "slug": {"current": "bright-bungalow"},
            "price": 250000,
            "status": "active",
            "agent": {"_type": "reference", "_ref": "agent-a1"},
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app_with(Vec::new());
        let response = app.router.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn anonymous_dashboard_redirects_to_sign_in() {
        let app = app_with(Vec::new());
        let response = app.router.oneshot(get("/dashboard", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/sign-in");
    }

    #[tokio::test]
    async fn signed_in_without_plan_goes_to_pricing() {
        let app = app_with(Vec::new());
        let response = app
            .router
            .oneshot(get("/dashboard", Some(token("u1", &[]))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/pricing");
    }

    #[tokio::test]
    async fn plan_holder_is_provisioned_and_sent_to_onboarding() {
        let app = app_with(Vec::new());
        let response = app
            .router
            .oneshot(get("/dashboard", Some(token("u1", &[PLAN]))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/dashboard/onboarding");
        assert!(app.store.get("agent-u1").await.is_some());
    }

    #[tokio::test]
    async fn save_toggle_flips_state() {
        let app = app_with(vec![buyer("b1"), listing("p1")]);
        let request = || {
            Request::post("/actions/saved/p1")
                .header(AUTHORIZATION, format!("Bearer {}", token("b1", &[])))
                .body(Body::empty())
                .unwrap()
        };

        let first = app.router.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let body = json_body(first).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["saved"], true);

        let second = app.router.oneshot(request()).await.unwrap();
        assert_eq!(json_body(second).await["saved"], false);
    }

    #[tokio::test]
    async fn anonymous_actions_are_unauthorized() {
        let app = app_with(vec![listing("p1")]);
        let response = app
            .router
            .oneshot(
                Request::post("/actions/leads")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"propertyId":"p1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn unknown_property_is_not_found() {
        let app = app_with(Vec::new());
        let response = app
            .router
            .oneshot(get("/properties/nowhere", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn webhook_request(body: &'static str, signature: String) -> Request<Body> {
        Request::post("/api/webhooks/clerk")
            .header(ID_HEADER, "msg_1")
            .header(TIMESTAMP_HEADER, Utc::now().timestamp().to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    const SUBSCRIPTION: &str =
        r#"{"type":"subscription.created","data":{"status":"active","payer":{"user_id":"u9"}}}"#;

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let app = app_with(Vec::new());
        let response = app
            .router
            .oneshot(webhook_request(SUBSCRIPTION, "v1,bm9wZQ==".into()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.store.get("agent-u9").await.is_none());
    }

    #[tokio::test]
    async fn webhook_without_headers_is_rejected() {
        let app = app_with(Vec::new());
        let response = app
            .router
            .oneshot(
                Request::post("/api/webhooks/clerk")
                    .body(Body::from(SUBSCRIPTION))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_subscription_webhook_provisions_agent() {
        let app = app_with(Vec::new());
        let signature = WebhookVerifier::new(WEBHOOK_SECRET)
            .unwrap()
            .sign("msg_1", Utc::now().timestamp(), SUBSCRIPTION.as_bytes())
            .unwrap();
        let response = app
            .router
            .oneshot(webhook_request(SUBSCRIPTION, signature))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(app.store.get("agent-u9").await.is_some());
    }
}
