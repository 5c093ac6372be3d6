//! REST endpoints for triage requests.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::error::{Error, InputError};
use crate::triage::{EmailContext, TriageCoordinator, TriageRequest};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<TriageCoordinator>,
}

/// Build the Axum router with the triage and health routes.
pub fn triage_routes(coordinator: Arc<TriageCoordinator>) -> Router {
    let state = AppState { coordinator };

    Router::new()
        .route("/health", get(health))
        .route("/api/triage", post(triage_json))
        .route("/api/triage/raw", post(triage_raw))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mailguard"
    }))
}

// ── Triage ──────────────────────────────────────────────────────────────

async fn triage_json(
    State(state): State<AppState>,
    payload: Result<Json<TriageRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(InputError::MalformedRequest(rejection.body_text())),
    };
    match request.into_context() {
        Ok(context) => run(&state, context).await,
        Err(e) => bad_request(e),
    }
}

async fn triage_raw(State(state): State<AppState>, body: Bytes) -> Response {
    match EmailContext::from_rfc822(&body) {
        Ok(context) => run(&state, context).await,
        Err(e) => bad_request(e),
    }
}

async fn run(state: &AppState, context: EmailContext) -> Response {
    match state.coordinator.run_triage(context).await {
        Ok(verdict) => (StatusCode::OK, Json(verdict)).into_response(),
        Err(Error::Input(e)) => bad_request(e),
        Err(e) => {
            error!(error = %e, "Triage failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

fn bad_request(e: InputError) -> Response {
    warn!(error = %e, "Rejected triage request");
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::analyzers::AnalyzerSet;
    use crate::config::TriageConfig;

    fn app() -> Router {
        let coordinator = TriageCoordinator::new(AnalyzerSet::heuristic(vec![]), TriageConfig::default());
        triage_routes(Arc::new(coordinator))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "mailguard");
    }

    #[tokio::test]
    async fn triage_json_returns_verdict() {
        let request = Request::post("/api/triage")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "sender_email": "colleague@example.com",
                    "subject": "Notes",
                    "body": "Notes from the meeting are in the shared folder."
                })
                .to_string(),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let verdict = body_json(response).await;
        assert_eq!(verdict["classification"], "safe");
        assert_eq!(verdict["recommended_action"], "allow");
        assert_eq!(verdict["final_risk_score"], 0);
        assert_eq!(verdict["tool_execution_trace"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn triage_json_rejects_bad_sender() {
        let request = Request::post("/api/triage")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"sender_email": "nobody", "subject": "x", "body": "y"}).to_string(),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid sender"));
    }

    #[tokio::test]
    async fn triage_json_rejects_mistyped_field_as_bad_request() {
        let request = Request::post("/api/triage")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"sender_email": 5, "subject": "x", "body": "y"}).to_string(),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Malformed request body:"), "{message}");
        assert!(message.contains("sender_email"), "{message}");
    }

    #[tokio::test]
    async fn triage_json_rejects_missing_content_type_as_bad_request() {
        let request = Request::post("/api/triage")
            .body(Body::from(r#"{"sender_email": "a@example.com"}"#))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn triage_raw_parses_message() {
        let raw = "From: it-support@example.com\r\nSubject: Password reset\r\n\r\nReset your password at https://example.com/account\r\n";
        let response = app()
            .oneshot(
                Request::post("/api/triage/raw")
                    .body(Body::from(raw))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let verdict = body_json(response).await;
        assert_eq!(verdict["email_metadata"]["sender"], "it-support@example.com");
        assert_eq!(verdict["email_metadata"]["subject"], "Password reset");
    }

    #[tokio::test]
    async fn triage_raw_without_sender_is_rejected() {
        let response = app()
            .oneshot(
                Request::post("/api/triage/raw")
                    .body(Body::from("Subject: anonymous\r\n\r\nhello\r\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
