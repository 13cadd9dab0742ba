// Expense Tracker - Web Server
// REST API with Axum over the submission pipeline

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use expense_tracker::{
    validate_submission, AppConfig, DashboardView, SqliteStore, SubmissionOutcome,
    SubmissionPipeline, TrackerError,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Mutex<SubmissionPipeline<SqliteStore>>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Deserialize)]
struct SubmitRequest {
    amount: f64,
    description: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    outcome: SubmissionOutcome,
    dashboard: DashboardView,
}

/// Map core errors onto HTTP statuses
fn error_response(err: TrackerError) -> Response {
    let status = match err {
        TrackerError::Validation(_) => StatusCode::BAD_REQUEST,
        TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}

fn poisoned() -> Response {
    error!("pipeline lock poisoned");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::err("internal state unavailable".to_string())),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/dashboard - Totals, thresholds and all expenses
async fn get_dashboard(State(state): State<AppState>) -> Response {
    let Ok(pipeline) = state.pipeline.lock() else {
        return poisoned();
    };

    match pipeline.dashboard(None) {
        Ok(view) => (StatusCode::OK, Json(ApiResponse::ok(view))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/expenses - Submit a new expense
async fn submit_expense(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Response {
    let submission = match validate_submission(request.amount, &request.description) {
        Ok(submission) => submission,
        Err(e) => return error_response(e),
    };

    let Ok(pipeline) = state.pipeline.lock() else {
        return poisoned();
    };

    let result = pipeline
        .handle_submission(submission.amount, &submission.description)
        .and_then(|outcome| {
            let dashboard = pipeline.dashboard(Some(outcome.message.clone()))?;
            Ok(SubmitResponse { outcome, dashboard })
        });

    match result {
        Ok(response) => (StatusCode::CREATED, Json(ApiResponse::ok(response))).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/expenses/:id - Delete an expense, return the refreshed dashboard
async fn delete_expense(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let Ok(pipeline) = state.pipeline.lock() else {
        return poisoned();
    };

    let result = pipeline
        .delete_expense(id)
        .and_then(|()| pipeline.dashboard(None));

    match result {
        Ok(view) => (StatusCode::OK, Json(ApiResponse::ok(view))).into_response(),
        Err(e) => error_response(e),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/expenses", post(submit_expense))
        .route("/expenses/:id", delete(delete_expense))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("🌐 Expense Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::load()?;
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    println!("✓ Database opened: {:?}", config.database_path);

    let state = AppState {
        pipeline: Arc::new(Mutex::new(SubmissionPipeline::new(store, config)?)),
    };

    let addr = std::env::var("EXPENSE_TRACKER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/dashboard", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server terminated")?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let pipeline =
            SubmissionPipeline::new(SqliteStore::open_in_memory().unwrap(), AppConfig::default())
                .unwrap();
        router(AppState {
            pipeline: Arc::new(Mutex::new(pipeline)),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_expense(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/expenses")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_then_delete() {
        let app = app();

        let (status, body) = send(&app, post_expense(r#"{"amount": 5, "description": "Coffee"}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["outcome"]["message"], "within all budgets");
        assert_eq!(body["data"]["dashboard"]["daily_total"], 5.0);
        let id = body["data"]["outcome"]["expense"]["id"].as_i64().unwrap();

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/expenses/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["daily_total"], 0.0);
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let app = app();

        let (status, body) = send(&app, post_expense(r#"{"amount": -1, "description": "Refund"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let app = app();
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/expenses/404")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "expense 404 not found");
    }

    #[tokio::test]
    async fn test_dashboard_starts_empty() {
        let app = app();
        let request = Request::builder()
            .uri("/api/dashboard")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["expenses"].as_array().unwrap().len(), 0);
        assert_eq!(body["data"]["thresholds"]["daily"], 250.0);
    }
}
