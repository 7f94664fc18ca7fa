// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//
//   POST /api/v1/orchestrate   trigger: {action, forceExecution?}
//   GET  /api/v1/health        liveness and engine availability
//   GET  /api/v1/engines       dashboard summary of every engine
//   GET  /api/v1/engines/:id   detailed view of one engine
//   GET  /api/v1/result        last orchestration result (or null)
//   GET  /api/v1/errors        recent orchestration-level errors
//
// Only orchestration-level failures map to 500; engine failures are part of
// a successful result.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::engine::runtime::EngineSummary;
use crate::providers::rate_limit::RateLimitSnapshot;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/orchestrate", post(orchestrate))
        .route("/api/v1/health", get(health))
        .route("/api/v1/engines", get(engines))
        .route("/api/v1/engines/:id", get(engine_detail))
        .route("/api/v1/result", get(last_result))
        .route("/api/v1/errors", get(recent_errors))
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

// =============================================================================
// Orchestration trigger
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TriggerAction {
    #[default]
    Orchestrate,
    Health,
}

#[derive(Debug, Default, Deserialize)]
struct TriggerRequest {
    #[serde(default)]
    action: TriggerAction,
    #[serde(default, alias = "forceExecution")]
    force_execution: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerHealth {
    status: &'static str,
    available_engine_count: usize,
}

async fn orchestrate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TriggerRequest>,
) -> Response {
    match req.action {
        TriggerAction::Health => Json(TriggerHealth {
            status: "ok",
            available_engine_count: state.available_engine_count(),
        })
        .into_response(),
        TriggerAction::Orchestrate => {
            info!(force = req.force_execution, "orchestration triggered via API");
            match state.run_orchestration(req.force_execution).await {
                Ok(result) => Json(result).into_response(),
                Err(e) => {
                    warn!(error = %e, "orchestration request failed");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            }
        }
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    available_engine_count: usize,
    state_version: u64,
    uptime_secs: u64,
    server_time: i64,
    rate_limit: Option<RateLimitSnapshot>,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        available_engine_count: state.available_engine_count(),
        state_version: state.current_state_version(),
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
        rate_limit: state.rate_limit_snapshot(),
    })
}

// =============================================================================
// Engine projections
// =============================================================================

async fn engines(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summaries: Vec<EngineSummary> = state
        .registry
        .runtimes()
        .iter()
        .map(|rt| rt.dashboard_summary())
        .collect();
    Json(summaries)
}

async fn engine_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.registry.get(&id) {
        Some(runtime) => Json(runtime.detailed_view()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("unknown engine '{id}'")),
    }
}

// =============================================================================
// Results & errors
// =============================================================================

async fn last_result(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.last_result())
}

async fn recent_errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let errors = state.recent_errors.read().clone();
    Json(errors)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::engine::testing::{Outcome, ScriptedEngine};
    use crate::engine::{EngineConfig, EngineRegistry};
    use crate::providers::rate_limit::{RateLimitTracker, WEIGHT_HARD_LIMIT};
    use crate::runtime_config::RuntimeConfig;
    use crate::types::EngineTier;

    fn app_state(engines: Vec<ScriptedEngine>) -> Arc<AppState> {
        let registry = Arc::new(EngineRegistry::new());
        for engine in engines {
            registry
                .register(Arc::new(engine), EngineConfig::default())
                .unwrap();
        }
        let config = RuntimeConfig {
            inter_engine_delay_ms: 0,
            ..RuntimeConfig::default()
        };
        Arc::new(AppState::new(config, registry))
    }

    fn default_engines() -> Vec<ScriptedEngine> {
        vec![
            ScriptedEngine::new("liquidity", EngineTier::Foundation, Outcome::bullish(1.0)),
            ScriptedEngine::new("trend", EngineTier::Core, Outcome::bullish(0.5)),
        ]
    }

    async fn send(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn orchestrate_returns_result() {
        let state = app_state(default_engines());
        let (status, body) = send(
            state.clone(),
            post_json("/api/v1/orchestrate", r#"{"action":"orchestrate","forceExecution":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["masterSignal"], "RISK_ON");
        assert_eq!(body["enginesExecuted"], 2);
        assert_eq!(body["perEngineReports"][0]["engineId"], "liquidity");
        assert!((body["clis"].as_f64().unwrap() - 6.5).abs() < 1e-9);

        let (_, stored) = send(state, get("/api/v1/result")).await;
        assert_eq!(stored["runId"], body["runId"]);
    }

    #[tokio::test]
    async fn health_action_reports_engine_count() {
        let state = app_state(default_engines());
        let (status, body) = send(state, post_json("/api/v1/orchestrate", r#"{"action":"health"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["availableEngineCount"], 2);
    }

    #[tokio::test]
    async fn orchestration_error_maps_to_500() {
        let state = app_state(vec![ScriptedEngine::new(
            "dangling",
            EngineTier::Synthesis,
            Outcome::neutral(0.0),
        )
        .with_dependencies(&["nowhere"])]);
        let (status, body) = send(state, post_json("/api/v1/orchestrate", "{}")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("nowhere"));
    }

    #[tokio::test]
    async fn engine_failure_is_still_200() {
        let state = app_state(vec![ScriptedEngine::new(
            "broken",
            EngineTier::Core,
            Outcome::fail("upstream down"),
        )]);
        let (status, body) = send(state, post_json("/api/v1/orchestrate", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enginesExecuted"], 0);
        assert_eq!(body["errors"][0]["engineId"], "broken");
        assert_eq!(body["errors"][0]["message"], "upstream down");
        assert_eq!(body["errors"][0]["degraded"], true);
    }

    #[tokio::test]
    async fn engine_views() {
        let state = app_state(default_engines());
        let (status, body) = send(state.clone(), get("/api/v1/engines")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["state"], "idle");

        let (status, body) = send(state.clone(), get("/api/v1/engines/trend")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], "core");
        assert_eq!(body["metrics"]["health_score"], 70.0);

        let (status, _) = send(state, get("/api/v1/engines/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn result_is_null_before_first_run() {
        let (status, body) = send(app_state(Vec::new()), get("/api/v1/result")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send(app_state(default_engines()), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available_engine_count"], 2);
        assert!(body["rate_limit"].is_null());
    }

    #[tokio::test]
    async fn health_reports_exchange_weight_usage() {
        let tracker = Arc::new(RateLimitTracker::new());
        assert!(tracker.try_acquire(WEIGHT_HARD_LIMIT + 1).is_err());

        let state = AppState::new(RuntimeConfig::default(), Arc::new(EngineRegistry::new()))
            .with_rate_limit(Arc::clone(&tracker));
        let (status, body) = send(Arc::new(state), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rate_limit"]["used_weight_1m"], 0);
        assert_eq!(body["rate_limit"]["blocked_requests"], 1);
    }
}
