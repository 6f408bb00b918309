//! REST API handlers.
//!
//! Each handler goes through the `Supervisor` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{info, warn};

use scalegrid_reconciler::ControllerError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn controller_error(e: &ControllerError) -> axum::response::Response {
    let status = match e {
        ControllerError::UnknownWorkload(_) => StatusCode::NOT_FOUND,
        ControllerError::RolloutInProgress(_) | ControllerError::NoRollout(_) => {
            StatusCode::CONFLICT
        }
        ControllerError::Stopped(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Workloads ──────────────────────────────────────────────────

/// GET /api/v1/workloads
pub async fn list_workloads(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.supervisor.statuses().await)
}

/// GET /api/v1/workloads/:id
pub async fn get_workload(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supervisor.status(&id).await {
        Ok(status) => ApiResponse::ok(status).into_response(),
        Err(e) => controller_error(&e),
    }
}

// ── Rollouts ───────────────────────────────────────────────────

/// Rollout request body.
#[derive(serde::Deserialize)]
pub struct RolloutRequest {
    pub revision: String,
}

/// POST /api/v1/workloads/:id/rollout
pub async fn start_rollout(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RolloutRequest>,
) -> impl IntoResponse {
    if req.revision.trim().is_empty() {
        return error_response("revision must not be empty", StatusCode::BAD_REQUEST)
            .into_response();
    }

    match state.supervisor.start_rollout(&id, &req.revision).await {
        Ok(()) => {
            info!(workload = %id, revision = %req.revision, "rollout requested");
            rollout_accepted(&state, &id, StatusCode::ACCEPTED).await
        }
        Err(e) => {
            warn!(workload = %id, error = %e, "rollout request refused");
            controller_error(&e)
        }
    }
}

/// POST /api/v1/workloads/:id/rollout/pause
pub async fn pause_rollout(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supervisor.pause_rollout(&id).await {
        Ok(()) => rollout_accepted(&state, &id, StatusCode::OK).await,
        Err(e) => controller_error(&e),
    }
}

/// POST /api/v1/workloads/:id/rollout/resume
pub async fn resume_rollout(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supervisor.resume_rollout(&id).await {
        Ok(()) => rollout_accepted(&state, &id, StatusCode::OK).await,
        Err(e) => controller_error(&e),
    }
}

/// Answer with the rollout summary the loop just published.
async fn rollout_accepted(
    state: &ApiState,
    id: &str,
    code: StatusCode,
) -> axum::response::Response {
    match state.supervisor.status(id).await {
        Ok(status) => (code, ApiResponse::ok(status.rollout)).into_response(),
        Err(e) => controller_error(&e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// Health check body.
#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "scalegrid",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let statuses = state.supervisor.statuses().await;
    let body = scalegrid_metrics::render_prometheus(&statuses);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use scalegrid_core::*;
    use scalegrid_reconciler::{SimulatedPlatform, Supervisor};

    async fn test_state() -> ApiState {
        let sim = Arc::new(SimulatedPlatform::new());
        sim.add_workload("api", 3).await;
        sim.set_demand("api", ResourceKind::Cpu, 2.1).await;

        let settings = ControllerSettings {
            cycle: Duration::from_secs(3600),
            ..ControllerSettings::default()
        };
        let supervisor = Supervisor::new(sim, settings);
        supervisor
            .spawn(WorkloadSpec {
                id: "api".to_string(),
                bounds: ReplicaBounds::new(1, 10).unwrap(),
                targets: ScalingTargets {
                    cpu: Some(0.7),
                    memory: None,
                    tolerance: 0.1,
                },
                budget: DisruptionBudget::min_available(2),
                rollout_batch_size: 1,
                simulation: None,
            })
            .await
            .unwrap();
        ApiState {
            supervisor: Arc::new(supervisor),
        }
    }

    #[tokio::test]
    async fn list_workloads_ok() {
        let state = test_state().await;
        let resp = list_workloads(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_workload_exists() {
        let state = test_state().await;
        let resp = get_workload(State(state), Path("api".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_nonexistent_workload() {
        let state = test_state().await;
        let resp = get_workload(State(state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_rollout_accepted() {
        let state = test_state().await;
        let req = RolloutRequest {
            revision: "v2".to_string(),
        };
        let resp = start_rollout(State(state), Path("api".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn duplicate_rollout_conflicts() {
        let state = test_state().await;
        for expected in [StatusCode::ACCEPTED, StatusCode::CONFLICT] {
            let req = RolloutRequest {
                revision: "v2".to_string(),
            };
            let resp = start_rollout(State(state.clone()), Path("api".to_string()), Json(req))
                .await
                .into_response();
            assert_eq!(resp.status(), expected);
        }
    }

    #[tokio::test]
    async fn empty_revision_rejected() {
        let state = test_state().await;
        let req = RolloutRequest {
            revision: " ".to_string(),
        };
        let resp = start_rollout(State(state), Path("api".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pause_without_rollout_conflicts() {
        let state = test_state().await;
        let resp = pause_rollout(State(state), Path("api".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn resume_unknown_workload() {
        let state = test_state().await;
        let resp = resume_rollout(State(state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn prometheus_metrics_ok() {
        let state = test_state().await;
        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
