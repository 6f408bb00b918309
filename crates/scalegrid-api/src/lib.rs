//! scalegrid-api — REST API for the scalegrid controller.
//!
//! Status queries read the snapshot each reconcile loop publishes after
//! its last completed cycle. Rollout commands are forwarded to the loop
//! and answered between cycles.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/workloads` | List workload status snapshots |
//! | GET | `/api/v1/workloads/{id}` | Get one workload's status |
//! | POST | `/api/v1/workloads/{id}/rollout` | Start a rolling update |
//! | POST | `/api/v1/workloads/{id}/rollout/pause` | Pause the rolling update |
//! | POST | `/api/v1/workloads/{id}/rollout/resume` | Resume the rolling update |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/health` | Liveness / readiness check |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use scalegrid_reconciler::Supervisor;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub supervisor: Arc<Supervisor>,
}

/// Build the complete API router (REST + metrics + health).
pub fn build_router(supervisor: Arc<Supervisor>) -> Router {
    let state = ApiState { supervisor };

    let api_routes = Router::new()
        .route("/workloads", get(handlers::list_workloads))
        .route("/workloads/{id}", get(handlers::get_workload))
        .route("/workloads/{id}/rollout", post(handlers::start_rollout))
        .route("/workloads/{id}/rollout/pause", post(handlers::pause_rollout))
        .route("/workloads/{id}/rollout/resume", post(handlers::resume_rollout))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
        .route("/health", get(handlers::health))
}
