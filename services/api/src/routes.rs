use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use leadgen::workflows::leads::{lead_router, LeadIntakeService, LeadRepository};
use leadgen::workflows::routing::{routing_router, RoutingEngine, RuleStore, StudentDirectory};
use leadgen::workflows::subdomain::{subdomain_router, SubdomainResolver};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_routes<R, S>(
    intake: Arc<LeadIntakeService<R, S>>,
    engine: Arc<RoutingEngine<S>>,
    resolver: Arc<SubdomainResolver<S>>,
) -> axum::Router
where
    R: LeadRepository + 'static,
    S: RuleStore + StudentDirectory + 'static,
{
    lead_router(intake)
        .merge(routing_router(engine))
        .merge(subdomain_router(resolver))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
