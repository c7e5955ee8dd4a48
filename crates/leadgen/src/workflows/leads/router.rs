use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::json;

use super::domain::{LeadId, LeadSubmission};
use super::repository::{LeadRepository, RepositoryError};
use super::service::{IntakeOutcome, LeadIntakeService, LeadServiceError};
use crate::workflows::routing::{RuleStore, StudentDirectory};

pub const UNKNOWN_CLIENT_IP: &str = "0.0.0.0";

/// Router exposing the public seller form endpoint and lead status lookups.
pub fn lead_router<R, S>(service: Arc<LeadIntakeService<R, S>>) -> Router
where
    R: LeadRepository + 'static,
    S: RuleStore + StudentDirectory + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(submit_handler::<R, S>))
        .route("/api/v1/leads/:lead_id", get(status_handler::<R, S>))
        .with_state(service)
}

pub(crate) async fn submit_handler<R, S>(
    State(service): State<Arc<LeadIntakeService<R, S>>>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<LeadSubmission>,
) -> Response
where
    R: LeadRepository + 'static,
    S: RuleStore + StudentDirectory + 'static,
{
    let client_ip = client_ip(&headers);
    match service.submit(submission, &client_ip, Utc::now()) {
        Ok(IntakeOutcome::Accepted { lead, .. }) => {
            let payload = json!({
                "success": true,
                "lead_id": lead.id,
                "assigned": lead.assigned_student_id.is_some(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(IntakeOutcome::Discarded) => {
            let payload = json!({
                "success": true,
                "lead_id": "ok",
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(LeadServiceError::Validation(errors)) => {
            let payload = json!({
                "success": false,
                "errors": errors,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(LeadServiceError::RateLimited { .. }) => {
            let payload = json!({
                "success": false,
                "message": "Please wait a moment before submitting again.",
            });
            (StatusCode::TOO_MANY_REQUESTS, axum::Json(payload)).into_response()
        }
        Err(LeadServiceError::Repository(error)) => {
            tracing::error!(error = %error, "lead submission failed");
            let payload = json!({
                "success": false,
                "message": "Something went wrong. Please try again.",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn status_handler<R, S>(
    State(service): State<Arc<LeadIntakeService<R, S>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    S: RuleStore + StudentDirectory + 'static,
{
    let id = LeadId(lead_id);
    match service.get(&id) {
        Ok(lead) => (StatusCode::OK, axum::Json(lead.status_view())).into_response(),
        Err(LeadServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "lead_id": id.0,
                "error": "lead not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

/// First `x-forwarded-for` hop, then `x-real-ip`, else `0.0.0.0`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|hop| !hop.is_empty()) {
            return first.to_string();
        }
    }

    header("x-real-ip")
        .unwrap_or(UNKNOWN_CLIENT_IP)
        .to_string()
}
