use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::engine::{RouteRequest, RoutingEngine};
use super::store::RuleStore;

/// Admin "test route" payload. Runs as a dry run unless `commit` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingTestRequest {
    pub postcode: String,
    #[serde(default)]
    pub town_city: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub commit: bool,
}

/// Router exposing the routing diagnostics endpoint for operators.
pub fn routing_router<S>(engine: Arc<RoutingEngine<S>>) -> Router
where
    S: RuleStore + 'static,
{
    Router::new()
        .route("/api/v1/admin/routing/test", post(test_route_handler::<S>))
        .with_state(engine)
}

pub(crate) async fn test_route_handler<S>(
    State(engine): State<Arc<RoutingEngine<S>>>,
    axum::Json(request): axum::Json<RoutingTestRequest>,
) -> Response
where
    S: RuleStore + 'static,
{
    let town_missing = request
        .town_city
        .as_deref()
        .map_or(true, |town| town.trim().is_empty());
    if request.postcode.trim().is_empty() && town_missing {
        let payload = json!({
            "error": "postcode or town_city is required",
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    }

    let route = RouteRequest::new(&request.postcode, request.town_city.as_deref())
        .with_county(request.county.as_deref());
    let result = if request.commit {
        engine.route(&route)
    } else {
        engine.dry_run_request(&route)
    };

    let payload = json!({
        "dry_run": !request.commit,
        "summary": result.summary(),
        "result": result,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}
