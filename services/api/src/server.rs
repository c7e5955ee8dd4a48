use crate::cli::ServeArgs;
use crate::infra::{load_routing_table, AppState, InMemoryLeadRepository};
use crate::routes::with_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use leadgen::config::AppConfig;
use leadgen::error::AppError;
use leadgen::telemetry;
use leadgen::workflows::leads::LeadIntakeService;
use leadgen::workflows::routing::{InMemoryRuleStore, RoutingEngine, RoutingPolicy};
use leadgen::workflows::subdomain::SubdomainResolver;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let table = load_routing_table(&config.routing)?;
    let store = Arc::new(InMemoryRuleStore::new(table)?);
    let engine = Arc::new(RoutingEngine::new(
        store.clone(),
        RoutingPolicy::from(&config.routing),
    ));
    let intake = Arc::new(LeadIntakeService::new(
        Arc::new(InMemoryLeadRepository::default()),
        engine.clone(),
        config.intake,
    ));
    let resolver = Arc::new(SubdomainResolver::new(store, config.base_domain.clone()));

    let app = with_routes(intake, engine, resolver)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        county_matching = config.routing.county_matching,
        "lead routing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
