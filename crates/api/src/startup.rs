use crate::{
    aggregation, db, get_climate, get_locations, get_metrics, get_summary, get_trends, routes,
    ClimateAccess, ClimateData, ClimateService, ErrorBody, TrendConfig,
};
use anyhow::anyhow;
use axum::{
    body::Body,
    extract::Request,
    middleware::{self, Next},
    response::IntoResponse,
    routing::get,
    Router,
};
use hyper::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use log::info;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

#[derive(Clone)]
pub struct AppState {
    pub climate: Arc<ClimateService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::v1::climate_routes::get_locations,
        routes::v1::climate_routes::get_metrics,
        routes::v1::climate_routes::get_climate,
        routes::v1::climate_routes::get_summary,
        routes::v1::climate_routes::get_trends,
    ),
    components(
        schemas(
                db::Location,
                db::Metric,
                db::ObservationRecord,
                aggregation::SummaryResult,
                aggregation::TrendResult,
                ErrorBody,
        )
    ),
    tags(
        (name = "climate observation api", description = "a read-only api over climate observations with quality-weighted summaries and trend analysis")
    )
)]
struct ApiDoc;

pub async fn build_app_state(db_path: &str, trend: TrendConfig) -> Result<AppState, anyhow::Error> {
    let store = ClimateAccess::new(db_path)
        .await
        .map_err(|e| anyhow!("error setting up SQLite database: {}", e))?;
    build_app_state_with(Arc::new(store), trend).await
}

/// Wires the service over any store; tests hand in mocks or in-memory pools.
pub async fn build_app_state_with(
    store: Arc<dyn ClimateData>,
    trend: TrendConfig,
) -> Result<AppState, anyhow::Error> {
    let climate = ClimateService::from_store(store, trend)
        .await
        .map_err(|e| anyhow!("error loading quality grades: {}", e))?;
    Ok(AppState {
        climate: Arc::new(climate),
    })
}

pub fn app(app_state: AppState) -> Router {
    let api_docs = ApiDoc::openapi();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/api/v1/locations", get(get_locations))
        .route("/api/v1/metrics", get(get_metrics))
        .route("/api/v1/climate", get(get_climate))
        .route("/api/v1/summary", get(get_summary))
        .route("/api/v1/trends", get(get_trends))
        .with_state(Arc::new(app_state))
        .layer(middleware::from_fn(log_request))
        .merge(Scalar::with_url("/docs", api_docs))
        .layer(cors)
}

async fn log_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let now = time::OffsetDateTime::now_utc();
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_default();
    info!(target: "http_request","new request, {} {}", request.method().as_str(), path);

    let response = next.run(request).await;
    let response_time = time::OffsetDateTime::now_utc() - now;
    info!(target: "http_response", "response, code: {}, time: {}", response.status().as_str(), response_time);

    response
}
