use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use utoipa::ToSchema;

use crate::{
    AppState, ClimateParams, Error, ErrorBody, Location, Metric, ObservationRecord, RawFilters,
    SummaryResult, TrendResult,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationsResponse {
    pub data: Vec<Location>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    pub data: Vec<Metric>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ObservationsResponse {
    pub data: Vec<ObservationRecord>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PageMeta {
    /// Rows matching the filters across every page
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    /// Keyed by metric name
    pub data: BTreeMap<String, SummaryResult>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendsResponse {
    /// Keyed by metric name
    pub data: BTreeMap<String, TrendResult>,
}

fn filters(
    params: Result<Query<ClimateParams>, QueryRejection>,
) -> Result<(RawFilters, ClimateParams), Error> {
    let Query(params) = params.map_err(|e| Error::validation("query", e.body_text()))?;
    let raw = RawFilters::try_from(&params)?;
    Ok((raw, params))
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    responses(
        (status = OK, description = "Every known location", body = LocationsResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query locations", body = ErrorBody)
    ))]
pub async fn get_locations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LocationsResponse>, Error> {
    let data = state.climate.locations().await?;
    Ok(Json(LocationsResponse { data }))
}

#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    responses(
        (status = OK, description = "Every known metric", body = MetricsResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query metrics", body = ErrorBody)
    ))]
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Json<MetricsResponse>, Error> {
    let data = state.climate.metrics().await?;
    Ok(Json(MetricsResponse { data }))
}

#[utoipa::path(
    get,
    path = "/api/v1/climate",
    params(ClimateParams),
    responses(
        (status = OK, description = "One page of filtered observations", body = ObservationsResponse),
        (status = BAD_REQUEST, description = "Malformed or unknown filter value", body = ErrorBody),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query observations", body = ErrorBody)
    ))]
pub async fn get_climate(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ClimateParams>, QueryRejection>,
) -> Result<Json<ObservationsResponse>, Error> {
    let (raw, params) = filters(params)?;
    let page = state
        .climate
        .observations(&raw, params.page.unwrap_or(1))
        .await?;

    Ok(Json(ObservationsResponse {
        data: page.records,
        meta: PageMeta {
            total_count: page.total_count,
            page: page.page.number(),
            per_page: page.page.size(),
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/summary",
    params(ClimateParams),
    responses(
        (status = OK, description = "Quality-weighted summary per metric", body = SummaryResponse),
        (status = BAD_REQUEST, description = "Malformed or unknown filter value", body = ErrorBody),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query observations", body = ErrorBody)
    ))]
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ClimateParams>, QueryRejection>,
) -> Result<Json<SummaryResponse>, Error> {
    let (raw, _) = filters(params)?;
    let data = state.climate.summarize(&raw).await?;
    Ok(Json(SummaryResponse { data }))
}

#[utoipa::path(
    get,
    path = "/api/v1/trends",
    params(ClimateParams),
    responses(
        (status = OK, description = "Direction, anomalies, seasonality and confidence per metric", body = TrendsResponse),
        (status = BAD_REQUEST, description = "Malformed or unknown filter value", body = ErrorBody),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query observations", body = ErrorBody)
    ))]
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ClimateParams>, QueryRejection>,
) -> Result<Json<TrendsResponse>, Error> {
    let (raw, _) = filters(params)?;
    let data = state.climate.trends(&raw).await?;
    Ok(Json(TrendsResponse { data }))
}
