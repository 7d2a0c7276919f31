mod seed;
mod sqlite;

pub use seed::*;
pub use sqlite::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::Date;
use utoipa::ToSchema;

use crate::{QualityGrade, QuerySpec};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to query sqlite: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Invalid date `{value}` on observation {id}: {source}")]
    InvalidDate {
        id: i64,
        value: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("Quality grade `{0}` is not seeded")]
    MissingGrade(String),
    #[error("Failed to read sample data: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse sample data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Metric {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub unit: String,
    pub description: String,
}

/// Flat observation row with its dimension attributes joined in.
/// Dimension fields are `None` when the referenced row is missing.
/// `location_id` is the observation's own column, while the location filter
/// matches the joined location row, so a record whose location row is missing
/// never matches `?location_id=`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ObservationRecord {
    pub id: i64,
    pub location_id: i64,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    pub metric: Option<String>,
    pub value: f64,
    pub unit: Option<String>,
    pub quality: Option<String>,
}

/// One point of a metric's time series, as consumed by the aggregation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub id: i64,
    pub date: Date,
    pub value: f64,
    pub quality: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClimateData: Send + Sync {
    async fn locations(&self) -> Result<Vec<Location>, Error>;
    async fn metrics(&self) -> Result<Vec<Metric>, Error>;
    async fn quality_grades(&self) -> Result<Vec<QualityGrade>, Error>;
    /// Ids of every metric whose name matches exactly.
    async fn metric_ids_by_name(&self, name: &str) -> Result<Vec<i64>, Error>;
    async fn count_observations(&self, query: &QuerySpec) -> Result<i64, Error>;
    async fn observations(&self, query: &QuerySpec) -> Result<Vec<ObservationRecord>, Error>;
    async fn series(&self, query: &QuerySpec) -> Result<Vec<SeriesPoint>, Error>;
    async fn health_check(&self) -> Result<(), Error>;
}
