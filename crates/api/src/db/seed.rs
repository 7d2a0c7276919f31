//! Bulk loading of sample documents shaped `{locations, metrics, climate_data}`.
//!
//! Loading recreates the schema from scratch, so running it twice over the
//! same document leaves the database in the same state.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::Path;

use super::{Error, Location, Metric};
use crate::{format_date, parse_date, QualityTable};

const FALLBACK_QUALITY: &str = "poor";

const DROP_TABLES: [&str; 4] = [
    "DROP TABLE IF EXISTS climate_data",
    "DROP TABLE IF EXISTS quality",
    "DROP TABLE IF EXISTS location",
    "DROP TABLE IF EXISTS metric",
];

const CREATE_TABLES: [&str; 4] = [
    "CREATE TABLE quality (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        weight REAL NOT NULL,
        sort_order INTEGER NOT NULL UNIQUE
    )",
    "CREATE TABLE location (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        country TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        region TEXT NOT NULL
    )",
    "CREATE TABLE metric (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        unit TEXT NOT NULL,
        description TEXT NOT NULL
    )",
    "CREATE TABLE climate_data (
        id INTEGER PRIMARY KEY,
        location_id INTEGER NOT NULL REFERENCES location(id),
        metric_id INTEGER NOT NULL REFERENCES metric(id),
        date TEXT NOT NULL,
        value REAL NOT NULL,
        quality_id INTEGER NOT NULL REFERENCES quality(id)
    )",
];

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX idx_climate_data_location ON climate_data (location_id)",
    "CREATE INDEX idx_climate_data_metric_date ON climate_data (metric_id, date)",
    "CREATE INDEX idx_climate_data_quality ON climate_data (quality_id)",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleData {
    pub locations: Vec<Location>,
    pub metrics: Vec<Metric>,
    pub climate_data: Vec<SampleObservation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleObservation {
    pub id: i64,
    pub location_id: i64,
    pub metric_id: i64,
    pub date: String,
    pub value: f64,
    /// Grade name; missing or unknown names load as `poor`
    #[serde(default)]
    pub quality: Option<String>,
}

impl SampleData {
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub locations: usize,
    pub metrics: usize,
    pub observations: usize,
}

/// Drops and recreates every table, seeds the quality grades, then inserts the
/// document. Runs in one transaction; any failure leaves the previous data intact.
pub async fn load_sample(
    pool: &SqlitePool,
    data: &SampleData,
    quality: &QualityTable,
) -> Result<LoadSummary, Error> {
    let mut tx = pool.begin().await?;

    for statement in DROP_TABLES.iter().chain(CREATE_TABLES.iter()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    for grade in quality.grades() {
        sqlx::query("INSERT INTO quality (id, name, weight, sort_order) VALUES (?, ?, ?, ?)")
            .bind(grade.id)
            .bind(&grade.name)
            .bind(grade.weight)
            .bind(grade.order)
            .execute(&mut *tx)
            .await?;
    }

    for location in &data.locations {
        sqlx::query(
            "INSERT INTO location (id, name, country, latitude, longitude, region)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.country)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.region)
        .execute(&mut *tx)
        .await?;
    }

    for metric in &data.metrics {
        sqlx::query(
            "INSERT INTO metric (id, name, display_name, unit, description)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(metric.id)
        .bind(&metric.name)
        .bind(&metric.display_name)
        .bind(&metric.unit)
        .bind(&metric.description)
        .execute(&mut *tx)
        .await?;
    }

    for observation in &data.climate_data {
        let date = parse_date(&observation.date).map_err(|source| Error::InvalidDate {
            id: observation.id,
            value: observation.date.clone(),
            source,
        })?;
        let quality_id = quality_id_for(quality, observation)?;

        sqlx::query(
            "INSERT INTO climate_data (id, location_id, metric_id, date, value, quality_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(observation.id)
        .bind(observation.location_id)
        .bind(observation.metric_id)
        .bind(format_date(date))
        .bind(observation.value)
        .bind(quality_id)
        .execute(&mut *tx)
        .await?;
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;

    let summary = LoadSummary {
        locations: data.locations.len(),
        metrics: data.metrics.len(),
        observations: data.climate_data.len(),
    };
    info!(
        "loaded {} locations, {} metrics, {} observations",
        summary.locations, summary.metrics, summary.observations
    );
    Ok(summary)
}

fn quality_id_for(quality: &QualityTable, observation: &SampleObservation) -> Result<i64, Error> {
    if let Some(grade) = observation
        .quality
        .as_deref()
        .and_then(|name| quality.get(name))
    {
        return Ok(grade.id);
    }

    warn!(
        "observation {} has quality {:?}, loading as `{}`",
        observation.id, observation.quality, FALLBACK_QUALITY
    );
    quality
        .get(FALLBACK_QUALITY)
        .map(|grade| grade.id)
        .ok_or_else(|| Error::MissingGrade(FALLBACK_QUALITY.to_owned()))
}
