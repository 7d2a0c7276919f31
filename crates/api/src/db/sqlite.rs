use async_trait::async_trait;
use log::{debug, info};
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite,
};
use std::{str::FromStr, time::Duration};

use super::{ClimateData, Error, Location, Metric, ObservationRecord, SeriesPoint};
use crate::{build_metric_lookup, parse_date, BindValue, QualityGrade, QuerySpec};

/// Relational store access over a pooled sqlite database.
///
/// Every call checks a connection out of the pool for the duration of one
/// query; the guard hands it back on success and on error alike.
#[derive(Clone)]
pub struct ClimateAccess {
    pool: SqlitePool,
}

impl ClimateAccess {
    pub async fn new(db_path: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
            .create_if_missing(true)
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL")
            .pragma("busy_timeout", "5000")
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        info!("SQLite database opened at: {}", db_path);
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; the connection is never recycled
    /// so its contents live as long as the pool.
    pub async fn in_memory() -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn prepare(spec: &QuerySpec) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    debug!("executing: {} with {} params", spec.sql, spec.params.len());
    let mut query = sqlx::query(&spec.sql);
    for param in &spec.params {
        query = match param {
            BindValue::Int(value) => query.bind(*value),
            BindValue::Text(value) => query.bind(value.as_str()),
        };
    }
    query
}

fn observation_record(row: &SqliteRow) -> Result<ObservationRecord, sqlx::Error> {
    Ok(ObservationRecord {
        id: row.try_get(0)?,
        location_id: row.try_get(1)?,
        location_name: row.try_get(2)?,
        latitude: row.try_get(3)?,
        longitude: row.try_get(4)?,
        date: row.try_get(5)?,
        metric: row.try_get(6)?,
        value: row.try_get(7)?,
        unit: row.try_get(8)?,
        quality: row.try_get(9)?,
    })
}

fn series_point(row: &SqliteRow) -> Result<SeriesPoint, Error> {
    let id: i64 = row.try_get(0)?;
    let raw_date: String = row.try_get(1)?;
    let date = parse_date(&raw_date).map_err(|source| Error::InvalidDate {
        id,
        value: raw_date.clone(),
        source,
    })?;
    Ok(SeriesPoint {
        id,
        date,
        value: row.try_get(2)?,
        quality: row.try_get(3)?,
    })
}

#[async_trait]
impl ClimateData for ClimateAccess {
    async fn locations(&self) -> Result<Vec<Location>, Error> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT id, name, country, latitude, longitude, region FROM location ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    async fn metrics(&self) -> Result<Vec<Metric>, Error> {
        let metrics = sqlx::query_as::<_, Metric>(
            "SELECT id, name, display_name, unit, description FROM metric ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(metrics)
    }

    async fn quality_grades(&self) -> Result<Vec<QualityGrade>, Error> {
        let rows = sqlx::query("SELECT id, name, weight, sort_order FROM quality ORDER BY sort_order")
            .fetch_all(&self.pool)
            .await?;
        let grades = rows
            .iter()
            .map(|row| -> Result<QualityGrade, sqlx::Error> {
                Ok(QualityGrade {
                    id: row.try_get(0)?,
                    name: row.try_get(1)?,
                    weight: row.try_get(2)?,
                    order: row.try_get(3)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(grades)
    }

    async fn metric_ids_by_name(&self, name: &str) -> Result<Vec<i64>, Error> {
        let spec = build_metric_lookup(name);
        let rows = prepare(&spec).fetch_all(&self.pool).await?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>(0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn count_observations(&self, query: &QuerySpec) -> Result<i64, Error> {
        let row = prepare(query).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn observations(&self, query: &QuerySpec) -> Result<Vec<ObservationRecord>, Error> {
        let rows = prepare(query).fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(observation_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn series(&self, query: &QuerySpec) -> Result<Vec<SeriesPoint>, Error> {
        let rows = prepare(query).fetch_all(&self.pool).await?;
        rows.iter().map(series_point).collect()
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
