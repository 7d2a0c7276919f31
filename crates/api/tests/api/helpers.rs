use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use climate_api::{
    app, build_app_state_with, db, load_sample, AppState, ClimateAccess, ClimateData,
    ClimateService, Location, Metric, ObservationRecord, QualityGrade, QualityTable, QuerySpec,
    SampleData, SampleObservation, SeriesPoint, TrendConfig,
};
use hyper::Method;
use mockall::mock;
use serde_json::Value;
use std::sync::Arc;
use time::{macros::date, Duration};
use tower::ServiceExt;

mock! {
    pub ClimateStore {}
    #[async_trait]
    impl ClimateData for ClimateStore {
        async fn locations(&self) -> Result<Vec<Location>, db::Error>;
        async fn metrics(&self) -> Result<Vec<Metric>, db::Error>;
        async fn quality_grades(&self) -> Result<Vec<QualityGrade>, db::Error>;
        async fn metric_ids_by_name(&self, name: &str) -> Result<Vec<i64>, db::Error>;
        async fn count_observations(&self, query: &QuerySpec) -> Result<i64, db::Error>;
        async fn observations(&self, query: &QuerySpec) -> Result<Vec<ObservationRecord>, db::Error>;
        async fn series(&self, query: &QuerySpec) -> Result<Vec<SeriesPoint>, db::Error>;
        async fn health_check(&self) -> Result<(), db::Error>;
    }
}

pub struct TestApp {
    pub app: Router,
}

/// Router over a mocked store with the default quality grades.
pub fn spawn_app(store: Arc<dyn ClimateData>) -> TestApp {
    let climate = ClimateService::new(
        store,
        Arc::new(QualityTable::seeded()),
        TrendConfig::default(),
    );
    TestApp {
        app: app(AppState {
            climate: Arc::new(climate),
        }),
    }
}

/// Router over an in-memory sqlite database loaded with `data`.
pub async fn spawn_seeded_app(data: &SampleData) -> TestApp {
    let access = ClimateAccess::in_memory().await.unwrap();
    load_sample(access.pool(), data, &QualityTable::seeded())
        .await
        .unwrap();
    let state = build_app_state_with(Arc::new(access), TrendConfig::default())
        .await
        .unwrap();
    TestApp { app: app(state) }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request.");

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }
}

pub fn location(id: i64, name: &str) -> Location {
    Location {
        id,
        name: name.to_owned(),
        country: String::from("USA"),
        latitude: 33.68,
        longitude: -117.83,
        region: String::from("California"),
    }
}

pub fn metric(id: i64, name: &str, unit: &str) -> Metric {
    Metric {
        id,
        name: name.to_owned(),
        display_name: name.to_owned(),
        unit: unit.to_owned(),
        description: format!("Daily {}", name),
    }
}

pub fn observation(
    id: i64,
    location_id: i64,
    metric_id: i64,
    date: &str,
    value: f64,
    quality: &str,
) -> SampleObservation {
    SampleObservation {
        id,
        location_id,
        metric_id,
        date: date.to_owned(),
        value,
        quality: Some(quality.to_owned()),
    }
}

/// Two locations, temperature (id 1) and rainfall (id 2), no observations.
pub fn base_sample() -> SampleData {
    SampleData {
        locations: vec![location(1, "Irvine"), location(2, "Boulder")],
        metrics: vec![
            metric(1, "temperature", "celsius"),
            metric(2, "rainfall", "mm"),
        ],
        climate_data: vec![],
    }
}

/// Daily observations for one metric, starting 2023-01-01, cycling qualities.
pub fn daily_series(
    first_id: i64,
    metric_id: i64,
    days: i64,
    qualities: &[&str],
    value: impl Fn(i64) -> f64,
) -> Vec<SampleObservation> {
    let start = date!(2023 - 01 - 01);
    (0..days)
        .map(|day| {
            let date = start + Duration::days(day);
            observation(
                first_id + day,
                (day % 2) + 1,
                metric_id,
                &climate_api::format_date(date),
                value(day),
                qualities[day as usize % qualities.len()],
            )
        })
        .collect()
}
