use crate::helpers::{base_sample, daily_series, spawn_app, spawn_seeded_app, MockClimateStore};
use axum::http::StatusCode;
use climate_api::{db, SampleData, DEFAULT_PAGE_SIZE};
use std::{collections::HashSet, sync::Arc};

fn paging_sample() -> SampleData {
    let mut data = base_sample();
    data.climate_data.extend(daily_series(
        1,
        1,
        240,
        &["excellent", "good", "questionable", "poor"],
        |day| 15.0 + day as f64 * 0.01,
    ));
    data.climate_data
        .extend(daily_series(1000, 2, 30, &["excellent"], |day| day as f64));
    data
}

#[tokio::test]
async fn lists_locations_and_metrics() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let (status, body) = test_app.get("/api/v1/locations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["name"], "Irvine");
    assert_eq!(body["data"][0]["region"], "California");

    let (status, body) = test_app.get("/api/v1/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["temperature", "rainfall"]);
    assert_eq!(body["data"][1]["unit"], "mm");
}

#[tokio::test]
async fn pages_filtered_observations_with_total_count() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let (status, body) = test_app
        .get("/api/v1/climate?metric=temperature&quality_threshold=good&page=1")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total_count"], 120);
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["per_page"], DEFAULT_PAGE_SIZE);

    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 50);
    for record in records {
        let quality = record["quality"].as_str().unwrap();
        assert!(quality == "excellent" || quality == "good", "got {}", quality);
        assert_eq!(record["metric"], "temperature");
        assert_eq!(record["unit"], "celsius");
    }

    let (_, last) = test_app
        .get("/api/v1/climate?metric=temperature&quality_threshold=good&page=3")
        .await;
    assert_eq!(last["data"].as_array().unwrap().len(), 20);
    assert_eq!(last["meta"]["total_count"], 120);
}

#[tokio::test]
async fn pages_never_repeat_records() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let mut seen = HashSet::new();
    for page in 1..=6 {
        let (_, body) = test_app
            .get(&format!("/api/v1/climate?page={}", page))
            .await;
        for record in body["data"].as_array().unwrap() {
            assert!(seen.insert(record["id"].as_i64().unwrap()));
        }
        assert_eq!(body["meta"]["total_count"], 270);
    }
    assert_eq!(seen.len(), 270);
}

#[tokio::test]
async fn date_bounds_are_exclusive() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let (status, body) = test_app
        .get("/api/v1/climate?metric=temperature&start_date=2023-01-01&end_date=2023-01-05")
        .await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2023-01-02", "2023-01-03", "2023-01-04"]);
    assert_eq!(body["meta"]["total_count"], 3);
}

#[tokio::test]
async fn filters_by_location() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let (_, body) = test_app
        .get("/api/v1/climate?location_id=2&metric=rainfall")
        .await;
    assert_eq!(body["meta"]["total_count"], 15);
    for record in body["data"].as_array().unwrap() {
        assert_eq!(record["location_id"], 2);
        assert_eq!(record["location_name"], "Boulder");
    }
}

#[tokio::test]
async fn empty_filter_values_are_ignored() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let (status, body) = test_app
        .get("/api/v1/climate?metric=&quality_threshold=&location_id=&page=")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total_count"], 270);
    assert_eq!(body["meta"]["page"], 1);
}

#[tokio::test]
async fn unknown_metric_is_a_bad_request() {
    let mut store = MockClimateStore::new();
    store
        .expect_metric_ids_by_name()
        .withf(|name| name == "temprature")
        .times(1)
        .returning(|_| Ok(vec![]));
    store.expect_count_observations().never();
    store.expect_observations().never();

    let test_app = spawn_app(Arc::new(store));
    let (status, body) = test_app.get("/api/v1/climate?metric=temprature").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("metric"), "got {}", message);
}

#[tokio::test]
async fn unknown_quality_threshold_is_a_bad_request() {
    let mut store = MockClimateStore::new();
    store.expect_count_observations().never();

    let test_app = spawn_app(Arc::new(store));
    let (status, body) = test_app
        .get("/api/v1/climate?quality_threshold=pristine")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("quality_threshold"));
}

#[tokio::test]
async fn malformed_dates_and_pages_are_bad_requests() {
    let test_app = spawn_app(Arc::new(MockClimateStore::new()));

    let (status, body) = test_app.get("/api/v1/climate?start_date=01-02-2024").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("start_date"));

    let (status, _) = test_app.get("/api/v1/climate?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = test_app.get("/api/v1/climate?page=first").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn storage_failures_hide_query_details() {
    let mut store = MockClimateStore::new();
    store
        .expect_count_observations()
        .returning(|_| Err(db::Error::Query(sqlx::Error::PoolTimedOut)));

    let test_app = spawn_app(Arc::new(store));
    let (status, body) = test_app.get("/api/v1/climate").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert_eq!(message, "failed to query climate data");
    assert!(!message.contains("SELECT"));
}

#[tokio::test]
async fn duplicate_metric_names_are_integrity_failures() {
    let mut store = MockClimateStore::new();
    store
        .expect_metric_ids_by_name()
        .returning(|_| Ok(vec![1, 2]));

    let test_app = spawn_app(Arc::new(store));
    let (status, body) = test_app.get("/api/v1/summary?metric=temperature").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "data integrity violation");
}

#[tokio::test]
async fn hostile_filter_values_do_not_alter_the_query() {
    let test_app = spawn_seeded_app(&paging_sample()).await;

    let (status, _) = test_app
        .get("/api/v1/climate?metric=temperature%27%3B%20DROP%20TABLE%20climate_data%3B%20--")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = test_app.get("/api/v1/climate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total_count"], 270);
}

#[tokio::test]
async fn serves_api_docs() {
    let test_app = spawn_app(Arc::new(MockClimateStore::new()));
    let (status, _) = test_app.get("/docs").await;
    assert_eq!(status, StatusCode::OK);
}
