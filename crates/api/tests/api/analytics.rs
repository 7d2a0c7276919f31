use crate::helpers::{base_sample, daily_series, observation, spawn_seeded_app};
use axum::http::StatusCode;
use climate_api::SampleData;

fn summary_sample() -> SampleData {
    let mut data = base_sample();
    data.climate_data = vec![
        observation(1, 1, 1, "2024-01-15", 10.0, "excellent"),
        observation(2, 1, 1, "2024-02-15", 20.0, "poor"),
    ];
    data
}

#[tokio::test]
async fn summary_weights_values_by_quality() {
    let test_app = spawn_seeded_app(&summary_sample()).await;

    let (status, body) = test_app.get("/api/v1/summary?metric=temperature").await;
    assert_eq!(status, StatusCode::OK);

    let temperature = &body["data"]["temperature"];
    assert_eq!(temperature["status"], "ok");
    let avg = temperature["weightedAvg"].as_f64().unwrap();
    assert!((avg - 12.31).abs() < 0.01, "got {}", avg);
    assert_eq!(temperature["weightedMin"], 10.0);
    assert_eq!(temperature["weightedMax"], 20.0);
    assert_eq!(temperature["qualityDistribution"]["excellent"], 0.5);
    assert_eq!(temperature["qualityDistribution"]["poor"], 0.5);
    assert_eq!(temperature["sampleCount"], 2);
    assert!(body["data"].get("rainfall").is_none());
}

#[tokio::test]
async fn summary_without_metric_covers_every_metric() {
    let test_app = spawn_seeded_app(&summary_sample()).await;

    let (status, body) = test_app.get("/api/v1/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["temperature"]["status"], "ok");
    assert_eq!(body["data"]["rainfall"]["status"], "no_data");
}

#[tokio::test]
async fn summary_respects_quality_threshold() {
    let test_app = spawn_seeded_app(&summary_sample()).await;

    let (_, body) = test_app
        .get("/api/v1/summary?metric=temperature&quality_threshold=excellent")
        .await;
    let temperature = &body["data"]["temperature"];
    assert_eq!(temperature["weightedAvg"], 10.0);
    assert_eq!(temperature["qualityDistribution"]["excellent"], 1.0);
    assert_eq!(temperature["sampleCount"], 1);
}

#[tokio::test]
async fn summary_of_an_empty_range_has_no_data() {
    let test_app = spawn_seeded_app(&summary_sample()).await;

    let (status, body) = test_app
        .get("/api/v1/summary?metric=temperature&start_date=2025-01-01")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["temperature"],
        serde_json::json!({"status": "no_data"})
    );
}

#[tokio::test]
async fn trends_report_direction_and_confidence() {
    let mut data = base_sample();
    data.climate_data = daily_series(1, 1, 60, &["excellent", "good"], |day| {
        10.0 + day as f64 * 0.5
    });
    let test_app = spawn_seeded_app(&data).await;

    let (status, body) = test_app.get("/api/v1/trends").await;
    assert_eq!(status, StatusCode::OK);

    let temperature = &body["data"]["temperature"];
    assert_eq!(temperature["status"], "ok");
    assert_eq!(temperature["direction"], "increasing");
    let slope = temperature["rateOfChange"].as_f64().unwrap();
    assert!((slope - 0.5).abs() < 1e-6, "got {}", slope);
    assert_eq!(temperature["anomalies"], serde_json::json!([]));
    assert_eq!(temperature["seasonality"]["status"], "insufficient_data");
    let confidence = temperature["confidence"].as_f64().unwrap();
    assert!((confidence - 60.0 / 70.0).abs() < 1e-6, "got {}", confidence);

    assert_eq!(body["data"]["rainfall"]["status"], "no_data");
}

#[tokio::test]
async fn trends_flag_outliers() {
    let mut data = base_sample();
    data.climate_data = daily_series(1, 2, 30, &["good"], |day| if day == 20 { 250.0 } else { 2.0 });
    let test_app = spawn_seeded_app(&data).await;

    let (_, body) = test_app.get("/api/v1/trends?metric=rainfall").await;
    let anomalies = body["data"]["rainfall"]["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["id"], 21);
    assert_eq!(anomalies[0]["date"], "2023-01-21");
    assert!(anomalies[0]["zScore"].as_f64().unwrap() > 2.0);
}

#[tokio::test]
async fn trends_reject_unknown_metrics() {
    let test_app = spawn_seeded_app(&summary_sample()).await;

    let (status, body) = test_app.get("/api/v1/trends?metric=humidity").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("humidity"));
}
