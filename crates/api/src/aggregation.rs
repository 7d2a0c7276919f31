//! Quality-weighted summaries and trend analysis over one metric's series.
//!
//! Everything here is pure: the caller fetches the series, these functions
//! only compute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::{format_date, QualityTable, SeriesPoint};

pub const UNKNOWN_QUALITY: &str = "unknown";
pub const DEFAULT_TREND_EPSILON: f64 = 0.001;

const MONTHS_PER_CYCLE: usize = 12;
const MIN_SEASONAL_SPAN_MONTHS: i32 = 24;
const CONFIDENCE_SAMPLE_PRIOR: f64 = 10.0;
const NEGLIGIBLE_VARIANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendConfig {
    /// Slopes with an absolute value at or below this are `stable`
    pub epsilon: f64,
    /// Population standard deviations from the mean before a point is an anomaly
    pub anomaly_sigma: f64,
    /// Minimum share of detrended variance explained by calendar month
    pub seasonality_threshold: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_TREND_EPSILON,
            anomaly_sigma: 2.0,
            seasonality_threshold: 0.5,
        }
    }
}

impl TrendConfig {
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryResult {
    Ok(MetricSummary),
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    /// Smallest value among observations with a non-zero quality weight
    pub weighted_min: Option<f64>,
    /// Largest value among observations with a non-zero quality weight
    pub weighted_max: Option<f64>,
    /// `None` when every observation carries zero weight
    pub weighted_avg: Option<f64>,
    /// Share of observations per grade name, summing to 1
    pub quality_distribution: BTreeMap<String, f64>,
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendResult {
    Ok(MetricTrend),
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    pub direction: Direction,
    /// Least-squares slope, value units per day
    pub rate_of_change: f64,
    pub anomalies: Vec<Anomaly>,
    pub seasonality: Seasonality,
    /// Between 0 and 1
    pub confidence: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: i64,
    pub date: String,
    pub value: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Seasonality {
    /// Fewer than two full yearly cycles, or a calendar month with no observations
    InsufficientData,
    NotDetected(SeasonalPattern),
    Detected(SeasonalPattern),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalPattern {
    /// Fraction of detrended variance explained by calendar-month means
    pub strength: f64,
    /// Calendar month, 1 to 12
    pub peak_month: u8,
    pub trough_month: u8,
    /// Peak monthly mean minus trough monthly mean of the detrended series
    pub amplitude: f64,
}

/// Weighted min/max/avg and grade distribution for one metric's observations.
pub fn summarize_series(points: &[SeriesPoint], quality: &QualityTable) -> SummaryResult {
    if points.is_empty() {
        return SummaryResult::NoData;
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut weighted_avg = 0.0;
    let mut weight_total = 0.0;
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;

    for point in points {
        let grade = point.quality.as_deref().and_then(|name| quality.get(name));
        let (name, weight) = match grade {
            Some(grade) => (grade.name.as_str(), grade.weight),
            None => (UNKNOWN_QUALITY, 0.0),
        };
        *counts.entry(name.to_owned()).or_default() += 1;

        if weight > 0.0 {
            // running mean stays exact for constant series
            weight_total += weight;
            weighted_avg += (weight / weight_total) * (point.value - weighted_avg);
            min = Some(min.map_or(point.value, |m| m.min(point.value)));
            max = Some(max.map_or(point.value, |m| m.max(point.value)));
        }
    }

    let total = points.len() as f64;
    SummaryResult::Ok(MetricSummary {
        weighted_min: min,
        weighted_max: max,
        weighted_avg: min
            .zip(max)
            .map(|(lo, hi)| weighted_avg.clamp(lo, hi)),
        quality_distribution: counts
            .into_iter()
            .map(|(name, count)| (name, count as f64 / total))
            .collect(),
        sample_count: points.len(),
    })
}

struct LinearFit {
    slope: f64,
    intercept: f64,
    /// False when every x is the same and no line can be fitted
    defined: bool,
}

impl LinearFit {
    fn new(xs: &[f64], ys: &[f64]) -> Self {
        let mean_x = mean(xs);
        let mean_y = mean(ys);
        let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return Self {
                slope: 0.0,
                intercept: mean_y,
                defined: false,
            };
        }
        let sxy: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum();
        let slope = sxy / sxx;
        Self {
            slope,
            intercept: mean_y - slope * mean_x,
            defined: true,
        }
    }

    fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Direction, anomalies, seasonality and confidence for one metric's observations.
pub fn analyze_trend(points: &[SeriesPoint], config: &TrendConfig) -> TrendResult {
    if points.is_empty() {
        return TrendResult::NoData;
    }

    let mut points = points.to_vec();
    points.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let first = points[0].date;
    let xs: Vec<f64> = points
        .iter()
        .map(|p| (p.date - first).whole_days() as f64)
        .collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();

    let fit = LinearFit::new(&xs, &ys);
    let residuals: Vec<f64> = xs.iter().zip(&ys).map(|(x, y)| y - fit.at(*x)).collect();

    let mean_y = mean(&ys);
    let value_variance = population_variance(&ys, mean_y);
    let residual_variance = population_variance(&residuals, 0.0);

    let direction = if fit.slope.abs() <= config.epsilon {
        Direction::Stable
    } else if fit.slope > 0.0 {
        Direction::Increasing
    } else {
        Direction::Decreasing
    };

    TrendResult::Ok(MetricTrend {
        direction,
        rate_of_change: fit.slope,
        anomalies: anomalies(&points, mean_y, value_variance.sqrt(), config.anomaly_sigma),
        seasonality: seasonality(&points, &residuals, config.seasonality_threshold),
        confidence: confidence(points.len(), &fit, residual_variance, value_variance),
        sample_count: points.len(),
    })
}

fn anomalies(points: &[SeriesPoint], mean: f64, std_dev: f64, sigma: f64) -> Vec<Anomaly> {
    if std_dev == 0.0 {
        return Vec::new();
    }
    points
        .iter()
        .filter_map(|p| {
            let z_score = (p.value - mean) / std_dev;
            (z_score.abs() > sigma).then(|| Anomaly {
                id: p.id,
                date: format_date(p.date),
                value: p.value,
                z_score,
            })
        })
        .collect()
}

fn confidence(n: usize, fit: &LinearFit, residual_variance: f64, value_variance: f64) -> f64 {
    if n < 2 || !fit.defined {
        return 0.0;
    }
    let n = n as f64;
    let size_factor = n / (n + CONFIDENCE_SAMPLE_PRIOR);
    let fit_factor = if value_variance == 0.0 {
        1.0
    } else {
        1.0 / (1.0 + residual_variance / value_variance)
    };
    size_factor * fit_factor
}

fn seasonality(points: &[SeriesPoint], detrended: &[f64], threshold: f64) -> Seasonality {
    let month_index = |p: &SeriesPoint| p.date.year() * 12 + i32::from(u8::from(p.date.month()));
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (month_index(first), month_index(last)),
        _ => return Seasonality::InsufficientData,
    };
    if last - first + 1 < MIN_SEASONAL_SPAN_MONTHS {
        return Seasonality::InsufficientData;
    }

    let mut sums = [0.0; MONTHS_PER_CYCLE];
    let mut counts = [0usize; MONTHS_PER_CYCLE];
    for (point, value) in points.iter().zip(detrended) {
        let slot = usize::from(u8::from(point.date.month())) - 1;
        sums[slot] += value;
        counts[slot] += 1;
    }
    if counts.contains(&0) {
        return Seasonality::InsufficientData;
    }

    let month_means: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, count)| sum / *count as f64)
        .collect();
    let grand_mean = mean(detrended);
    let total_ss: f64 = detrended.iter().map(|v| (v - grand_mean).powi(2)).sum();
    let between_ss: f64 = month_means
        .iter()
        .zip(&counts)
        .map(|(m, count)| *count as f64 * (m - grand_mean).powi(2))
        .sum();
    let strength = if total_ss <= NEGLIGIBLE_VARIANCE {
        0.0
    } else {
        (between_ss / total_ss).clamp(0.0, 1.0)
    };

    let (mut peak, mut trough) = (0, 0);
    for (slot, m) in month_means.iter().enumerate() {
        if *m > month_means[peak] {
            peak = slot;
        }
        if *m < month_means[trough] {
            trough = slot;
        }
    }

    let pattern = SeasonalPattern {
        strength,
        peak_month: peak as u8 + 1,
        trough_month: trough as u8 + 1,
        amplitude: month_means[peak] - month_means[trough],
    };
    if strength >= threshold {
        Seasonality::Detected(pattern)
    } else {
        Seasonality::NotDetected(pattern)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_variance(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
