use serde::{de, Deserialize, Deserializer};
use std::{fmt, str::FromStr};
use time::Date;
use utoipa::IntoParams;

use crate::{parse_date, ClimateData, Error, ObservationFilters, QualityTable};

/// Filters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClimateParams {
    /// Only observations for this location id
    #[serde(default, deserialize_with = "empty_as_none")]
    pub location_id: Option<i64>,
    /// Exclusive lower bound, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Exclusive upper bound, `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// Metric name, e.g. `temperature`
    pub metric: Option<String>,
    /// Minimum quality grade: excellent, good, questionable or poor
    pub quality_threshold: Option<String>,
    /// 1-based page number, defaults to 1
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<i64>,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Parsed but not yet resolved filters; names still need a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilters {
    pub location_id: Option<i64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub metric_name: Option<String>,
    pub quality_threshold: Option<String>,
}

impl TryFrom<&ClimateParams> for RawFilters {
    type Error = Error;

    fn try_from(params: &ClimateParams) -> Result<Self, Self::Error> {
        Ok(Self {
            location_id: params.location_id,
            start_date: parse_date_param("start_date", params.start_date.as_deref())?,
            end_date: parse_date_param("end_date", params.end_date.as_deref())?,
            metric_name: non_empty(params.metric.as_deref()),
            quality_threshold: non_empty(params.quality_threshold.as_deref()),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parse_date_param(filter: &'static str, value: Option<&str>) -> Result<Option<Date>, Error> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .map_err(|_| Error::validation(filter, format!("`{}` is not a YYYY-MM-DD date", raw))),
    }
}

/// Translates user-facing names into the ids and ranks the query builder binds.
pub struct FilterResolver<'a> {
    store: &'a dyn ClimateData,
    quality: &'a QualityTable,
}

impl<'a> FilterResolver<'a> {
    pub fn new(store: &'a dyn ClimateData, quality: &'a QualityTable) -> Self {
        Self { store, quality }
    }

    pub async fn resolve(&self, raw: &RawFilters) -> Result<ObservationFilters, Error> {
        let metric_id = match &raw.metric_name {
            Some(name) => Some(self.resolve_metric(name).await?),
            None => None,
        };
        let quality_order = match &raw.quality_threshold {
            Some(name) => Some(self.resolve_quality(name)?),
            None => None,
        };

        Ok(ObservationFilters {
            location_id: raw.location_id,
            start_date: raw.start_date,
            end_date: raw.end_date,
            metric_id,
            quality_order,
        })
    }

    pub async fn resolve_metric(&self, name: &str) -> Result<i64, Error> {
        let ids = self.store.metric_ids_by_name(name).await?;
        match ids.as_slice() {
            [id] => Ok(*id),
            [] => Err(Error::validation(
                "metric",
                format!("unknown metric `{}`", name),
            )),
            _ => Err(Error::AmbiguousFilter {
                filter: "metric",
                value: name.to_owned(),
                matches: ids.len(),
            }),
        }
    }

    pub fn resolve_quality(&self, name: &str) -> Result<i64, Error> {
        self.quality.resolve_order(name).ok_or_else(|| {
            Error::validation(
                "quality_threshold",
                format!("unknown quality grade `{}`", name),
            )
        })
    }
}
