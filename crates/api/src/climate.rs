use log::{debug, warn};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    analyze_trend, build, build_series, summarize_series, ClimateData, Error, FilterResolver,
    Location, Metric, ObservationFilters, ObservationRecord, Page, QualityTable, RawFilters,
    SeriesPoint, SummaryResult, TrendConfig, TrendResult, DEFAULT_PAGE_SIZE,
};

/// One page of observation records with the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationPage {
    pub records: Vec<ObservationRecord>,
    pub total_count: i64,
    pub page: Page,
}

/// Read-side operations behind the HTTP handlers. Holds no per-request state.
pub struct ClimateService {
    store: Arc<dyn ClimateData>,
    quality: Arc<QualityTable>,
    trend: TrendConfig,
}

impl ClimateService {
    pub fn new(store: Arc<dyn ClimateData>, quality: Arc<QualityTable>, trend: TrendConfig) -> Self {
        Self {
            store,
            quality,
            trend,
        }
    }

    /// Builds the quality table from the grades stored alongside the data.
    pub async fn from_store(store: Arc<dyn ClimateData>, trend: TrendConfig) -> Result<Self, Error> {
        let grades = store.quality_grades().await?;
        let quality = if grades.is_empty() {
            warn!("no quality grades stored, using the default grades");
            QualityTable::seeded()
        } else {
            QualityTable::from_grades(grades)?
        };
        Ok(Self::new(store, Arc::new(quality), trend))
    }

    pub fn quality(&self) -> &QualityTable {
        &self.quality
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        Ok(self.store.health_check().await?)
    }

    pub async fn locations(&self) -> Result<Vec<Location>, Error> {
        Ok(self.store.locations().await?)
    }

    pub async fn metrics(&self) -> Result<Vec<Metric>, Error> {
        Ok(self.store.metrics().await?)
    }

    pub async fn observations(&self, raw: &RawFilters, page: i64) -> Result<ObservationPage, Error> {
        let page = Page::new(page, DEFAULT_PAGE_SIZE)?;
        let filters = self.resolve(raw).await?;
        let query = build(&filters, &page);
        debug!("observation query: {} {:?}", query.select.sql, query.select.params);

        let total_count = self.store.count_observations(&query.count).await?;
        let records = self.store.observations(&query.select).await?;
        Ok(ObservationPage {
            records,
            total_count,
            page,
        })
    }

    /// Weighted summary per metric; every known metric when no metric filter is given.
    pub async fn summarize(&self, raw: &RawFilters) -> Result<BTreeMap<String, SummaryResult>, Error> {
        let mut summaries = BTreeMap::new();
        for (metric, points) in self.metric_series(raw).await? {
            summaries.insert(metric, summarize_series(&points, &self.quality));
        }
        Ok(summaries)
    }

    pub async fn trends(&self, raw: &RawFilters) -> Result<BTreeMap<String, TrendResult>, Error> {
        let mut trends = BTreeMap::new();
        for (metric, points) in self.metric_series(raw).await? {
            trends.insert(metric, analyze_trend(&points, &self.trend));
        }
        Ok(trends)
    }

    async fn resolve(&self, raw: &RawFilters) -> Result<ObservationFilters, Error> {
        FilterResolver::new(self.store.as_ref(), &self.quality)
            .resolve(raw)
            .await
    }

    async fn metric_series(&self, raw: &RawFilters) -> Result<Vec<(String, Vec<SeriesPoint>)>, Error> {
        let filters = self.resolve(raw).await?;
        let targets: Vec<(String, i64)> = match (&raw.metric_name, filters.metric_id) {
            (Some(name), Some(id)) => vec![(name.clone(), id)],
            _ => self
                .store
                .metrics()
                .await?
                .into_iter()
                .map(|metric| (metric.name, metric.id))
                .collect(),
        };

        let mut series = Vec::with_capacity(targets.len());
        for (name, id) in targets {
            let query = build_series(&filters.for_metric(id));
            let points = self.store.series(&query).await?;
            debug!("metric {} has {} points", name, points.len());
            series.push((name, points));
        }
        Ok(series)
    }
}
