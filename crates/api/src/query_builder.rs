//! Composes parameterized observation queries from the filters a request supplies.
//!
//! Filters become a list of typed predicates first; SQL text is rendered once from
//! that list. Filter values only ever travel in [`QuerySpec::params`].

use std::{fmt, sync::LazyLock};

use regex::Regex;
use scooby::postgres::{select, Parameters};
use time::{format_description::BorrowedFormatItem, macros::format_description, Date};

use crate::Error;

pub const DEFAULT_PAGE_SIZE: i64 = 50;

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const JOINED_TABLES: &str = "climate_data AS cd \
     LEFT JOIN location AS l ON l.id = cd.location_id \
     LEFT JOIN metric AS m ON m.id = cd.metric_id \
     LEFT JOIN quality AS q ON q.id = cd.quality_id";

const RECORD_COLUMNS: &str = "cd.id, cd.location_id, l.name, l.latitude, l.longitude, \
     cd.date, m.name, cd.value, m.unit, q.name";

const SERIES_COLUMNS: &str = "cd.id, cd.date, cd.value, q.name";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    LocationId,
    ObservationDate,
    MetricId,
    MetricName,
    QualityOrder,
}

impl Column {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Column::LocationId => "l.id",
            Column::ObservationDate => "cd.date",
            Column::MetricId => "m.id",
            Column::MetricName => "name",
            Column::QualityOrder => "q.sort_order",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    LtEq,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Int(v) => write!(f, "{}", v),
            BindValue::Text(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: Column,
    pub operator: Operator,
    pub value: BindValue,
}

impl Predicate {
    pub fn new(column: Column, operator: Operator, value: BindValue) -> Self {
        Self {
            column,
            operator,
            value,
        }
    }
}

/// Filters after name resolution; `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFilters {
    pub location_id: Option<i64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub metric_id: Option<i64>,
    pub quality_order: Option<i64>,
}

impl ObservationFilters {
    /// Same constraints, narrowed to a single metric.
    pub fn for_metric(&self, metric_id: i64) -> Self {
        Self {
            metric_id: Some(metric_id),
            ..self.clone()
        }
    }

    /// One predicate per present filter, in location, start, end, metric, quality order.
    /// Date bounds are exclusive, the quality bound is inclusive.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(location_id) = self.location_id {
            predicates.push(Predicate::new(
                Column::LocationId,
                Operator::Eq,
                BindValue::Int(location_id),
            ));
        }
        if let Some(start) = self.start_date {
            predicates.push(Predicate::new(
                Column::ObservationDate,
                Operator::Gt,
                BindValue::Text(format_date(start)),
            ));
        }
        if let Some(end) = self.end_date {
            predicates.push(Predicate::new(
                Column::ObservationDate,
                Operator::Lt,
                BindValue::Text(format_date(end)),
            ));
        }
        if let Some(metric_id) = self.metric_id {
            predicates.push(Predicate::new(
                Column::MetricId,
                Operator::Eq,
                BindValue::Int(metric_id),
            ));
        }
        if let Some(quality_order) = self.quality_order {
            predicates.push(Predicate::new(
                Column::QualityOrder,
                Operator::LtEq,
                BindValue::Int(quality_order),
            ));
        }
        predicates
    }
}

/// A 1-based page of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: i64,
    size: i64,
    offset: i64,
}

impl Page {
    pub fn new(number: i64, size: i64) -> Result<Self, Error> {
        if number < 1 {
            return Err(Error::InvalidPagination(format!(
                "page must be 1 or greater, got {}",
                number
            )));
        }
        if size < 1 {
            return Err(Error::InvalidPagination(format!(
                "page size must be 1 or greater, got {}",
                size
            )));
        }
        let offset = (number - 1).checked_mul(size).ok_or_else(|| {
            Error::InvalidPagination(format!("page {} is out of range", number))
        })?;
        Ok(Self {
            number,
            size,
            offset,
        })
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// Executable SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QuerySpec {
    fn finish(sql: String, params: Vec<BindValue>) -> Self {
        // scooby numbers placeholders postgres-style; sqlite wants them positional
        let sql = PLACEHOLDER.replace_all(&sql, "?").into_owned();
        Self { sql, params }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationQuery {
    pub select: QuerySpec,
    pub count: QuerySpec,
}

/// Paginated record query plus a count query sharing its joins and predicates.
pub fn build(filters: &ObservationFilters, page: &Page) -> ObservationQuery {
    let predicates = filters.predicates();

    let mut placeholders = Parameters::new();
    let mut params = Vec::with_capacity(predicates.len() + 2);
    let mut records = select(RECORD_COLUMNS).from(JOINED_TABLES);
    for predicate in &predicates {
        records = records.where_(render_predicate(predicate, placeholders.next()));
        params.push(predicate.value.clone());
    }
    let limit = placeholders.next();
    let offset = placeholders.next();
    params.push(BindValue::Int(page.size()));
    params.push(BindValue::Int(page.offset()));
    let select_sql = format!(
        "{} ORDER BY cd.id LIMIT {} OFFSET {}",
        records, limit, offset
    );

    let mut placeholders = Parameters::new();
    let mut count_params = Vec::with_capacity(predicates.len());
    let mut count = select("COUNT(*)").from(JOINED_TABLES);
    for predicate in &predicates {
        count = count.where_(render_predicate(predicate, placeholders.next()));
        count_params.push(predicate.value.clone());
    }

    ObservationQuery {
        select: QuerySpec::finish(select_sql, params),
        count: QuerySpec::finish(count.to_string(), count_params),
    }
}

/// Unpaginated `(id, date, value, quality)` rows ordered oldest first, for aggregation.
pub fn build_series(filters: &ObservationFilters) -> QuerySpec {
    let mut placeholders = Parameters::new();
    let mut params = Vec::new();
    let mut series = select(SERIES_COLUMNS).from(JOINED_TABLES);
    for predicate in filters.predicates() {
        series = series.where_(render_predicate(&predicate, placeholders.next()));
        params.push(predicate.value);
    }
    QuerySpec::finish(format!("{} ORDER BY cd.date, cd.id", series), params)
}

/// Exact-name metric lookup; more than one row signals an integrity problem.
pub fn build_metric_lookup(name: &str) -> QuerySpec {
    let mut placeholders = Parameters::new();
    let predicate = Predicate::new(
        Column::MetricName,
        Operator::Eq,
        BindValue::Text(name.to_owned()),
    );
    let lookup = select("id")
        .from("metric")
        .where_(render_predicate(&predicate, placeholders.next()));
    QuerySpec::finish(lookup.to_string(), vec![predicate.value])
}

fn render_predicate(predicate: &Predicate, placeholder: impl fmt::Display) -> String {
    format!(
        "{} {} {}",
        predicate.column.as_sql(),
        predicate.operator.as_sql(),
        placeholder
    )
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value, DATE_FORMAT)
}
