//! Business metrics for the gamification platform.
//!
//! The report is a fixed list of independent COUNT sub-queries. They run
//! concurrently, each on its own pooled connection, and a failing sub-query
//! only marks its own entry.

use crate::db::StatementExecutor;
use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

/// Value recorded when a sub-query fails.
pub const METRIC_ERROR_MARKER: &str = "Table not found or query error";

/// One named sub-query of the report.
#[derive(Debug, Clone, Copy)]
pub struct MetricQuery {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Sub-queries of `get_business_metrics`, in report order.
pub const BUSINESS_METRICS: &[MetricQuery] = &[
    MetricQuery {
        name: "total_users",
        sql: "SELECT COUNT(*) AS count FROM users",
    },
    MetricQuery {
        name: "active_stations",
        sql: "SELECT COUNT(*) AS count FROM gas_stations WHERE active = true",
    },
    MetricQuery {
        name: "total_coupons_generated",
        sql: "SELECT COUNT(*) AS count FROM coupons",
    },
    MetricQuery {
        name: "total_redemptions",
        sql: "SELECT COUNT(*) AS count FROM redemptions",
    },
    MetricQuery {
        name: "weekly_raffle_participants",
        sql: "SELECT COUNT(DISTINCT user_id) AS count FROM raffle_entries WHERE raffle_type = 'weekly'",
    },
    MetricQuery {
        name: "annual_raffle_participants",
        sql: "SELECT COUNT(DISTINCT user_id) AS count FROM raffle_entries WHERE raffle_type = 'annual'",
    },
];

/// Result of one sub-query.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(i64),
    Error(String),
}

impl MetricValue {
    fn error() -> Self {
        MetricValue::Error(METRIC_ERROR_MARKER.to_string())
    }
}

/// Metric name to value, in declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    entries: Vec<(&'static str, MetricValue)>,
}

impl MetricsReport {
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }
}

impl Serialize for MetricsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Optional reporting window, kept exactly as the caller sent it.
///
/// The sub-queries are not filtered by it. A bound that is not a
/// `YYYY-MM-DD` date is logged and kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRange {
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        for (field, value) in [("date_from", &from), ("date_to", &to)] {
            if let Some(value) = value.as_deref().filter(|v| parse_date(v).is_none()) {
                warn!(field, value, "Reporting bound is not a YYYY-MM-DD date");
            }
        }
        Self { from, to }
    }

    /// Lower bound as a date, if it parses.
    pub fn from_date(&self) -> Option<NaiveDate> {
        self.from.as_deref().and_then(parse_date)
    }

    /// Upper bound as a date, if it parses.
    pub fn to_date(&self) -> Option<NaiveDate> {
        self.to.as_deref().and_then(parse_date)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Run every sub-query and build the report. Never fails as a whole.
pub async fn collect(executor: &StatementExecutor, queries: &[MetricQuery]) -> MetricsReport {
    let entries = join_all(queries.iter().map(|query| async move {
        (query.name, evaluate(executor, query).await)
    }))
    .await;

    MetricsReport { entries }
}

async fn evaluate(executor: &StatementExecutor, query: &MetricQuery) -> MetricValue {
    match executor.execute_query(query.sql, &[]).await {
        Ok(rows) => {
            let Some(row) = rows.first() else {
                return MetricValue::Count(0);
            };
            match row.get("count").or_else(|| row.values().next()) {
                Some(value) => match value.as_i64() {
                    Some(count) => MetricValue::Count(count),
                    None => {
                        warn!(metric = query.name, value = %value, "Metric is not an integer");
                        MetricValue::error()
                    }
                },
                None => MetricValue::Count(0),
            }
        }
        Err(e) => {
            debug!(metric = query.name, error = %e, "Metric sub-query failed");
            MetricValue::error()
        }
    }
}
