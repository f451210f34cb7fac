use serde::{Deserialize, Serialize};

/// Summary metrics for a range: created/won/lost/active counts and revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub leads_created: u64,
    pub leads_won: u64,
    pub leads_lost: u64,
    /// Created leads still open (neither won nor lost).
    pub leads_active: u64,
    /// Won / created, as a percentage rounded to 4 decimals.
    pub conversion_rate: f64,
    pub revenue_won: f64,
    /// Revenue per won lead, rounded to 2 decimals.
    pub avg_ticket: f64,
    /// Not computed; always null.
    pub avg_first_touch_seconds: Option<f64>,
}

/// One funnel row: leads grouped by stage label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage_name: String,
    pub count: u64,
    pub value_sum: f64,
}

/// One day of a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// `YYYY-MM-DD` in the bucketing offset.
    pub date: String,
    pub value: f64,
}

/// Open tasks by urgency. Buckets are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBuckets {
    pub overdue: u64,
    pub today: u64,
    pub next48h: u64,
}

/// Time series selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    LeadsCreated,
    LeadsWon,
    RevenueWon,
    /// Any other selector; yields an all-zero series.
    Unsupported,
}

impl SeriesMetric {
    pub fn parse(s: &str) -> Self {
        match s {
            "leads_created" => SeriesMetric::LeadsCreated,
            "leads_won" => SeriesMetric::LeadsWon,
            "revenue_won" => SeriesMetric::RevenueWon,
            _ => SeriesMetric::Unsupported,
        }
    }
}
