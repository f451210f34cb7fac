pub mod types;

pub use types::*;

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset};

use crate::date_util::{day_key, from_epoch, round_to};
use crate::models::{Lead, Task};
use crate::query::range::{TimeRange, MAX_RANGE_DAYS};

/// Summary metrics from leads created in a range and leads closed in it.
pub fn compute_summary(created: &[Lead], closed: &[Lead]) -> SummaryMetrics {
    let leads_created = created.len() as u64;
    let won: Vec<&Lead> = closed.iter().filter(|l| l.is_won()).collect();
    let leads_won = won.len() as u64;
    let leads_lost = closed.iter().filter(|l| l.is_lost()).count() as u64;
    let leads_active = created
        .iter()
        .filter(|l| !l.is_won() && !l.is_lost())
        .count() as u64;

    let revenue_won: f64 = won.iter().map(|l| l.price()).sum();

    let conversion_rate = if leads_created == 0 {
        0.0
    } else {
        round_to(leads_won as f64 / leads_created as f64 * 100.0, 4)
    };
    let avg_ticket = if leads_won == 0 {
        0.0
    } else {
        round_to(revenue_won / leads_won as f64, 2)
    };

    SummaryMetrics {
        leads_created,
        leads_won,
        leads_lost,
        leads_active,
        conversion_rate,
        revenue_won,
        avg_ticket,
        avg_first_touch_seconds: None,
    }
}

/// Group leads by stage label in first-seen order.
pub fn compute_funnel(leads: &[Lead]) -> Vec<FunnelStage> {
    let mut stages: Vec<FunnelStage> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for lead in leads {
        let name = lead.stage_name();
        let idx = match index.get(&name) {
            Some(&idx) => idx,
            None => {
                index.insert(name.clone(), stages.len());
                stages.push(FunnelStage {
                    stage_name: name,
                    count: 0,
                    value_sum: 0.0,
                });
                stages.len() - 1
            }
        };
        stages[idx].count += 1;
        stages[idx].value_sum += lead.price();
    }

    stages
}

/// Zero-filled series with one point per day from `range.start`, covering
/// `range.day_count()` days, at most [`MAX_RANGE_DAYS`]. Empty for empty or
/// inverted ranges.
pub fn empty_series(range: &TimeRange) -> Vec<SeriesPoint> {
    (0..range.day_count().min(MAX_RANGE_DAYS))
        .map(|i| SeriesPoint {
            date: day_key(range.start + Duration::days(i)),
            value: 0.0,
        })
        .collect()
}

/// Daily series for `metric`.
///
/// `leads` are the created leads for [`SeriesMetric::LeadsCreated`] and the
/// closed leads for the won metrics. Records dated outside the series are
/// dropped. Unsupported metrics yield the zero-filled series.
pub fn compute_series(metric: SeriesMetric, range: &TimeRange, leads: &[Lead]) -> Vec<SeriesPoint> {
    let mut series = empty_series(range);
    let offset = *range.start.offset();
    let index: HashMap<String, usize> = series
        .iter()
        .enumerate()
        .map(|(i, p)| (p.date.clone(), i))
        .collect();

    let mut bump = |ts: Option<i64>, amount: f64| {
        let Some(date) = ts.and_then(|secs| from_epoch(secs, offset)).map(day_key) else {
            return;
        };
        match index.get(&date) {
            Some(&i) => series[i].value += amount,
            None => log::trace!("dropping record dated {date} outside series"),
        }
    };

    match metric {
        SeriesMetric::LeadsCreated => {
            for lead in leads {
                bump(lead.created_at, 1.0);
            }
        }
        SeriesMetric::LeadsWon => {
            for lead in leads.iter().filter(|l| l.is_won()) {
                bump(lead.closed_at, 1.0);
            }
        }
        SeriesMetric::RevenueWon => {
            for lead in leads.iter().filter(|l| l.is_won()) {
                bump(lead.closed_at, lead.price());
            }
        }
        SeriesMetric::Unsupported => {}
    }

    series
}

/// Classify open tasks as overdue, due today, or due within 48 hours.
///
/// First match wins in that order. Tasks without a due time, or due later
/// than 48 hours from `now` on another day, are not counted. "Today" is the
/// calendar date of `now` in its offset.
pub fn compute_task_buckets(tasks: &[Task], now: DateTime<FixedOffset>) -> TaskBuckets {
    let offset = *now.offset();
    let today = now.date_naive();
    let horizon = now + Duration::hours(48);
    let mut buckets = TaskBuckets::default();

    for task in tasks {
        let Some(due) = task.complete_till.and_then(|secs| from_epoch(secs, offset)) else {
            continue;
        };
        if due < now {
            buckets.overdue += 1;
        } else if due.date_naive() == today {
            buckets.today += 1;
        } else if due < horizon {
            buckets.next48h += 1;
        }
    }

    buckets
}
