pub mod cache;
pub mod client;
pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod models;
pub mod query;
pub mod server;

pub use cache::{CacheAside, CacheConfig};
pub use client::rate_limit::RetryPolicy;
pub use client::{CrmClient, HttpTransport, Transport};
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{FunnelStage, SeriesMetric, SeriesPoint, SummaryMetrics, TaskBuckets};
pub use query::range::{RangeToken, TimeRange};
pub use query::DashboardQuery;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;

use client::api_helpers;
use query::{cache_key, range};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Main entry point: fetches CRM records through the cache and aggregates
/// them into dashboard payloads.
pub struct CrmDash {
    client: CrmClient,
    cache: CacheAside,
    offset: FixedOffset,
    clock: Clock,
}

impl CrmDash {
    pub fn new(client: CrmClient, cache: CacheAside, offset: FixedOffset) -> Self {
        Self {
            client,
            cache,
            offset,
            clock: Arc::new(Utc::now),
        }
    }

    /// Build the HTTP transport, client and cache described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport =
            HttpTransport::new(&config.base_url, &config.token, config.request_timeout)?;
        let client = CrmClient::new(Arc::new(transport), config.retry.clone());
        Ok(Self::new(
            client,
            CacheAside::new(config.cache.clone()),
            config.utc_offset,
        ))
    }

    /// Replace the wall clock (for tests and replays).
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Current time in the bucketing offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        (self.clock)().with_timezone(&self.offset)
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    fn resolve_range(&self, q: &DashboardQuery) -> Result<TimeRange> {
        let range = range::resolve(q.range(), q.from(), q.to(), self.now());
        if range.exceeds_max_span() {
            return Err(Error::RangeTooLong {
                days: range.day_count(),
                max: range::MAX_RANGE_DAYS,
            });
        }
        Ok(range)
    }

    // ── Pass-through listings ─────────────────────────────────────

    pub async fn pipelines(&self) -> Result<Value> {
        self.cache
            .get_or_compute(&cache_key("pipelines", &[]), || {
                api_helpers::pipelines(&self.client)
            })
            .await
    }

    pub async fn users(&self) -> Result<Value> {
        self.cache
            .get_or_compute(&cache_key("users", &[]), || api_helpers::users(&self.client))
            .await
    }

    // ── Dashboards ────────────────────────────────────────────────

    /// Summary metrics over leads created and leads closed in the range.
    pub async fn metrics(&self, q: &DashboardQuery) -> Result<SummaryMetrics> {
        let range = self.resolve_range(q)?;
        let key = cache_key(
            "metrics",
            &[
                ("range", q.range()),
                ("from", q.from()),
                ("to", q.to()),
                ("pipeline_id", q.pipeline_id()),
                ("user_id", q.user_id()),
            ],
        );

        self.cache
            .get_or_compute(&key, || async {
                let (created, closed) = tokio::try_join!(
                    api_helpers::leads_created(&self.client, &range, q.pipeline_id(), q.user_id()),
                    api_helpers::leads_closed(&self.client, &range, q.pipeline_id(), q.user_id()),
                )?;
                log::info!(
                    "metrics over {} created / {} closed leads",
                    created.len(),
                    closed.len()
                );
                Ok(metrics::compute_summary(&created, &closed))
            })
            .await
    }

    /// Leads created in the range grouped by stage. Only the pipeline filter
    /// applies.
    pub async fn funnels(&self, q: &DashboardQuery) -> Result<Vec<FunnelStage>> {
        let range = self.resolve_range(q)?;
        let key = cache_key(
            "funnels",
            &[
                ("pipeline_id", q.pipeline_id()),
                ("range", q.range()),
                ("from", q.from()),
                ("to", q.to()),
            ],
        );

        self.cache
            .get_or_compute(&key, || async {
                let leads =
                    api_helpers::leads_created(&self.client, &range, q.pipeline_id(), None).await?;
                Ok(metrics::compute_funnel(&leads))
            })
            .await
    }

    /// Daily series for the `metric` parameter, which is required.
    pub async fn timeseries(&self, q: &DashboardQuery) -> Result<Vec<SeriesPoint>> {
        let raw_metric = q.metric().ok_or(Error::MissingParameter("metric"))?;
        let metric = SeriesMetric::parse(raw_metric);
        let range = self.resolve_range(q)?;
        let key = cache_key(
            "timeseries",
            &[
                ("metric", Some(raw_metric)),
                ("range", q.range()),
                ("from", q.from()),
                ("to", q.to()),
                ("pipeline_id", q.pipeline_id()),
                ("user_id", q.user_id()),
            ],
        );

        self.cache
            .get_or_compute(&key, || async {
                let leads = match metric {
                    SeriesMetric::LeadsCreated => {
                        api_helpers::leads_created(
                            &self.client,
                            &range,
                            q.pipeline_id(),
                            q.user_id(),
                        )
                        .await?
                    }
                    SeriesMetric::LeadsWon | SeriesMetric::RevenueWon => {
                        api_helpers::leads_closed(
                            &self.client,
                            &range,
                            q.pipeline_id(),
                            q.user_id(),
                        )
                        .await?
                    }
                    SeriesMetric::Unsupported => {
                        log::debug!("unsupported series metric {raw_metric:?}, returning zeros");
                        Vec::new()
                    }
                };
                Ok(metrics::compute_series(metric, &range, &leads))
            })
            .await
    }

    /// Open tasks by urgency, optionally for one responsible user.
    pub async fn tasks(&self, q: &DashboardQuery) -> Result<TaskBuckets> {
        let key = cache_key("tasks", &[("user_id", q.user_id())]);

        self.cache
            .get_or_compute(&key, || async {
                let tasks = api_helpers::incomplete_tasks(&self.client, q.user_id()).await?;
                Ok(metrics::compute_task_buckets(&tasks, self.now()))
            })
            .await
    }
}
