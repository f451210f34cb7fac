use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use url::Url;

use crate::cache::CacheConfig;
use crate::client::rate_limit::RetryPolicy;
use crate::error::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration, assembled by the binary from flags and environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// CRM API root, e.g. `https://example.amocrm.ru/api/v4/`.
    pub base_url: String,
    /// Long-lived bearer token.
    pub token: String,
    /// Offset used for calendar days (ranges, series buckets, "today" tasks).
    pub utc_offset: FixedOffset,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Config {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: token.to_string(),
            utc_offset: Utc.fix(),
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("CRM token is empty".into()));
        }
        self.crm_origin().map(|_| ())
    }

    /// `scheme://host[:port]` of the CRM, used to scope which pages may
    /// embed the dashboard.
    pub fn crm_origin(&self) -> Result<String> {
        let url = Url::parse(&self.base_url)?;
        match url.origin() {
            url::Origin::Tuple(..) => Ok(url.origin().ascii_serialization()),
            url::Origin::Opaque(_) => Err(Error::Config(format!(
                "base URL has no origin: {}",
                self.base_url
            ))),
        }
    }
}
