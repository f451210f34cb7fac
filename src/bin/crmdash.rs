use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crmdash::server::{self, AppState};
use crmdash::{CacheConfig, Config, CrmDash, DashboardQuery, RetryPolicy};

#[derive(Parser)]
#[command(name = "crmdash", about = "Cached CRM dashboard metrics")]
struct Cli {
    /// CRM API root, e.g. https://example.amocrm.ru/api/v4/
    #[arg(long, env = "CRM_BASE_URL")]
    base_url: String,

    /// Long-lived API token
    #[arg(long, env = "CRM_TOKEN", hide_env_values = true)]
    token: String,

    /// UTC offset for calendar days (e.g. +03:00)
    #[arg(long, env = "CRM_UTC_OFFSET", default_value = "+00:00", allow_hyphen_values = true)]
    utc_offset: String,

    /// Seconds a computed payload stays cached
    #[arg(long, env = "CRM_CACHE_TTL_SECS", default_value = "60")]
    cache_ttl_secs: u64,

    /// Maximum number of cached payloads
    #[arg(long, env = "CRM_CACHE_CAPACITY", default_value = "500")]
    cache_capacity: usize,

    /// Attempts per page on 429/5xx before giving up
    #[arg(long, env = "CRM_MAX_ATTEMPTS", default_value = "5")]
    max_attempts: u32,

    /// Timeout for each CRM request, in seconds
    #[arg(long, env = "CRM_REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard JSON API
    Serve {
        /// Address to listen on
        #[arg(long, env = "CRMDASH_LISTEN", default_value = "0.0.0.0:3000")]
        listen: String,
    },
    /// Print pipeline records
    Pipelines,
    /// Print user records
    Users,
    /// Print summary metrics
    Metrics {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Print the stage funnel
    Funnels {
        #[command(flatten)]
        range: RangeArgs,
        /// Pipeline id
        #[arg(long)]
        pipeline_id: Option<String>,
    },
    /// Print a daily series
    Timeseries {
        /// leads_created, leads_won or revenue_won
        #[arg(long)]
        metric: String,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Print open task urgency buckets
    Tasks {
        /// Responsible user id
        #[arg(long)]
        user_id: Option<String>,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// today, yesterday, 7d, 30d or custom
    #[arg(long, default_value = "today")]
    range: String,
    /// Start date for --range custom (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,
    /// End date for --range custom (YYYY-MM-DD, exclusive)
    #[arg(long)]
    to: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    /// Pipeline id
    #[arg(long)]
    pipeline_id: Option<String>,
    /// Responsible user id
    #[arg(long)]
    user_id: Option<String>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::new(&self.base_url, &self.token);
        config.utc_offset = crmdash::date_util::parse_utc_offset(&self.utc_offset)?;
        config.cache = CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: self.cache_capacity,
        };
        config.retry = RetryPolicy::default().with_max_attempts(self.max_attempts);
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config.validate()?;
        Ok(config)
    }
}

fn dashboard_query(
    range: RangeArgs,
    filters: Option<FilterArgs>,
    metric: Option<String>,
) -> DashboardQuery {
    let (pipeline_id, user_id) = match filters {
        Some(f) => (f.pipeline_id, f.user_id),
        None => (None, None),
    };
    DashboardQuery {
        range: Some(range.range),
        from: range.from,
        to: range.to,
        pipeline_id,
        user_id,
        metric,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = cli.config()?;
    let dash = CrmDash::from_config(&config)?;

    match cli.command {
        Commands::Serve { listen } => {
            let state = AppState::new(Arc::new(dash), &config.crm_origin()?)?;
            server::serve(&listen, state).await?;
        }
        Commands::Pipelines => print_json(&dash.pipelines().await?)?,
        Commands::Users => print_json(&dash.users().await?)?,
        Commands::Metrics { range, filters } => {
            let q = dashboard_query(range, Some(filters), None);
            print_json(&dash.metrics(&q).await?)?;
        }
        Commands::Funnels { range, pipeline_id } => {
            let mut q = dashboard_query(range, None, None);
            q.pipeline_id = pipeline_id;
            print_json(&dash.funnels(&q).await?)?;
        }
        Commands::Timeseries {
            metric,
            range,
            filters,
        } => {
            let q = dashboard_query(range, Some(filters), Some(metric));
            print_json(&dash.timeseries(&q).await?)?;
        }
        Commands::Tasks { user_id } => {
            let q = DashboardQuery {
                user_id,
                ..Default::default()
            };
            print_json(&dash.tasks(&q).await?)?;
        }
    }

    Ok(())
}
