use serde_json::Value;

use crate::client::CrmClient;
use crate::error::Result;
use crate::models::{Lead, Task};
use crate::query::builder::FilterBuilder;
use crate::query::range::TimeRange;

pub const LEADS_PATH: &str = "leads";
pub const PIPELINES_PATH: &str = "leads/pipelines";
pub const USERS_PATH: &str = "users";
pub const TASKS_PATH: &str = "tasks";

/// Leads created within `range`, optionally narrowed by pipeline and
/// responsible user.
pub async fn leads_created(
    client: &CrmClient,
    range: &TimeRange,
    pipeline_id: Option<&str>,
    user_id: Option<&str>,
) -> Result<Vec<Lead>> {
    let filters = FilterBuilder::new()
        .created_in(range)
        .pipeline(pipeline_id)
        .responsible_user(user_id)
        .build();
    client.fetch_all(LEADS_PATH, &filters).await?.decode_items()
}

/// Leads closed within `range`, optionally narrowed by pipeline and
/// responsible user.
pub async fn leads_closed(
    client: &CrmClient,
    range: &TimeRange,
    pipeline_id: Option<&str>,
    user_id: Option<&str>,
) -> Result<Vec<Lead>> {
    let filters = FilterBuilder::new()
        .closed_in(range)
        .pipeline(pipeline_id)
        .responsible_user(user_id)
        .build();
    client.fetch_all(LEADS_PATH, &filters).await?.decode_items()
}

/// Incomplete tasks, optionally for one responsible user.
pub async fn incomplete_tasks(client: &CrmClient, user_id: Option<&str>) -> Result<Vec<Task>> {
    let filters = FilterBuilder::new()
        .completed(false)
        .responsible_user(user_id)
        .build();
    client.fetch_all(TASKS_PATH, &filters).await?.decode_items()
}

/// Pipeline records, passed through untouched.
pub async fn pipelines(client: &CrmClient) -> Result<Value> {
    Ok(client.fetch_all(PIPELINES_PATH, &[]).await?.into_value())
}

/// User records, passed through untouched.
pub async fn users(client: &CrmClient) -> Result<Value> {
    Ok(client.fetch_all(USERS_PATH, &[]).await?.into_value())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{FixedOffset, NaiveDate};
    use serde_json::json;

    use super::*;
    use crate::client::rate_limit::RetryPolicy;
    use crate::client::testing::ScriptedTransport;

    fn range() -> TimeRange {
        TimeRange::day(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap()
    }

    fn keys(query: &[(String, String)]) -> Vec<String> {
        query.iter().map(|(k, _)| k.clone()).collect()
    }

    #[tokio::test]
    async fn test_leads_closed_uses_closed_filter() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            LEADS_PATH,
            json!({ "_embedded": { "leads": [
                { "id": 1, "status_id": 142, "price": 10, "closed_at": 1735700000 }
            ] } }),
        );
        let client = CrmClient::new(transport.clone(), RetryPolicy::default());

        let leads = leads_closed(&client, &range(), Some("3"), None).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert!(leads[0].is_won());

        let calls = transport.calls();
        assert_eq!(
            keys(&calls[0].1),
            vec![
                "filter[closed_at][from]",
                "filter[closed_at][to]",
                "filter[pipeline_id]",
                "limit",
                "page",
            ]
        );
    }

    #[tokio::test]
    async fn test_incomplete_tasks_filter() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = CrmClient::new(transport.clone(), RetryPolicy::default());

        let tasks = incomplete_tasks(&client, Some("42")).await.unwrap();
        assert!(tasks.is_empty());

        let calls = transport.calls();
        assert_eq!(calls[0].0, TASKS_PATH);
        assert!(calls[0]
            .1
            .contains(&("filter[is_completed]".to_string(), "0".to_string())));
        assert!(calls[0]
            .1
            .contains(&("filter[responsible_user_id]".to_string(), "42".to_string())));
    }

    #[tokio::test]
    async fn test_pipelines_pass_through() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            PIPELINES_PATH,
            json!({ "_embedded": { "pipelines": [{ "id": 1, "name": "Sales" }] } }),
        );
        let client = CrmClient::new(transport, RetryPolicy::default());

        let value = pipelines(&client).await.unwrap();
        assert_eq!(value, json!([{ "id": 1, "name": "Sales" }]));
    }
}
