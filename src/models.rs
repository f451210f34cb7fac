use serde::{Deserialize, Serialize};

/// Status id the CRM reserves for "closed - won".
pub const STATUS_WON: i64 = 142;
/// Status id the CRM reserves for "closed - lost".
pub const STATUS_LOST: i64 = 143;

/// A lead snapshot as returned by `GET /leads`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub status_id: i64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub closed_at: Option<i64>,
    #[serde(default)]
    pub pipeline_id: Option<u64>,
    #[serde(default)]
    pub responsible_user_id: Option<u64>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadStatus {
    #[serde(default)]
    pub name: Option<String>,
}

impl Lead {
    /// Monetary value, 0 when absent.
    pub fn price(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }

    pub fn is_won(&self) -> bool {
        self.status_id == STATUS_WON
    }

    pub fn is_lost(&self) -> bool {
        self.status_id == STATUS_LOST
    }

    /// Stage label: the nested status name, else the numeric status id.
    pub fn stage_name(&self) -> String {
        self.status
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| self.status_id.to_string())
    }
}

/// A task snapshot as returned by `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<u64>,
    /// Due timestamp in epoch seconds.
    #[serde(default, alias = "complete_till_at")]
    pub complete_till: Option<i64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub responsible_user_id: Option<u64>,
}
