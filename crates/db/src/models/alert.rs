use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A monitoring finding. `user_id` is None for platform-wide alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: Option<ObjectId>,
    pub kind: AlertKind,
    pub message: String,
    pub amount_usd: Option<f64>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighCost,
    QuotaExceeded,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HighCost => "high_cost",
            AlertKind::QuotaExceeded => "quota_exceeded",
        }
    }
}

impl Alert {
    pub const COLLECTION: &'static str = "alerts";
}
