use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub plan: SubscriptionPlan,
    /// Jobs allowed per billing cycle.
    pub monthly_quota: u32,
    /// Jobs consumed this cycle; reset exactly once per cycle.
    #[serde(default)]
    pub monthly_usage: u32,
    pub quota_reset_date: DateTime,
    /// Materialized rollup of the usage ledger; reconciled on a schedule.
    #[serde(default)]
    pub total_cost_usd: f64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Pro,
    Business,
}

impl SubscriptionPlan {
    /// Monthly job allowance for the plan.
    pub fn monthly_quota(&self) -> u32 {
        match self {
            SubscriptionPlan::Free => 10,
            SubscriptionPlan::Pro => 100,
            SubscriptionPlan::Business => 1000,
        }
    }
}

impl User {
    pub const COLLECTION: &'static str = "users";
}
