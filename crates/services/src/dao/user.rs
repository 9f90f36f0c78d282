use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use tracing::debug;

use mediascribe_db::models::{SubscriptionPlan, User, UserRole};

use super::base::{BaseDao, DaoResult};

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        email: String,
        display_name: String,
        role: UserRole,
        plan: SubscriptionPlan,
        quota_reset_date: DateTime,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email,
            display_name,
            role,
            plan,
            monthly_quota: plan.monthly_quota(),
            monthly_usage: 0,
            quota_reset_date,
            total_cost_usd: 0.0,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<User> {
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<Option<User>> {
        self.base.find_one(doc! { "email": email }).await
    }

    pub async fn find_all(&self) -> DaoResult<Vec<User>> {
        self.base.find_many(doc! {}, Some(doc! { "created_at": 1 })).await
    }

    /// Applies the monthly reset, CAS'd on the reset date the caller
    /// observed. Under concurrent admission checks at the cycle boundary
    /// only one update matches; everyone re-reads the post-reset document.
    pub async fn apply_quota_reset(
        &self,
        id: ObjectId,
        observed_reset_date: DateTime,
        next_reset_date: DateTime,
    ) -> DaoResult<User> {
        let applied = self
            .base
            .update_one(
                doc! { "_id": id, "quota_reset_date": observed_reset_date },
                doc! { "$set": {
                    "monthly_usage": 0,
                    "quota_reset_date": next_reset_date,
                }},
            )
            .await?;
        if applied {
            debug!(user_id = %id, "Monthly quota reset applied");
        }
        self.base.find_by_id(id).await
    }

    /// Counts one job against the monthly allowance. Called only when the
    /// ledger newly records the job's transcription entry.
    pub async fn increment_monthly_usage(&self, id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_by_id(id, doc! { "$inc": { "monthly_usage": 1 } })
            .await
    }

    /// Adds to the materialized cost rollup.
    pub async fn add_cost(&self, id: ObjectId, cost_usd: f64) -> DaoResult<bool> {
        self.base
            .update_by_id(id, doc! { "$inc": { "total_cost_usd": cost_usd } })
            .await
    }

    /// Overwrites the rollup with the ledger-derived total.
    pub async fn set_total_cost(&self, id: ObjectId, total_cost_usd: f64) -> DaoResult<bool> {
        self.base
            .update_by_id(id, doc! { "$set": { "total_cost_usd": total_cost_usd } })
            .await
    }

    /// Users whose usage has reached their allowance; input for the alert
    /// monitor.
    pub async fn find_over_quota(&self) -> DaoResult<Vec<User>> {
        self.base
            .find_many(
                doc! { "$expr": { "$gte": ["$monthly_usage", "$monthly_quota"] } },
                None,
            )
            .await
    }
}
