use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{DateTime, Months, Utc};
use tracing::debug;

use crate::dao::UserDao;
use crate::dao::base::DaoResult;

/// Admission decision for starting a new job. Allowing never consumes
/// quota by itself; usage is counted when the ledger bills the job's
/// transcription step.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { reason: DenyReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    QuotaExceeded,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::QuotaExceeded => "quota_exceeded",
        }
    }
}

pub struct QuotaGuard {
    users: Arc<UserDao>,
}

impl QuotaGuard {
    pub fn new(users: Arc<UserDao>) -> Self {
        Self { users }
    }

    pub async fn admit(&self, user_id: ObjectId) -> DaoResult<Admission> {
        let now = Utc::now();
        let mut user = self.users.find_by_id(user_id).await?;

        // First check after the cycle boundary applies the reset. The CAS on
        // the observed reset date means at most one reset per cycle lands,
        // however many admission checks race here.
        if user.quota_reset_date.to_chrono() <= now {
            let next = next_reset_date(user.quota_reset_date.to_chrono(), now);
            user = self
                .users
                .apply_quota_reset(
                    user_id,
                    user.quota_reset_date,
                    bson::DateTime::from_chrono(next),
                )
                .await?;
        }

        if user.monthly_usage >= user.monthly_quota {
            debug!(
                user_id = %user_id,
                usage = user.monthly_usage,
                quota = user.monthly_quota,
                "Admission denied"
            );
            return Ok(Admission::Denied {
                reason: DenyReason::QuotaExceeded,
            });
        }

        Ok(Admission::Allowed {
            remaining: user.monthly_quota - user.monthly_usage,
        })
    }
}

/// Advances a reset date by whole months until it lies strictly after
/// `now`. Handles cycles missed entirely (an idle user several months
/// past their boundary resets once, not once per month).
pub fn next_reset_date(current: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = current;
    while next <= now {
        next = next
            .checked_add_months(Months::new(1))
            .unwrap_or(next + chrono::Duration::days(30));
    }
    next
}
