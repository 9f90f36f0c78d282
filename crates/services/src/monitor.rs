use std::sync::Arc;

use bson::DateTime;
use chrono::{Duration, Utc};
use mediascribe_config::AlertSettings;
use mediascribe_db::models::AlertKind;
use tracing::{info, warn};

use crate::dao::base::DaoResult;
use crate::dao::{AlertDao, UsageLedger, UserDao};

/// Scheduled checks over users and the ledger. Each check dedupes through
/// the alert store, so re-running inside the cooldown raises nothing new.
pub struct AlertMonitor {
    users: Arc<UserDao>,
    ledger: Arc<UsageLedger>,
    alerts: Arc<AlertDao>,
    settings: AlertSettings,
}

#[derive(Debug, Default)]
pub struct MonitorReport {
    pub high_cost_alerts: u64,
    pub quota_alerts: u64,
}

impl AlertMonitor {
    pub fn new(
        users: Arc<UserDao>,
        ledger: Arc<UsageLedger>,
        alerts: Arc<AlertDao>,
        settings: AlertSettings,
    ) -> Self {
        Self {
            users,
            ledger,
            alerts,
            settings,
        }
    }

    pub async fn run_checks(&self) -> DaoResult<MonitorReport> {
        let report = MonitorReport {
            high_cost_alerts: self.check_high_cost().await?,
            quota_alerts: self.check_quota_exceeded().await?,
        };
        info!(
            high_cost_alerts = report.high_cost_alerts,
            quota_alerts = report.quota_alerts,
            "Alert checks finished"
        );
        Ok(report)
    }

    /// Flags users whose ledger spend over the lookback window crossed the
    /// configured threshold.
    async fn check_high_cost(&self) -> DaoResult<u64> {
        let now = Utc::now();
        let from = DateTime::from_chrono(now - Duration::hours(self.settings.lookback_hours));
        let to = DateTime::from_chrono(now);
        let cooldown_start =
            DateTime::from_chrono(now - Duration::hours(self.settings.cooldown_hours));

        let mut raised = 0;
        for total in self.ledger.user_totals(from, to).await? {
            // Sorted by spend descending; everyone below the threshold is
            // below it too.
            if total.total_cost_usd < self.settings.high_cost_threshold_usd {
                break;
            }

            let message = format!(
                "user spent ${:.2} across {} operations in the last {}h",
                total.total_cost_usd, total.operation_count, self.settings.lookback_hours
            );
            let created = self
                .alerts
                .create_deduped(
                    Some(total.user_id),
                    AlertKind::HighCost,
                    message,
                    Some(total.total_cost_usd),
                    cooldown_start,
                )
                .await?;
            if created.is_some() {
                warn!(user_id = %total.user_id, amount_usd = total.total_cost_usd, "High cost alert raised");
                raised += 1;
            }
        }
        Ok(raised)
    }

    /// Flags users who have exhausted their monthly allowance.
    async fn check_quota_exceeded(&self) -> DaoResult<u64> {
        let cooldown_start =
            DateTime::from_chrono(Utc::now() - Duration::hours(self.settings.cooldown_hours));

        let mut raised = 0;
        for user in self.users.find_over_quota().await? {
            let Some(user_id) = user.id else { continue };
            let message = format!(
                "user {} used {}/{} jobs this cycle",
                user.email, user.monthly_usage, user.monthly_quota
            );
            let created = self
                .alerts
                .create_deduped(
                    Some(user_id),
                    AlertKind::QuotaExceeded,
                    message,
                    None,
                    cooldown_start,
                )
                .await?;
            if created.is_some() {
                warn!(%user_id, usage = user.monthly_usage, quota = user.monthly_quota, "Quota exceeded alert raised");
                raised += 1;
            }
        }
        Ok(raised)
    }

    /// Rewrites each user's materialized cost rollup from the ledger. The
    /// rollup is incremented on the hot path; this repairs any drift.
    pub async fn reconcile_cost_rollups(&self) -> DaoResult<u64> {
        let mut repaired = 0;
        for user in self.users.find_all().await? {
            let Some(user_id) = user.id else { continue };
            let ledger_total = self.ledger.total_cost_for_user(user_id).await?;
            if (ledger_total - user.total_cost_usd).abs() > 1e-9 {
                warn!(
                    %user_id,
                    rollup = user.total_cost_usd,
                    ledger = ledger_total,
                    "Cost rollup drifted; repairing"
                );
                self.users.set_total_cost(user_id, ledger_total).await?;
                repaired += 1;
            }
        }
        if repaired > 0 {
            info!(repaired, "Cost rollup reconciliation finished");
        }
        Ok(repaired)
    }
}
