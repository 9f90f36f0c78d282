use std::collections::HashMap;

use bson::{DateTime, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::Database;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mediascribe_db::models::{OperationType, UsageLogEntry};

use super::base::{BaseDao, DaoError, DaoResult};

/// Append-only log of billable operations; the source of truth for cost.
/// `record` is the only write path and is idempotent per (job, operation).
pub struct UsageLedger {
    pub base: BaseDao<UsageLogEntry>,
}

/// Result of a `record` call. `newly_recorded` is false when the entry
/// already existed (redelivered event); the caller must not bill again.
pub struct RecordOutcome {
    pub entry: UsageLogEntry,
    pub newly_recorded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperationTotals {
    pub count: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageSummary {
    pub total_cost_usd: f64,
    pub operations: HashMap<String, OperationTotals>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTotal {
    pub user_id: ObjectId,
    pub total_cost_usd: f64,
    pub operation_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformSummary {
    pub total_cost_usd: f64,
    pub user_count: u64,
    pub operations: HashMap<String, OperationTotals>,
}

impl UsageLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, UsageLogEntry::COLLECTION),
        }
    }

    pub async fn record(
        &self,
        user_id: ObjectId,
        job_id: ObjectId,
        operation: OperationType,
        cost_usd: f64,
    ) -> DaoResult<RecordOutcome> {
        let entry = UsageLogEntry {
            id: None,
            user_id,
            job_id,
            operation,
            cost_usd,
            created_at: DateTime::now(),
        };

        match self.base.insert_one(&entry).await {
            Ok(id) => {
                let entry = self.base.find_by_id(id).await?;
                Ok(RecordOutcome {
                    entry,
                    newly_recorded: true,
                })
            }
            // Unique (job_id, operation) already present: this step was
            // billed by an earlier delivery. Return the existing row.
            Err(DaoError::DuplicateKey(_)) => {
                debug!(?job_id, op = operation.as_str(), "Ledger entry already recorded");
                let existing = self
                    .base
                    .find_one(doc! { "job_id": job_id, "operation": operation.as_str() })
                    .await?
                    .ok_or(DaoError::NotFound)?;
                Ok(RecordOutcome {
                    entry: existing,
                    newly_recorded: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn user_summary(
        &self,
        user_id: ObjectId,
        from: DateTime,
        to: DateTime,
    ) -> DaoResult<UsageSummary> {
        let pipeline = vec![
            doc! { "$match": {
                "user_id": user_id,
                "created_at": { "$gte": from, "$lte": to },
            }},
            group_by_operation(),
        ];

        let mut summary = UsageSummary::default();
        for row in self.aggregate(pipeline).await? {
            let op = row.get_str("_id").unwrap_or_default().to_string();
            let totals = totals_from_row(&row);
            summary.total_cost_usd += totals.cost_usd;
            summary.operations.insert(op, totals);
        }
        Ok(summary)
    }

    pub async fn platform_summary(
        &self,
        from: DateTime,
        to: DateTime,
    ) -> DaoResult<PlatformSummary> {
        let range = doc! { "created_at": { "$gte": from, "$lte": to } };

        let pipeline = vec![doc! { "$match": range.clone() }, group_by_operation()];

        let mut summary = PlatformSummary::default();
        for row in self.aggregate(pipeline).await? {
            let op = row.get_str("_id").unwrap_or_default().to_string();
            let totals = totals_from_row(&row);
            summary.total_cost_usd += totals.cost_usd;
            summary.operations.insert(op, totals);
        }

        let users = self
            .base
            .collection()
            .distinct("user_id", range)
            .await?;
        summary.user_count = users.len() as u64;

        Ok(summary)
    }

    /// Per-user cost totals over a window, highest spender first.
    pub async fn user_totals(&self, from: DateTime, to: DateTime) -> DaoResult<Vec<UserTotal>> {
        let pipeline = vec![
            doc! { "$match": { "created_at": { "$gte": from, "$lte": to } } },
            doc! { "$group": {
                "_id": "$user_id",
                "total_cost_usd": { "$sum": "$cost_usd" },
                "operation_count": { "$sum": 1 },
            }},
            doc! { "$sort": { "total_cost_usd": -1 } },
        ];

        let mut totals = Vec::new();
        for row in self.aggregate(pipeline).await? {
            let Ok(user_id) = row.get_object_id("_id") else {
                continue;
            };
            totals.push(UserTotal {
                user_id,
                total_cost_usd: number(&row, "total_cost_usd"),
                operation_count: number(&row, "operation_count") as u64,
            });
        }
        Ok(totals)
    }

    /// Lifetime ledger cost for one user; used to reconcile the
    /// materialized rollup on the user document.
    pub async fn total_cost_for_user(&self, user_id: ObjectId) -> DaoResult<f64> {
        let pipeline = vec![
            doc! { "$match": { "user_id": user_id } },
            doc! { "$group": { "_id": bson::Bson::Null, "total": { "$sum": "$cost_usd" } } },
        ];
        let rows = self.aggregate(pipeline).await?;
        Ok(rows.first().map(|r| number(r, "total")).unwrap_or(0.0))
    }

    pub async fn find_by_job(&self, job_id: ObjectId) -> DaoResult<Vec<UsageLogEntry>> {
        self.base
            .find_many(doc! { "job_id": job_id }, Some(doc! { "created_at": 1 }))
            .await
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> DaoResult<Vec<Document>> {
        let mut cursor = self.base.collection().aggregate(pipeline).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn group_by_operation() -> Document {
    doc! { "$group": {
        "_id": "$operation",
        "count": { "$sum": 1 },
        "cost_usd": { "$sum": "$cost_usd" },
    }}
}

fn totals_from_row(row: &Document) -> OperationTotals {
    OperationTotals {
        count: number(row, "count") as u64,
        cost_usd: number(row, "cost_usd"),
    }
}

fn number(row: &Document, key: &str) -> f64 {
    match row.get(key) {
        Some(bson::Bson::Double(v)) => *v,
        Some(bson::Bson::Int32(v)) => *v as f64,
        Some(bson::Bson::Int64(v)) => *v as f64,
        _ => 0.0,
    }
}
