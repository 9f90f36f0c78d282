use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One billable engine operation. Append-only; uniqueness on
/// (job_id, operation) is enforced by an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub job_id: ObjectId,
    pub operation: OperationType,
    pub cost_usd: f64,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Transcription,
    Summarization,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Transcription => "transcription",
            OperationType::Summarization => "summarization",
        }
    }
}

impl UsageLogEntry {
    pub const COLLECTION: &'static str = "usage_logs";
}
