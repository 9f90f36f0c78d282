pub mod alert;
pub mod job;
pub mod usage_log;
pub mod user;

pub use alert::{Alert, AlertKind};
pub use job::{Job, JobArtifacts, JobMetadata, JobStatus};
pub use usage_log::{OperationType, UsageLogEntry};
pub use user::{SubscriptionPlan, User, UserRole};
