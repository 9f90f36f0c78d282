pub mod alert;
pub mod base;
pub mod job;
pub mod usage_log;
pub mod user;

pub use alert::AlertDao;
pub use job::JobDao;
pub use usage_log::{RecordOutcome, UsageLedger, UsageSummary};
pub use user::UserDao;
