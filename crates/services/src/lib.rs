pub mod auth;
pub mod dao;
pub mod engine;
pub mod monitor;
pub mod object_store;
pub mod orchestrator;
pub mod quota;
pub mod retention;

pub use auth::AuthService;
pub use dao::*;
pub use monitor::AlertMonitor;
pub use orchestrator::Orchestrator;
pub use quota::QuotaGuard;
pub use retention::RetentionSweeper;
