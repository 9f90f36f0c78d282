pub mod alert;
pub mod job;
pub mod usage;
pub mod webhook;
