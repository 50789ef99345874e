//! CLI commands for qa-bench

pub mod dispatch;
pub mod experiments;
pub mod import;
pub mod run;
pub mod summarize;
