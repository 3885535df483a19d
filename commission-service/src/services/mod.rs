//! Services module for commission-service.

pub mod calculator;
pub mod database;
pub mod metrics;
pub mod numbering;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
