//! HTTP handlers for commission-service.

pub mod commissions;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod rules;
