//! Commission-to-invoice engine: commission rules, realized commission
//! records, invoice assembly with yearly numbering, and partner dashboards.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
