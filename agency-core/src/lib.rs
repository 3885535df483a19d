//! agency-core: Shared infrastructure for the agency billing platform.
pub mod config;
pub mod error;
pub mod observability;
