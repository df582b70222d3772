//! Data ingestion layer for the funnel dashboard.
//!
//! Responsible for discovering and parsing the CSV tables (users, events,
//! plans, sources and the optional cohort tables), validating their schema,
//! coercing column types, and running the top-level metrics pipeline.

pub mod analysis;
pub mod loader;

pub use funnel_core as core;
