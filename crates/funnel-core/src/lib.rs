//! Domain models and pure metric computations for the funnel dashboard.
//!
//! Everything in this crate is side-effect free: the metric functions take
//! loaded tables by reference and return plain record sequences for a
//! rendering layer to consume.

pub mod breakdown;
pub mod error;
pub mod formatting;
pub mod funnel;
pub mod growth;
pub mod models;
pub mod retention;
pub mod revenue;
pub mod settings;
pub mod time_utils;
