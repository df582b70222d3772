//! Presentation adapter for the funnel dashboard.
//!
//! Maps the metrics pipeline output to chart-ready, renderer-agnostic
//! series types. Everything here is plain serialisable data: no chart
//! rendering, no widget state.

pub mod series;

pub use series::DashboardView;
