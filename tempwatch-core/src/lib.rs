//! Core library for the `tempwatch` CLI.
//!
//! This crate defines:
//! - Shared domain models (observations, rolling records, seasonal summaries)
//! - Rolling statistics in sequential and parallel form, anomaly detection,
//!   seasonal aggregation and per-city reports
//! - Live weather retrieval (blocking single call, concurrent batch) and the
//!   cross-check of a live reading against seasonal history
//! - Configuration handling
//!
//! The core holds no state between calls. Callers load a dataset, pass it in,
//! and keep whatever results they need.

pub mod analysis;
pub mod config;
pub mod error;
pub mod live;
pub mod model;
pub mod timing;

pub use config::{AnalysisSettings, Config};
pub use error::{AnalysisError, FetchError, ModelError};
pub use live::{BlockingOpenWeatherClient, LiveSource, OpenWeatherClient};
pub use model::{
    AnnotatedRecord, AsObservation, CurrentWeather, FetchFailure, LiveObservation, Observation,
    RollingRecord, Season, SeasonalSummary,
};
pub use timing::{PerformanceComparison, Timed};
