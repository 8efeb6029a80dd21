//! Historical temperature analysis.
//!
//! Data flows from the rolling statistics into anomaly detection and then into
//! seasonal aggregation. The cross-checker compares live readings against the
//! seasonal tables.

use tracing::info;

use crate::{
    error::AnalysisError,
    model::{AnnotatedRecord, Observation, RollingRecord, SeasonalSummary},
    timing::{PerformanceComparison, timed},
};

pub mod anomaly;
pub mod crosscheck;
pub mod report;
pub mod rolling;
pub mod seasonal;

pub use anomaly::detect_anomalies;
pub use crosscheck::{Baseline, CrossCheck, cross_check, cross_check_live, is_anomalous};
pub use rolling::{rolling_parallel, rolling_sequential, worker_count};
pub use seasonal::{find_summary, seasonal_stats};

/// Both rolling tables plus how long each mode took.
#[derive(Debug, Clone)]
pub struct RollingComparison {
    pub sequential: Vec<RollingRecord>,
    pub parallel: Vec<RollingRecord>,
    pub performance: PerformanceComparison,
}

/// Runs the sequential and parallel rolling modes back to back.
pub fn analyze_both(
    dataset: &[Observation],
    window: usize,
) -> Result<RollingComparison, AnalysisError> {
    let sequential = timed(|| rolling_sequential(dataset, window));
    let parallel = timed(|| rolling_parallel(dataset, window));

    let performance = PerformanceComparison {
        sequential_secs: sequential.secs(),
        parallel_secs: parallel.secs(),
        workers: worker_count(report::cities(dataset).len()),
    };

    info!(
        rows = dataset.len(),
        window,
        sequential_secs = performance.sequential_secs,
        parallel_secs = performance.parallel_secs,
        "rolling statistics computed"
    );

    Ok(RollingComparison {
        sequential: sequential.value?,
        parallel: parallel.value?,
        performance,
    })
}

/// Output of the full historical pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub annotated: Vec<AnnotatedRecord>,
    pub seasonal: Vec<SeasonalSummary>,
    pub performance: PerformanceComparison,
}

/// Rolling statistics in both modes, anomalies on the parallel table, then
/// seasonal statistics.
pub fn run_pipeline(
    dataset: &[Observation],
    window: usize,
    threshold: f64,
) -> Result<AnalysisRun, AnalysisError> {
    anomaly::validate_threshold(threshold)?;

    let rolling = analyze_both(dataset, window)?;
    let annotated = detect_anomalies(&rolling.parallel, threshold)?;
    let seasonal = seasonal_stats(&annotated);

    Ok(AnalysisRun {
        annotated,
        seasonal,
        performance: rolling.performance,
    })
}
