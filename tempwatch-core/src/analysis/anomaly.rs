use crate::{
    error::AnalysisError,
    model::{AnnotatedRecord, RollingRecord},
};

/// Flags rows whose temperature falls strictly outside
/// `moving_avg ± threshold * moving_std`.
///
/// Rows lacking either statistic are never flagged. Row order is preserved.
pub fn detect_anomalies(
    records: &[RollingRecord],
    threshold: f64,
) -> Result<Vec<AnnotatedRecord>, AnalysisError> {
    validate_threshold(threshold)?;

    Ok(records
        .iter()
        .map(|record| AnnotatedRecord {
            anomaly: is_outside_envelope(record, threshold),
            record: record.clone(),
        })
        .collect())
}

pub fn is_outside_envelope(record: &RollingRecord, threshold: f64) -> bool {
    match (record.moving_avg, record.moving_std) {
        (Some(avg), Some(std)) => {
            let temperature = record.observation.temperature;
            temperature > avg + threshold * std || temperature < avg - threshold * std
        }
        _ => false,
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<(), AnalysisError> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(AnalysisError::InvalidThreshold(threshold));
    }
    Ok(())
}
