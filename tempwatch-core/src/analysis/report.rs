//! Per-city summaries built on top of the analysis tables.

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;

use crate::{
    analysis::rolling::mean_and_sample_std,
    model::{AnnotatedRecord, AsObservation, Season},
};

/// Anomaly rate above which a city report raises a warning, in percent.
pub const HIGH_ANOMALY_RATE_PCT: f64 = 5.0;

/// Two-sided p-value below which a trend counts as significant.
pub const TREND_SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityOverview {
    pub city: String,
    pub records: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub mean_temperature: f64,
    pub std_temperature: Option<f64>,
    /// Season of the most recent observation.
    pub current_season: Season,
}

/// Season of the chronologically latest observation for `city`.
pub fn current_season<T: AsObservation>(rows: &[T], city: &str) -> Option<Season> {
    rows.iter()
        .map(|row| row.observation())
        .filter(|o| o.city == city)
        .max_by_key(|o| o.timestamp)
        .map(|o| o.season)
}

pub fn city_overview<T: AsObservation>(rows: &[T], city: &str) -> Option<CityOverview> {
    let city_rows: Vec<_> = rows
        .iter()
        .map(|row| row.observation())
        .filter(|o| o.city == city)
        .collect();

    let first = city_rows.iter().min_by_key(|o| o.timestamp)?;
    let last = city_rows.iter().max_by_key(|o| o.timestamp)?;
    let temperatures: Vec<f64> = city_rows.iter().map(|o| o.temperature).collect();
    let (mean, std) = mean_and_sample_std(&temperatures);

    Some(CityOverview {
        city: city.to_string(),
        records: city_rows.len(),
        first: first.timestamp,
        last: last.timestamp,
        mean_temperature: mean,
        std_temperature: std,
        current_season: last.season,
    })
}

/// Distinct cities in first-appearance order.
pub fn cities<T: AsObservation>(rows: &[T]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        let city = &row.observation().city;
        if !seen.iter().any(|c| c == city) {
            seen.push(city.clone());
        }
    }
    seen
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub total: usize,
    pub anomalies: usize,
    pub percentage: f64,
}

pub fn anomaly_summary(records: &[AnnotatedRecord]) -> AnomalySummary {
    let anomalies = records.iter().filter(|r| r.anomaly).count();
    AnomalySummary {
        total: records.len(),
        anomalies,
        percentage: percentage(anomalies, records.len()),
    }
}

/// Share of anomalous days per calendar year, in percent.
pub fn anomaly_rate_by_year(records: &[AnnotatedRecord]) -> BTreeMap<i32, f64> {
    let mut counts: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = counts
            .entry(record.observation().timestamp.year())
            .or_default();
        entry.1 += 1;
        if record.anomaly {
            entry.0 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(year, (anomalies, total))| (year, percentage(anomalies, total)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    /// Change of the moving average per observation step.
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Standard error of the slope. Needs at least three points.
    pub std_err: Option<f64>,
    /// Two-sided p-value for a zero slope under Student's t with n - 2 degrees of freedom.
    pub p_value: Option<f64>,
}

impl Trend {
    pub fn is_rising(&self) -> bool {
        self.slope > 0.0
    }

    pub fn is_significant(&self) -> bool {
        self.p_value.is_some_and(|p| p < TREND_SIGNIFICANCE_LEVEL)
    }
}

/// Least-squares line through the defined moving averages, in chronological order.
///
/// Needs at least two defined points.
pub fn moving_average_trend(records: &[AnnotatedRecord]) -> Option<Trend> {
    let mut defined: Vec<(NaiveDateTime, f64)> = records
        .iter()
        .filter_map(|r| r.record.moving_avg.map(|avg| (r.observation().timestamp, avg)))
        .collect();
    defined.sort_by_key(|(timestamp, _)| *timestamp);

    let ys: Vec<f64> = defined.into_iter().map(|(_, avg)| avg).collect();
    linear_regression(&ys)
}

fn linear_regression(ys: &[f64]) -> Option<Trend> {
    if ys.len() < 2 {
        return None;
    }

    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 { 0.0 } else { (sxy * sxy) / (sxx * syy) };

    let df = ys.len() - 2;
    let std_err = (df > 0).then(|| {
        let residual = (syy - slope * sxy).max(0.0);
        (residual / df as f64 / sxx).sqrt()
    });
    let p_value = std_err.and_then(|se| slope_p_value(slope, se, df));

    Some(Trend {
        slope,
        intercept: mean_y - slope * mean_x,
        r_squared,
        std_err,
        p_value,
    })
}

fn slope_p_value(slope: f64, std_err: f64, df: usize) -> Option<f64> {
    if std_err == 0.0 {
        // Exact fit: any nonzero slope is certain, a flat line carries no trend.
        return Some(if slope == 0.0 { 1.0 } else { 0.0 });
    }

    let t = slope / std_err;
    let dist = StudentsT::new(0.0, 1.0, df as f64).ok()?;
    Some((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityReport {
    pub overview: CityOverview,
    pub anomalies: AnomalySummary,
    pub anomaly_rate_by_year: BTreeMap<i32, f64>,
    pub trend: Option<Trend>,
}

impl CityReport {
    pub fn high_anomaly_rate(&self) -> bool {
        self.anomalies.percentage > HIGH_ANOMALY_RATE_PCT
    }
}

pub fn city_report(records: &[AnnotatedRecord], city: &str) -> Option<CityReport> {
    let city_records: Vec<AnnotatedRecord> = records
        .iter()
        .filter(|r| r.observation().city == city)
        .cloned()
        .collect();

    let overview = city_overview(&city_records, city)?;

    Some(CityReport {
        overview,
        anomalies: anomaly_summary(&city_records),
        anomaly_rate_by_year: anomaly_rate_by_year(&city_records),
        trend: moving_average_trend(&city_records),
    })
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Observation, RollingRecord};
    use chrono::NaiveDate;

    fn annotated(
        city: &str,
        (y, m, d): (i32, u32, u32),
        temperature: f64,
        avg: Option<f64>,
        anomaly: bool,
    ) -> AnnotatedRecord {
        AnnotatedRecord {
            record: RollingRecord {
                observation: Observation {
                    city: city.into(),
                    timestamp: NaiveDate::from_ymd_opt(y, m, d)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap(),
                    temperature,
                    season: if m >= 6 { Season::Summer } else { Season::Winter },
                },
                moving_avg: avg,
                moving_std: avg.map(|_| 1.0),
            },
            anomaly,
        }
    }

    #[test]
    fn current_season_uses_latest_observation() {
        let rows = vec![
            annotated("Oslo", (2020, 7, 1), 20.0, None, false),
            annotated("Oslo", (2020, 1, 1), -3.0, None, false),
            annotated("Rome", (2021, 1, 1), 9.0, None, false),
        ];
        assert_eq!(current_season(&rows, "Oslo"), Some(Season::Summer));
        assert_eq!(current_season(&rows, "Rome"), Some(Season::Winter));
        assert_eq!(current_season(&rows, "Lima"), None);
    }

    #[test]
    fn overview_covers_period_and_moments() {
        let rows = vec![
            annotated("Oslo", (2020, 7, 1), 20.0, None, false),
            annotated("Oslo", (2020, 1, 1), 10.0, None, false),
        ];
        let overview = city_overview(&rows, "Oslo").unwrap();

        assert_eq!(overview.records, 2);
        assert_eq!(overview.first.date(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(overview.last.date(), NaiveDate::from_ymd_opt(2020, 7, 1).unwrap());
        assert_eq!(overview.mean_temperature, 15.0);
        assert!(city_overview(&rows, "Lima").is_none());
    }

    #[test]
    fn anomaly_rates_overall_and_by_year() {
        let rows = vec![
            annotated("Oslo", (2019, 1, 1), 1.0, None, true),
            annotated("Oslo", (2019, 1, 2), 1.0, None, false),
            annotated("Oslo", (2020, 1, 1), 1.0, None, false),
            annotated("Oslo", (2020, 1, 2), 1.0, None, false),
        ];

        let summary = anomaly_summary(&rows);
        assert_eq!(summary.anomalies, 1);
        assert_eq!(summary.percentage, 25.0);

        let by_year = anomaly_rate_by_year(&rows);
        assert_eq!(by_year[&2019], 50.0);
        assert_eq!(by_year[&2020], 0.0);
    }

    #[test]
    fn trend_follows_moving_average() {
        let rows: Vec<_> = (1..=5)
            .map(|d| annotated("Oslo", (2020, 1, d), 0.0, Some(d as f64 * 2.0), false))
            .collect();
        let trend = moving_average_trend(&rows).unwrap();

        assert!((trend.slope - 2.0).abs() < 1e-12);
        assert!((trend.intercept - 2.0).abs() < 1e-12);
        assert!((trend.r_squared - 1.0).abs() < 1e-12);
        assert!(trend.is_rising());
    }

    #[test]
    fn exact_linear_trend_is_significant() {
        let rows: Vec<_> = (1..=5)
            .map(|d| annotated("Oslo", (2020, 1, d), 0.0, Some(d as f64 * 2.0), false))
            .collect();
        let trend = moving_average_trend(&rows).unwrap();

        assert_eq!(trend.std_err, Some(0.0));
        assert_eq!(trend.p_value, Some(0.0));
        assert!(trend.is_significant());
    }

    #[test]
    fn noisy_linear_trend_is_significant() {
        // y = x with a small alternating wobble.
        let ys: Vec<f64> = (0..20)
            .map(|i| i as f64 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let trend = linear_regression(&ys).unwrap();

        assert!((trend.slope - 1.0).abs() < 0.01);
        assert!(trend.std_err.unwrap() > 0.0);
        assert!(trend.p_value.unwrap() < 1e-10);
        assert!(trend.is_significant());
    }

    #[test]
    fn noisy_flat_series_is_not_significant() {
        let ys: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let trend = linear_regression(&ys).unwrap();

        // slope = -10 / 665, stderr = sqrt((20 - slope * -10) / 18 / 665)
        assert!((trend.slope + 10.0 / 665.0).abs() < 1e-12);
        assert!((trend.std_err.unwrap() - 0.040_72).abs() < 1e-4);
        let p = trend.p_value.unwrap();
        assert!(p > 0.6 && p < 0.8, "p = {p}");
        assert!(!trend.is_significant());
    }

    #[test]
    fn two_points_have_no_p_value() {
        let trend = linear_regression(&[1.0, 3.0]).unwrap();
        assert_eq!(trend.slope, 2.0);
        assert_eq!(trend.p_value, None);
        assert!(!trend.is_significant());
    }

    #[test]
    fn trend_needs_two_points() {
        let rows = vec![annotated("Oslo", (2020, 1, 1), 0.0, Some(1.0), false)];
        assert!(moving_average_trend(&rows).is_none());
    }

    #[test]
    fn city_report_filters_to_city() {
        let rows: Vec<_> = (1..=20)
            .map(|d| annotated("Oslo", (2020, 1, d), 0.0, Some(1.0), d <= 2))
            .chain(std::iter::once(annotated("Rome", (2020, 1, 1), 0.0, None, true)))
            .collect();

        let report = city_report(&rows, "Oslo").unwrap();
        assert_eq!(report.overview.records, 20);
        assert_eq!(report.anomalies.anomalies, 2);
        assert!(report.high_anomaly_rate());
        assert_eq!(cities(&rows), vec!["Oslo".to_string(), "Rome".to_string()]);
    }
}
