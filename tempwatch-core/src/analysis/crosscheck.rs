use serde::Serialize;

use crate::{
    analysis::seasonal::find_summary,
    model::{LiveObservation, Season, SeasonalSummary},
};

/// Live readings are compared against the seasonal mean ± this many std.
pub const CROSS_CHECK_SIGMAS: f64 = 2.0;

/// Historical seasonal mean and standard deviation for one city.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    pub mean: f64,
    pub std: f64,
}

impl Baseline {
    /// `None` when the season had a single observation and no sample std.
    pub fn from_summary(summary: &SeasonalSummary) -> Option<Self> {
        summary.temperature_std.map(|std| Baseline {
            mean: summary.temperature_mean,
            std,
        })
    }

    pub fn lower(&self) -> f64 {
        self.mean - CROSS_CHECK_SIGMAS * self.std
    }

    pub fn upper(&self) -> f64 {
        self.mean + CROSS_CHECK_SIGMAS * self.std
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossCheck {
    pub reading: f64,
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
    /// Signed distance from the seasonal mean.
    pub deviation: f64,
    pub anomalous: bool,
}

pub fn is_anomalous(reading: f64, seasonal_mean: f64, seasonal_std: f64) -> bool {
    (reading - seasonal_mean).abs() > CROSS_CHECK_SIGMAS * seasonal_std
}

pub fn cross_check(reading: f64, baseline: Baseline) -> CrossCheck {
    CrossCheck {
        reading,
        mean: baseline.mean,
        std: baseline.std,
        lower: baseline.lower(),
        upper: baseline.upper(),
        deviation: reading - baseline.mean,
        anomalous: is_anomalous(reading, baseline.mean, baseline.std),
    }
}

/// Cross-checks a live observation against the city's baseline for `season`.
///
/// `None` when the fetch failed or there is no usable baseline.
pub fn cross_check_live(
    live: &LiveObservation,
    summaries: &[SeasonalSummary],
    city: &str,
    season: Season,
) -> Option<CrossCheck> {
    let weather = live.weather()?;
    let baseline = find_summary(summaries, city, season).and_then(Baseline::from_summary)?;
    Some(cross_check(weather.temperature, baseline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurrentWeather, FetchFailure};
    use chrono::Utc;

    fn summary(std: Option<f64>) -> SeasonalSummary {
        SeasonalSummary {
            city: "Moscow".into(),
            season: Season::Winter,
            temperature_mean: 10.0,
            temperature_std: std,
            temperature_min: -5.0,
            temperature_max: 25.0,
            count: 90,
        }
    }

    fn live(temperature: f64) -> LiveObservation {
        LiveObservation::Success(CurrentWeather {
            city: "Moscow".into(),
            temperature,
            feels_like: temperature,
            humidity: 60,
            pressure: 1012,
            description: "ясно".into(),
            icon: "01d".into(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn classifies_against_two_sigma() {
        assert!(is_anomalous(40.0, 10.0, 5.0));
        assert!(!is_anomalous(12.0, 10.0, 5.0));
        assert!(is_anomalous(-0.5, 10.0, 5.0));
        assert!(!is_anomalous(20.0, 10.0, 5.0));
    }

    #[test]
    fn cross_check_reports_range_and_deviation() {
        let check = cross_check(40.0, Baseline { mean: 10.0, std: 5.0 });
        assert_eq!(check.lower, 0.0);
        assert_eq!(check.upper, 20.0);
        assert_eq!(check.deviation, 30.0);
        assert!(check.anomalous);
    }

    #[test]
    fn cross_check_live_uses_matching_summary() {
        let summaries = vec![summary(Some(5.0))];

        let check = cross_check_live(&live(12.0), &summaries, "Moscow", Season::Winter).unwrap();
        assert!(!check.anomalous);

        assert!(cross_check_live(&live(12.0), &summaries, "Moscow", Season::Summer).is_none());
        assert!(cross_check_live(&live(12.0), &summaries, "Berlin", Season::Winter).is_none());
    }

    #[test]
    fn cross_check_live_skips_failures_and_missing_std() {
        let failure = LiveObservation::Failure(FetchFailure { error: "boom".into(), code: None });
        assert!(cross_check_live(&failure, &[summary(Some(5.0))], "Moscow", Season::Winter).is_none());
        assert!(cross_check_live(&live(12.0), &[summary(None)], "Moscow", Season::Winter).is_none());
    }
}
