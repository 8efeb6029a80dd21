use std::collections::BTreeMap;

use crate::{
    analysis::rolling::mean_and_sample_std,
    model::{AsObservation, Season, SeasonalSummary},
};

const DISPLAY_DECIMALS: i32 = 2;

/// Per (city, season) statistics of temperature.
///
/// Rows come out sorted by city, then by season in calendar order. Only groups
/// present in the input produce a row.
pub fn seasonal_stats<T: AsObservation>(rows: &[T]) -> Vec<SeasonalSummary> {
    let mut groups: BTreeMap<(&str, Season), Vec<f64>> = BTreeMap::new();

    for row in rows {
        let observation = row.observation();
        groups
            .entry((observation.city.as_str(), observation.season))
            .or_default()
            .push(observation.temperature);
    }

    groups
        .into_iter()
        .map(|((city, season), temperatures)| {
            let (mean, std) = mean_and_sample_std(&temperatures);
            let min = temperatures.iter().copied().fold(f64::INFINITY, f64::min);
            let max = temperatures.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            SeasonalSummary {
                city: city.to_string(),
                season,
                temperature_mean: round(mean),
                temperature_std: std.map(round),
                temperature_min: round(min),
                temperature_max: round(max),
                count: temperatures.len(),
            }
        })
        .collect()
}

/// Looks up the summary row for one city and season.
pub fn find_summary<'a>(
    summaries: &'a [SeasonalSummary],
    city: &str,
    season: Season,
) -> Option<&'a SeasonalSummary> {
    summaries.iter().find(|s| s.city == city && s.season == season)
}

fn round(value: f64) -> f64 {
    let factor = 10f64.powi(DISPLAY_DECIMALS);
    (value * factor).round_ties_even() / factor
}
