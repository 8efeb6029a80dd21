//! Centered rolling mean and standard deviation per city.
//!
//! The window for position `i` of a chronologically sorted city series spans
//! `[i - W/2, i + (W-1)/2]` (integer division). For odd `W` this is symmetric;
//! for even `W` the extra point sits before `i`. A statistic is defined only
//! when the whole span lies inside the series, so the first `W/2` and the last
//! `(W-1)/2` positions of each city have none.
//!
//! Cities never share a window. Both execution modes call [`roll_city`] on the
//! same partitions and therefore agree bit for bit.

use rayon::prelude::*;
use std::{collections::HashMap, num::NonZeroUsize, thread};
use tracing::debug;

use crate::{
    error::AnalysisError,
    model::{Observation, RollingRecord},
};

/// Rolling statistics in one thread, in input row order.
pub fn rolling_sequential(
    dataset: &[Observation],
    window: usize,
) -> Result<Vec<RollingRecord>, AnalysisError> {
    validate_window(window)?;

    let mut slots: Vec<Option<RollingRecord>> = vec![None; dataset.len()];

    for (city, indices) in partition_indices(dataset) {
        let rows: Vec<&Observation> = indices.iter().map(|&i| &dataset[i]).collect();
        let (order, stats) = city_stats(&rows, window);
        debug!(city, rows = rows.len(), window, "rolled city sequentially");

        for (position, (avg, std)) in order.into_iter().zip(stats) {
            let index = indices[position];
            slots[index] = Some(RollingRecord {
                observation: dataset[index].clone(),
                moving_avg: avg,
                moving_std: std,
            });
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Rolling statistics with one city per worker.
///
/// The pool holds `min(cities, available parallelism)` threads. Output is
/// grouped by city (first appearance order) and chronological within a city;
/// callers needing input order should sort by `(city, timestamp)`.
pub fn rolling_parallel(
    dataset: &[Observation],
    window: usize,
) -> Result<Vec<RollingRecord>, AnalysisError> {
    validate_window(window)?;

    let partitions: Vec<Vec<Observation>> = partition_indices(dataset)
        .into_iter()
        .map(|(_, indices)| indices.into_iter().map(|i| dataset[i].clone()).collect())
        .collect();

    if partitions.is_empty() {
        return Ok(Vec::new());
    }

    let workers = worker_count(partitions.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| AnalysisError::WorkerPool(err.to_string()))?;

    debug!(cities = partitions.len(), workers, window, "rolling in parallel");

    let per_city: Vec<Vec<RollingRecord>> = pool.install(|| {
        partitions
            .into_par_iter()
            .map(|partition| roll_city(partition, window))
            .collect()
    });

    Ok(per_city.into_iter().flatten().collect())
}

/// Number of workers the parallel mode uses for `cities` partitions.
pub fn worker_count(cities: usize) -> usize {
    let cpus = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    cities.min(cpus).max(1)
}

/// Sorts one city's observations by timestamp and attaches their statistics.
pub fn roll_city(partition: Vec<Observation>, window: usize) -> Vec<RollingRecord> {
    let rows: Vec<&Observation> = partition.iter().collect();
    let (order, stats) = city_stats(&rows, window);

    let mut slots: Vec<Option<Observation>> = partition.into_iter().map(Some).collect();

    order
        .into_iter()
        .zip(stats)
        .filter_map(|(position, (avg, std))| {
            slots[position].take().map(|observation| RollingRecord {
                observation,
                moving_avg: avg,
                moving_std: std,
            })
        })
        .collect()
}

pub(crate) fn validate_window(window: usize) -> Result<(), AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::InvalidWindow(window));
    }
    Ok(())
}

/// Row indices per city, cities in order of first appearance.
fn partition_indices(dataset: &[Observation]) -> Vec<(&str, Vec<usize>)> {
    let mut slot_of: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<(&str, Vec<usize>)> = Vec::new();

    for (index, observation) in dataset.iter().enumerate() {
        let city = observation.city.as_str();
        let slot = *slot_of.entry(city).or_insert_with(|| {
            partitions.push((city, Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(index);
    }

    partitions
}

type Stat = (Option<f64>, Option<f64>);

/// Returns the chronological order of `rows` (as positions into `rows`) and
/// the statistics for each position of that order.
fn city_stats(rows: &[&Observation], window: usize) -> (Vec<usize>, Vec<Stat>) {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    // Stable: equal timestamps keep input order.
    order.sort_by_key(|&position| rows[position].timestamp);

    let temperatures: Vec<f64> = order.iter().map(|&p| rows[p].temperature).collect();
    (order, centered_stats(&temperatures, window))
}

fn centered_stats(values: &[f64], window: usize) -> Vec<Stat> {
    let before = window / 2;
    let after = (window - 1) / 2;

    (0..values.len())
        .map(|i| {
            if i < before || i + after >= values.len() {
                return (None, None);
            }
            let span = &values[i - before..=i + after];
            let (mean, std) = mean_and_sample_std(span);
            (Some(mean), std)
        })
        .collect()
}

pub(crate) fn mean_and_sample_std(values: &[f64]) -> (f64, Option<f64>) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    if values.len() < 2 {
        return (mean, None);
    }

    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, Some((squares / (n - 1.0)).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Season;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn obs(city: &str, day: u32, temperature: f64) -> Observation {
        Observation {
            city: city.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::days(day as i64),
            temperature,
            season: Season::Winter,
        }
    }

    fn series(city: &str, temps: &[f64]) -> Vec<Observation> {
        temps
            .iter()
            .enumerate()
            .map(|(day, t)| obs(city, day as u32, *t))
            .collect()
    }

    fn by_key(records: &[RollingRecord]) -> BTreeMap<(String, chrono::NaiveDateTime), Stat> {
        records
            .iter()
            .map(|r| {
                (
                    (r.observation.city.clone(), r.observation.timestamp),
                    (r.moving_avg, r.moving_std),
                )
            })
            .collect()
    }

    #[test]
    fn full_window_series_has_single_defined_point() {
        let data = series("Moscow", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let rolled = rolling_sequential(&data, 7).unwrap();

        let defined: Vec<_> = rolled.iter().filter(|r| r.moving_avg.is_some()).collect();
        assert_eq!(defined.len(), 1);
        assert_eq!(defined[0].observation.temperature, 4.0);
        assert_eq!(defined[0].moving_avg, Some(4.0));
    }

    #[test]
    fn odd_window_mean_and_std() {
        let data = series("Berlin", &[2.0, 4.0, 6.0, 8.0, 10.0]);
        let rolled = rolling_sequential(&data, 3).unwrap();

        assert_eq!(rolled[0].moving_avg, None);
        assert_eq!(rolled[1].moving_avg, Some(4.0));
        assert_eq!(rolled[1].moving_std, Some(2.0));
        assert_eq!(rolled[3].moving_avg, Some(8.0));
        assert_eq!(rolled[4].moving_avg, None);
        assert_eq!(rolled[4].moving_std, None);
    }

    #[test]
    fn even_window_leans_backwards() {
        let data = series("Paris", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let rolled = rolling_sequential(&data, 4).unwrap();

        let avgs: Vec<_> = rolled.iter().map(|r| r.moving_avg).collect();
        // Position 2 averages [0..=3], position 3 averages [1..=4].
        assert_eq!(avgs, vec![None, None, Some(2.5), Some(3.5), None]);
    }

    #[test]
    fn window_of_one_has_mean_but_no_std() {
        let data = series("Tokyo", &[5.0, 6.0]);
        let rolled = rolling_sequential(&data, 1).unwrap();

        assert_eq!(rolled[0].moving_avg, Some(5.0));
        assert_eq!(rolled[0].moving_std, None);
    }

    #[test]
    fn short_series_has_no_statistics() {
        let data = series("Cairo", &[20.0, 21.0]);
        let rolled = rolling_sequential(&data, 5).unwrap();
        assert!(rolled.iter().all(|r| r.moving_avg.is_none() && r.moving_std.is_none()));
    }

    #[test]
    fn zero_window_is_rejected() {
        let data = series("Cairo", &[20.0]);
        assert_eq!(rolling_sequential(&data, 0), Err(AnalysisError::InvalidWindow(0)));
        assert_eq!(rolling_parallel(&data, 0), Err(AnalysisError::InvalidWindow(0)));
    }

    #[test]
    fn windows_never_span_cities() {
        let mut data = series("A", &[0.0, 0.0, 0.0]);
        data.extend(series("B", &[100.0, 100.0, 100.0]));

        let rolled = rolling_sequential(&data, 3).unwrap();
        assert_eq!(rolled[1].moving_avg, Some(0.0));
        assert_eq!(rolled[2].moving_avg, None);
        assert_eq!(rolled[3].moving_avg, None);
        assert_eq!(rolled[4].moving_avg, Some(100.0));
    }

    #[test]
    fn sequential_keeps_input_order_and_sorts_within_city() {
        // Rows shuffled: the statistics still follow chronological order.
        let data = vec![obs("A", 2, 3.0), obs("B", 0, 10.0), obs("A", 0, 1.0), obs("A", 1, 2.0)];
        let rolled = rolling_sequential(&data, 3).unwrap();

        let cities: Vec<_> = rolled.iter().map(|r| r.observation.city.as_str()).collect();
        assert_eq!(cities, vec!["A", "B", "A", "A"]);
        assert_eq!(rolled[3].observation.temperature, 2.0);
        assert_eq!(rolled[3].moving_avg, Some(2.0));
        assert_eq!(rolled[0].moving_avg, None);
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut data = Vec::new();
        for (c, city) in ["Moscow", "Dubai", "Sydney", "Rome", "Lima"].iter().enumerate() {
            for day in 0..60u32 {
                let t = (day as f64 * 0.37 + c as f64).sin() * 10.0 + c as f64 * 3.0;
                data.push(obs(city, day, t));
            }
        }
        data.reverse();

        for window in [1, 2, 7, 30] {
            let sequential = rolling_sequential(&data, window).unwrap();
            let parallel = rolling_parallel(&data, window).unwrap();

            assert_eq!(sequential.len(), parallel.len());
            assert_eq!(by_key(&sequential), by_key(&parallel));
        }
    }

    #[test]
    fn parallel_output_is_chronological_per_city() {
        let data = vec![obs("A", 2, 3.0), obs("B", 0, 10.0), obs("A", 0, 1.0), obs("A", 1, 2.0)];
        let rolled = rolling_parallel(&data, 3).unwrap();

        let a: Vec<_> = rolled
            .iter()
            .filter(|r| r.observation.city == "A")
            .map(|r| r.observation.temperature)
            .collect();
        assert_eq!(a, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_dataset_is_fine() {
        assert!(rolling_parallel(&[], 3).unwrap().is_empty());
        assert!(rolling_sequential(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn worker_count_is_bounded_by_cities() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(1000) >= 1);
        assert!(worker_count(0) >= 1);
    }
}
