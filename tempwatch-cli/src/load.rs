use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

use tempwatch_core::{
    Observation,
    model::{Season, parse_timestamp},
};

/// One CSV row as written by the dataset generator. Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct RawRow {
    city: String,
    timestamp: String,
    temperature: f64,
    season: String,
}

impl RawRow {
    fn into_observation(self) -> Result<Observation> {
        Ok(Observation {
            city: self.city,
            timestamp: parse_timestamp(&self.timestamp)?,
            temperature: self.temperature,
            season: self.season.parse::<Season>()?,
        })
    }
}

pub fn load_dataset(path: &Path) -> Result<Vec<Observation>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let dataset = read_dataset(file)
        .with_context(|| format!("Failed to load dataset: {}", path.display()))?;

    tracing::info!(rows = dataset.len(), path = %path.display(), "dataset loaded");
    Ok(dataset)
}

/// Parses the whole CSV, stopping at the first malformed row.
pub fn read_dataset<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut dataset = Vec::new();
    for (index, row) in csv.deserialize::<RawRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = row.with_context(|| format!("Malformed row at line {line}"))?;
        let observation = row
            .into_observation()
            .with_context(|| format!("Invalid value at line {line}"))?;
        dataset.push(observation);
    }

    if dataset.is_empty() {
        bail!("Dataset contains no rows");
    }

    Ok(dataset)
}
