use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use serde::Serialize;
use std::{num::NonZeroUsize, path::PathBuf, thread};

use tempwatch_core::{
    AnalysisSettings, Config, LiveObservation, Observation, PerformanceComparison,
    SeasonalSummary,
    analysis::{
        self, CrossCheck, cross_check_live,
        report::{self, AnomalySummary, CityReport},
    },
    live::{fetch_current_blocking, fetch_current_many},
    timing::{timed, timed_async},
};

use crate::{load::load_dataset, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "tempwatch",
    version,
    about = "Historical temperature analysis and live anomaly checks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeatherMap API key and analysis defaults.
    Configure {
        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Rolling statistics, anomalies and seasonal profile for a dataset.
    Analyze {
        /// CSV file with city, timestamp, temperature and season columns.
        data: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Only report on this city.
        #[arg(long)]
        city: Option<String>,

        /// Print machine-readable JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Current temperature for a city, checked against its seasonal history.
    Current {
        /// CSV file with the city's history.
        data: PathBuf,

        city: String,

        #[arg(long)]
        api_key: Option<String>,
    },

    /// Current weather for several cities, fetched concurrently.
    Fetch {
        #[arg(required = true)]
        cities: Vec<String>,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct AnalysisArgs {
    /// Rolling window size in days.
    #[arg(long)]
    window: Option<usize>,

    /// Anomaly threshold in standard deviations.
    #[arg(long)]
    threshold: Option<f64>,
}

impl AnalysisArgs {
    fn apply(&self, defaults: &AnalysisSettings) -> Result<AnalysisSettings> {
        let settings = AnalysisSettings {
            window: self.window.unwrap_or(defaults.window),
            threshold: self.threshold.unwrap_or(defaults.threshold),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeOutput {
    window: usize,
    threshold: f64,
    performance: PerformanceComparison,
    anomalies: AnomalySummary,
    seasonal: Vec<SeasonalSummary>,
    reports: Vec<CityReport>,
}

#[derive(Debug, Serialize)]
struct FetchOutput<'a> {
    elapsed_secs: f64,
    results: &'a [LiveObservation],
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure { analysis } => configure(config, &analysis),
            Command::Analyze {
                data,
                analysis,
                city,
                json,
            } => {
                let settings = analysis.apply(&config.analysis)?;
                analyze(data, settings, city, json).await
            }
            Command::Current {
                data,
                city,
                api_key,
            } => {
                let api_key = resolve_api_key(&config, api_key)?;
                current(&config, data, city, api_key).await
            }
            Command::Fetch {
                cities,
                api_key,
                json,
            } => {
                let api_key = resolve_api_key(&config, api_key)?;
                fetch(&config, &cities, &api_key, json).await
            }
        }
    }
}

fn configure(mut config: Config, analysis: &AnalysisArgs) -> Result<()> {
    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key);
    config.analysis = analysis.apply(&config.analysis)?;

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn resolve_api_key(config: &Config, flag: Option<String>) -> Result<String> {
    match flag {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => config.require_api_key().map(str::to_string),
    }
}

async fn analyze(
    data: PathBuf,
    settings: AnalysisSettings,
    city: Option<String>,
    json: bool,
) -> Result<()> {
    // Loading and the rolling computation are CPU-bound.
    let (dataset, run) = tokio::task::spawn_blocking(move || -> Result<_> {
        let dataset = load_dataset(&data)?;
        let run = analysis::run_pipeline(&dataset, settings.window, settings.threshold)?;
        Ok((dataset, run))
    })
    .await
    .context("Analysis task panicked")??;

    let cities = match city {
        Some(city) => vec![city],
        None => report::cities(&dataset),
    };

    let reports = cities
        .iter()
        .map(|city| {
            report::city_report(&run.annotated, city)
                .ok_or_else(|| anyhow!("City '{city}' not found in dataset"))
        })
        .collect::<Result<Vec<_>>>()?;

    let anomalies = report::anomaly_summary(&run.annotated);

    if json {
        let seasonal = run
            .seasonal
            .into_iter()
            .filter(|s| cities.contains(&s.city))
            .collect();
        let output = AnalyzeOutput {
            window: settings.window,
            threshold: settings.threshold,
            performance: run.performance,
            anomalies,
            seasonal,
            reports,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}\n", render::performance(&run.performance, available_cpus()));
    println!("{}\n", render::anomalies(&anomalies, settings.threshold));
    for report in &reports {
        println!("{}\n", render::seasonal_table(&report.overview.city, &run.seasonal));
        println!("{}\n", render::city_report(report));
    }

    Ok(())
}

async fn current(config: &Config, data: PathBuf, city: String, api_key: String) -> Result<()> {
    let dataset: Vec<Observation> = tokio::task::spawn_blocking(move || load_dataset(&data))
        .await
        .context("Dataset loading task panicked")??;

    let season = report::current_season(&dataset, &city)
        .ok_or_else(|| anyhow!("City '{city}' not found in dataset"))?;
    let seasonal = analysis::seasonal_stats(&dataset);

    let endpoint = config.endpoint().to_string();

    // The blocking client owns its own runtime and must stay off async workers.
    let sync = {
        let (endpoint, api_key, city) = (endpoint.clone(), api_key.clone(), city.clone());
        tokio::task::spawn_blocking(move || {
            timed(|| fetch_current_blocking(&endpoint, &api_key, &city))
        })
        .await
        .context("Synchronous fetch task panicked")?
    };

    let concurrent = timed_async(fetch_current_many(
        &endpoint,
        &api_key,
        std::slice::from_ref(&city),
    ))
    .await;

    println!("{}", render::live(&sync.value));

    let check: Option<CrossCheck> = cross_check_live(&sync.value, &seasonal, &city, season);
    match (&sync.value, check) {
        (LiveObservation::Success(_), Some(check)) => {
            println!("\n{}", render::cross_check(&check, season));
        }
        (LiveObservation::Success(_), None) => {
            println!("\nNot enough {season} history for {city} to judge the reading.");
        }
        (LiveObservation::Failure(_), _) => {}
    }

    println!("\nSynchronous request: {:.3} s", sync.secs());
    match concurrent.value.first() {
        Some(result) if result.is_success() => {
            println!("Concurrent request:  {:.3} s", concurrent.secs());
        }
        Some(result) => println!("Concurrent request failed: {}", render::live(result)),
        None => {}
    }

    Ok(())
}

async fn fetch(config: &Config, cities: &[String], api_key: &str, json: bool) -> Result<()> {
    let batch = timed_async(fetch_current_many(config.endpoint(), api_key, cities)).await;

    if json {
        let output = FetchOutput {
            elapsed_secs: batch.secs(),
            results: &batch.value,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (city, result) in cities.iter().zip(&batch.value) {
        match result {
            LiveObservation::Success(_) => println!("{}", render::live(result)),
            LiveObservation::Failure(_) => println!("{city}: {}", render::live(result)),
        }
    }
    println!(
        "\nFetched {} cities concurrently in {:.3} s",
        cities.len(),
        batch.secs()
    );

    Ok(())
}

fn available_cpus() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
