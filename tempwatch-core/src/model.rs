use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use std::{fmt, str::FromStr};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }

    pub const fn all() -> &'static [Season] {
        &[Season::Winter, Season::Spring, Season::Summer, Season::Autumn]
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            _ => Err(ModelError::UnknownSeason(value.to_string())),
        }
    }
}

/// Parse an ISO-8601 timestamp as found in the historical datasets.
///
/// Accepts RFC 3339 (offset converted to UTC wall time), `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS` and bare dates, which map to midnight.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ModelError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ModelError::InvalidTimestamp(value.to_string()))
}

/// One daily temperature reading for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub city: String,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub season: Season,
}

/// An observation with its centered rolling statistics.
///
/// Both statistics are `None` where the window does not fit inside the
/// city's series. `moving_std` is also `None` for a window of one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingRecord {
    #[serde(flatten)]
    pub observation: Observation,
    pub moving_avg: Option<f64>,
    pub moving_std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: RollingRecord,
    pub anomaly: bool,
}

/// Anything that carries an [`Observation`]: raw rows and both enriched forms.
pub trait AsObservation {
    fn observation(&self) -> &Observation;
}

impl AsObservation for Observation {
    fn observation(&self) -> &Observation {
        self
    }
}

impl AsObservation for RollingRecord {
    fn observation(&self) -> &Observation {
        &self.observation
    }
}

impl AsObservation for AnnotatedRecord {
    fn observation(&self) -> &Observation {
        &self.record.observation
    }
}

/// Descriptive statistics for one (city, season) group, rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalSummary {
    pub city: String,
    pub season: Season,
    pub temperature_mean: f64,
    /// Sample standard deviation; `None` for a single-observation group.
    pub temperature_std: Option<f64>,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub count: usize,
}

/// Current conditions reported by the live weather service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub description: String,
    pub icon: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub error: String,
    /// Upstream status code when one was reported, e.g. 401 for a bad key.
    pub code: Option<u16>,
}

impl FetchFailure {
    pub fn is_invalid_credential(&self) -> bool {
        self.code == Some(401)
    }
}

/// Outcome of one live fetch. Failures are values, never errors.
///
/// Serialized flat with a `success` flag next to the payload fields.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveObservation {
    Success(CurrentWeather),
    Failure(FetchFailure),
}

#[derive(Serialize)]
struct Flagged<'a, T> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Deserialize)]
struct FlaggedOwned {
    success: bool,
    #[serde(flatten)]
    body: serde_json::Value,
}

impl Serialize for LiveObservation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LiveObservation::Success(weather) => Flagged {
                success: true,
                body: weather,
            }
            .serialize(serializer),
            LiveObservation::Failure(failure) => Flagged {
                success: false,
                body: failure,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LiveObservation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let FlaggedOwned { success, body } = FlaggedOwned::deserialize(deserializer)?;
        if success {
            serde_json::from_value(body)
                .map(LiveObservation::Success)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(body)
                .map(LiveObservation::Failure)
                .map_err(D::Error::custom)
        }
    }
}

impl LiveObservation {
    pub fn is_success(&self) -> bool {
        matches!(self, LiveObservation::Success(_))
    }

    pub fn weather(&self) -> Option<&CurrentWeather> {
        match self {
            LiveObservation::Success(weather) => Some(weather),
            LiveObservation::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            LiveObservation::Success(_) => None,
            LiveObservation::Failure(failure) => Some(failure),
        }
    }
}
