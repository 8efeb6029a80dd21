use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    error::FetchError,
    model::{CurrentWeather, LiveObservation},
};

use super::{LiveSource, fail_all};

pub const DEFAULT_ENDPOINT: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Per-request timeout for both the async and the blocking client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const UNITS: &str = "metric";
const LANGUAGE: &str = "ru";

/// Async OpenWeatherMap client. All requests share one connection pool.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http,
        })
    }

    /// Points the client at another URL, e.g. a mock server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replaces the default per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, FetchError> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    async fn try_fetch(&self, city: &str) -> Result<CurrentWeather, FetchError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(&query(&self.api_key, city))
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = res.status();
        let body = res.text().await.map_err(reqwest::Error::without_url)?;

        interpret(city, status, &body)
    }
}

#[async_trait]
impl LiveSource for OpenWeatherClient {
    async fn fetch(&self, city: &str) -> LiveObservation {
        debug!(city, "fetching current weather");
        into_observation(city, self.try_fetch(city).await)
    }
}

/// Blocking OpenWeatherMap client for single synchronous calls.
///
/// Must not be created or used from inside an async runtime worker; wrap the
/// call in `spawn_blocking` there.
#[derive(Debug, Clone)]
pub struct BlockingOpenWeatherClient {
    api_key: String,
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl BlockingOpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, FetchError> {
        self.http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(self)
    }

    pub fn fetch(&self, city: &str) -> LiveObservation {
        debug!(city, "fetching current weather (blocking)");
        into_observation(city, self.try_fetch(city))
    }

    fn try_fetch(&self, city: &str) -> Result<CurrentWeather, FetchError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(&query(&self.api_key, city))
            .send()
            .map_err(reqwest::Error::without_url)?;

        let status = res.status();
        let body = res.text().map_err(reqwest::Error::without_url)?;

        interpret(city, status, &body)
    }
}

/// One blocking request for `city`. Call from a blocking context only.
pub fn fetch_current_blocking(endpoint: &str, api_key: &str, city: &str) -> LiveObservation {
    match BlockingOpenWeatherClient::new(api_key) {
        Ok(client) => client.with_endpoint(endpoint).fetch(city),
        Err(err) => into_observation(city, Err(err)),
    }
}

/// Concurrent requests for every city over one shared client, in input order.
pub async fn fetch_current_many(
    endpoint: &str,
    api_key: &str,
    cities: &[String],
) -> Vec<LiveObservation> {
    match OpenWeatherClient::new(api_key) {
        Ok(client) => client.with_endpoint(endpoint).fetch_many(cities).await,
        Err(err) => fail_all(cities, &err.to_string()),
    }
}

fn query<'a>(api_key: &'a str, city: &'a str) -> [(&'static str, &'a str); 4] {
    [
        ("q", city),
        ("appid", api_key),
        ("units", UNITS),
        ("lang", LANGUAGE),
    ]
}

fn into_observation(city: &str, result: Result<CurrentWeather, FetchError>) -> LiveObservation {
    match result {
        Ok(weather) => LiveObservation::Success(weather),
        Err(err) => {
            warn!(city, code = ?err.code(), error = %err, "live weather fetch failed");
            err.into()
        }
    }
}

/// Turns a raw response into weather or a classified failure.
///
/// Shared by both clients so they treat identical responses identically.
fn interpret(city: &str, status: StatusCode, body: &str) -> Result<CurrentWeather, FetchError> {
    if !status.is_success() {
        return Err(upstream_error(status, body));
    }

    let parsed: OwCurrentResponse = serde_json::from_str(body)?;

    let condition = parsed.weather.into_iter().next().ok_or_else(|| FetchError::Upstream {
        message: "OpenWeather response contained no weather conditions".to_string(),
        code: None,
    })?;

    let timestamp = parsed
        .dt
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(CurrentWeather {
        city: city.to_string(),
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        humidity: parsed.main.humidity,
        pressure: parsed.main.pressure,
        description: condition.description,
        icon: condition.icon,
        timestamp,
    })
}

fn upstream_error(status: StatusCode, body: &str) -> FetchError {
    match serde_json::from_str::<OwErrorResponse>(body) {
        Ok(parsed) => FetchError::Upstream {
            message: parsed.message.unwrap_or_else(|| "Unknown error".to_string()),
            code: parsed.cod.as_ref().and_then(cod_as_u16).or(Some(status.as_u16())),
        },
        Err(_) => FetchError::Upstream {
            message: format!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(body)
            ),
            code: Some(status.as_u16()),
        },
    }
}

/// OpenWeather reports `cod` as a number or as a numeric string.
fn cod_as_u16(cod: &serde_json::Value) -> Option<u16> {
    match cod {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: Option<i64>,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwErrorResponse {
    cod: Option<serde_json::Value>,
    message: Option<String>,
}
