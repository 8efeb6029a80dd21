use async_trait::async_trait;
use futures::future::join_all;
use std::fmt::Debug;

use crate::{
    error::FetchError,
    model::{FetchFailure, LiveObservation},
};

pub mod openweather;

pub use openweather::{
    BlockingOpenWeatherClient, DEFAULT_ENDPOINT, OpenWeatherClient, fetch_current_blocking,
    fetch_current_many,
};

/// A service that reports current conditions for a city.
///
/// Implementations never fail: every problem is folded into
/// [`LiveObservation::Failure`].
#[async_trait]
pub trait LiveSource: Send + Sync + Debug {
    async fn fetch(&self, city: &str) -> LiveObservation;

    /// Fetches all cities concurrently on the calling task.
    ///
    /// Results line up with `cities`; one failure does not affect the others.
    async fn fetch_many(&self, cities: &[String]) -> Vec<LiveObservation> {
        join_all(cities.iter().map(|city| self.fetch(city))).await
    }
}

impl From<FetchError> for LiveObservation {
    fn from(err: FetchError) -> Self {
        LiveObservation::Failure(FetchFailure {
            code: err.code(),
            error: err.to_string(),
        })
    }
}

/// One failure per city, used when the client itself could not be built.
pub(crate) fn fail_all(cities: &[String], message: &str) -> Vec<LiveObservation> {
    cities
        .iter()
        .map(|_| {
            LiveObservation::Failure(FetchFailure {
                error: message.to_string(),
                code: None,
            })
        })
        .collect()
}
