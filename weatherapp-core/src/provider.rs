use crate::{
    Config,
    model::{City, Forecast, Weather},
    provider::weatherapi::WeatherApiService,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod weatherapi;

/// Failure modes of a [`WeatherService`] call.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} request failed with status {status}: {body}")]
    Http { endpoint: &'static str, status: u16, body: String },

    #[error("failed to parse {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl WeatherError {
    /// Transport-level failure (no connectivity, timeout, non-success status).
    pub fn is_transport(&self) -> bool {
        matches!(self, WeatherError::Network { .. } | WeatherError::Http { .. })
    }
}

/// Remote source of weather data and city lookups.
#[async_trait]
pub trait WeatherService: Send + Sync + Debug {
    async fn current_weather(&self, query: &str) -> Result<Weather, WeatherError>;

    /// `days` counts today; the result holds `days - 1` upcoming entries.
    async fn forecast(&self, query: &str, days: u32) -> Result<Forecast, WeatherError>;

    /// An empty result is a valid answer, not an error.
    async fn search_cities(&self, query: &str) -> Result<Vec<City>, WeatherError>;
}

/// Construct the WeatherAPI.com client from config.
pub fn service_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherService>> {
    let api_key = config.api_key()?;
    let service = WeatherApiService::new(api_key, config.base_url(), config.request_timeout())?;
    Ok(Arc::new(service))
}
