//! Fake collaborators and helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::BoxStream;
use parking_lot::Mutex;
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::{Notify, watch};
use weatherapp_core::{
    City, FavouriteStore, FavouritesError, Forecast, LocalFavouriteStore, Weather, WeatherError,
    WeatherService,
};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// How the fake answers one query.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail,
    /// Answers `Ok` only after the gate is notified.
    Gated(Arc<Notify>, T),
}

#[derive(Debug, Default)]
pub struct FakeWeatherService {
    current: Mutex<HashMap<String, Reply<Weather>>>,
    forecasts: Mutex<HashMap<String, Reply<Forecast>>>,
    searches: Mutex<HashMap<String, Reply<Vec<City>>>>,
    completed_searches: Mutex<Vec<String>>,
    requested_days: Mutex<Vec<u32>>,
}

impl FakeWeatherService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_current(&self, city: &City, reply: Reply<Weather>) {
        self.current.lock().insert(city.api_query(), reply);
    }

    pub fn set_forecast(&self, city: &City, reply: Reply<Forecast>) {
        self.forecasts.lock().insert(city.api_query(), reply);
    }

    pub fn set_search(&self, query: &str, reply: Reply<Vec<City>>) {
        self.searches.lock().insert(query.to_string(), reply);
    }

    pub fn completed_searches(&self) -> Vec<String> {
        self.completed_searches.lock().clone()
    }

    pub fn requested_days(&self) -> Vec<u32> {
        self.requested_days.lock().clone()
    }
}

async fn answer<T>(reply: Option<Reply<T>>, what: &str) -> Result<T, WeatherError> {
    match reply {
        Some(Reply::Ok(value)) => Ok(value),
        Some(Reply::Gated(gate, value)) => {
            gate.notified().await;
            Ok(value)
        }
        Some(Reply::Fail) => Err(WeatherError::Http {
            endpoint: "fake",
            status: 503,
            body: "unavailable".to_string(),
        }),
        None => Err(WeatherError::InvalidRequest(format!("no fake reply for {what}"))),
    }
}

#[async_trait]
impl WeatherService for FakeWeatherService {
    async fn current_weather(&self, query: &str) -> Result<Weather, WeatherError> {
        let reply = self.current.lock().get(query).cloned();
        answer(reply, query).await
    }

    async fn forecast(&self, query: &str, days: u32) -> Result<Forecast, WeatherError> {
        self.requested_days.lock().push(days);
        let reply = self.forecasts.lock().get(query).cloned();
        answer(reply, query).await
    }

    async fn search_cities(&self, query: &str) -> Result<Vec<City>, WeatherError> {
        let reply = self.searches.lock().get(query).cloned();
        let result = answer(reply, query).await;
        self.completed_searches.lock().push(query.to_string());
        result
    }
}

/// Reads like the local store but refuses every write.
#[derive(Debug)]
pub struct ReadOnlyFavourites {
    inner: LocalFavouriteStore,
}

impl ReadOnlyFavourites {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: LocalFavouriteStore::in_memory() })
    }
}

#[async_trait]
impl FavouriteStore for ReadOnlyFavourites {
    fn observe_favourites(&self) -> BoxStream<'static, Vec<City>> {
        self.inner.observe_favourites()
    }

    fn observe_is_favourite(&self, city_id: u32) -> BoxStream<'static, bool> {
        self.inner.observe_is_favourite(city_id)
    }

    async fn add_favourite(&self, _city: &City) -> Result<(), FavouritesError> {
        Err(read_only())
    }

    async fn remove_favourite(&self, _city_id: u32) -> Result<(), FavouritesError> {
        Err(read_only())
    }
}

fn read_only() -> FavouritesError {
    FavouritesError::Io {
        path: PathBuf::from("/read-only/favourites.json"),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
    }
}

pub fn city(id: u32, name: &str) -> City {
    City::new(id, name, "Testland")
}

pub fn weather(temp: f64) -> Weather {
    Weather {
        temperature_c: temp,
        condition_text: "Sunny".to_string(),
        condition_icon_url: format!("https://cdn.example/128x128/{temp}.png"),
        observed_at: DateTime::from_timestamp(1_737_370_800, 0).unwrap(),
    }
}

pub fn forecast(days: u32) -> Forecast {
    let current = weather(10.0);
    let upcoming = (1..days)
        .map(|day| Weather {
            observed_at: current.observed_at + ChronoDuration::days(day as i64),
            ..weather(10.0 + day as f64)
        })
        .collect();
    Forecast { current, upcoming }
}

/// Waits until `state` satisfies `done`, failing the test after [`TIMEOUT`].
pub async fn wait_until<S>(mut state: watch::Receiver<S>, done: impl FnMut(&S) -> bool) -> S
where
    S: Clone,
{
    let reached = tokio::time::timeout(TIMEOUT, state.wait_for(done))
        .await
        .expect("state was not reached in time")
        .expect("store was disposed");
    S::clone(&reached)
}
