use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::{City, Forecast, Weather};

use super::{WeatherError, WeatherService};

const CURRENT: &str = "current.json";
const FORECAST: &str = "forecast.json";
const SEARCH: &str = "search.json";

/// Client for the WeatherAPI.com REST API.
#[derive(Debug, Clone)]
pub struct WeatherApiService {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiService {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for WeatherAPI.com")?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { api_key, base_url, http })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%endpoint, ?params, "requesting WeatherAPI.com");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|source| WeatherError::Network { endpoint, source })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| WeatherError::Network { endpoint, source })?;

        if !status.is_success() {
            return Err(WeatherError::Http {
                endpoint,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| WeatherError::Decode { endpoint, source })
    }
}

#[async_trait]
impl WeatherService for WeatherApiService {
    async fn current_weather(&self, query: &str) -> Result<Weather, WeatherError> {
        let parsed: WaCurrentResponse = self.get_json(CURRENT, &[("q", query)]).await?;
        Ok(parsed.current.into_weather())
    }

    async fn forecast(&self, query: &str, days: u32) -> Result<Forecast, WeatherError> {
        if days == 0 {
            return Err(WeatherError::InvalidRequest(
                "forecast needs at least one day".to_string(),
            ));
        }

        let days_param = days.to_string();
        let parsed: WaForecastResponse =
            self.get_json(FORECAST, &[("q", query), ("days", days_param.as_str())]).await?;

        Ok(parsed.into_forecast(days))
    }

    async fn search_cities(&self, query: &str) -> Result<Vec<City>, WeatherError> {
        let parsed: Vec<WaCity> = self.get_json(SEARCH, &[("q", query)]).await?;
        Ok(parsed.into_iter().map(WaCity::into_city).collect())
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    last_updated_epoch: i64,
    temp_c: f64,
    condition: WaCondition,
}

impl WaCurrent {
    fn into_weather(self) -> Weather {
        Weather {
            temperature_c: self.temp_c,
            condition_text: self.condition.text,
            condition_icon_url: correct_icon_url(&self.condition.icon),
            observed_at: unix_to_utc(self.last_updated_epoch),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    avgtemp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date_epoch: i64,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    current: WaCurrent,
    forecast: WaForecast,
}

impl WaForecastResponse {
    fn into_forecast(self, days: u32) -> Forecast {
        let mut forecastday = self.forecast.forecastday;
        forecastday.sort_by_key(|d| d.date_epoch);

        // Day 0 is today and is already covered by `current`.
        let wanted = days.saturating_sub(1) as usize;
        let upcoming: Vec<_> = forecastday
            .into_iter()
            .skip(1)
            .take(wanted)
            .map(|d| Weather {
                temperature_c: d.day.avgtemp_c,
                condition_text: d.day.condition.text,
                condition_icon_url: correct_icon_url(&d.day.condition.icon),
                observed_at: unix_to_utc(d.date_epoch),
            })
            .collect();

        // Plans with a shorter forecast window answer with fewer days than asked.
        if upcoming.len() < wanted {
            warn!(
                requested_days = days,
                upcoming = upcoming.len(),
                "forecast shorter than requested"
            );
        }

        Forecast { current: self.current.into_weather(), upcoming }
    }
}

#[derive(Debug, Deserialize)]
struct WaCity {
    id: u32,
    name: String,
    country: String,
}

impl WaCity {
    fn into_city(self) -> City {
        City { id: self.id, name: self.name, country: self.country }
    }
}

/// Icons come back protocol-relative and at 64px.
fn correct_icon_url(icon: &str) -> String {
    let absolute = if icon.starts_with("//") { format!("https:{icon}") } else { icon.to_string() };
    absolute.replace("64x64", "128x128")
}

fn unix_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORECAST_JSON: &str = r#"{
        "location": {"name": "London", "country": "United Kingdom"},
        "current": {
            "last_updated_epoch": 1737370800,
            "temp_c": 4.2,
            "condition": {"text": "Fog", "icon": "//cdn.weatherapi.com/weather/64x64/day/248.png"}
        },
        "forecast": {"forecastday": [
            {"date_epoch": 1737417600, "day": {"avgtemp_c": 3.1, "condition": {"text": "Fog", "icon": "//cdn.weatherapi.com/weather/64x64/day/248.png"}}},
            {"date_epoch": 1737590400, "day": {"avgtemp_c": 6.0, "condition": {"text": "Sunny", "icon": "//cdn.weatherapi.com/weather/64x64/day/113.png"}}},
            {"date_epoch": 1737504000, "day": {"avgtemp_c": 5.5, "condition": {"text": "Cloudy", "icon": "//cdn.weatherapi.com/weather/64x64/day/119.png"}}},
            {"date_epoch": 1737676800, "day": {"avgtemp_c": 7.4, "condition": {"text": "Rain", "icon": "//cdn.weatherapi.com/weather/64x64/day/296.png"}}}
        ]}
    }"#;

    #[test]
    fn forecast_drops_today_and_keeps_chronological_order() {
        let parsed: WaForecastResponse = serde_json::from_str(FORECAST_JSON).unwrap();
        let forecast = parsed.into_forecast(4);

        assert_eq!(forecast.current.condition_text, "Fog");
        assert_eq!(forecast.upcoming.len(), 3);

        let texts: Vec<_> = forecast.upcoming.iter().map(|w| w.condition_text.as_str()).collect();
        assert_eq!(texts, ["Cloudy", "Sunny", "Rain"]);
        assert!(forecast.upcoming.windows(2).all(|w| w[0].observed_at < w[1].observed_at));
        assert!(forecast.upcoming[0].observed_at > forecast.current.observed_at);
    }

    #[test]
    fn forecast_is_trimmed_to_requested_days() {
        let parsed: WaForecastResponse = serde_json::from_str(FORECAST_JSON).unwrap();
        let forecast = parsed.into_forecast(2);
        assert_eq!(forecast.upcoming.len(), 1);

        let parsed: WaForecastResponse = serde_json::from_str(FORECAST_JSON).unwrap();
        assert!(parsed.into_forecast(1).upcoming.is_empty());
    }

    #[test]
    fn short_forecast_keeps_what_the_api_returned() {
        let parsed: WaForecastResponse = serde_json::from_str(FORECAST_JSON).unwrap();
        let forecast = parsed.into_forecast(7);

        assert_eq!(forecast.upcoming.len(), 3);
        assert_eq!(forecast.upcoming[2].condition_text, "Rain");
    }

    #[test]
    fn icon_urls_are_absolute_and_larger() {
        assert_eq!(
            correct_icon_url("//cdn.weatherapi.com/weather/64x64/night/116.png"),
            "https://cdn.weatherapi.com/weather/128x128/night/116.png"
        );
        assert_eq!(correct_icon_url("https://x/128x128/a.png"), "https://x/128x128/a.png");
    }

    #[test]
    fn search_results_map_to_cities() {
        let json = r#"[
            {"id": 2801268, "name": "London", "region": "City of London", "country": "United Kingdom", "lat": 51.52, "lon": -0.11, "url": "london"},
            {"id": 315398, "name": "London", "region": "Ontario", "country": "Canada", "lat": 42.98, "lon": -81.25, "url": "london-ontario"}
        ]"#;
        let parsed: Vec<WaCity> = serde_json::from_str(json).unwrap();
        let cities: Vec<City> = parsed.into_iter().map(WaCity::into_city).collect();

        assert_eq!(cities.len(), 2);
        assert_eq!(cities[1], City::new(315398, "London", "Canada"));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn zero_days_is_rejected_before_any_request() {
        let service =
            WeatherApiService::new("KEY".into(), "http://127.0.0.1:9", Duration::from_secs(1))
                .unwrap();
        let err = service.forecast("id:1", 0).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidRequest(_)));
    }
}
