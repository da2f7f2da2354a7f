//! Plain-text rendering of models and screen states.

use chrono::{DateTime, Local, Utc};
use weatherapp_core::{
    City, Forecast, Weather,
    screen::{
        details::{self, ForecastState},
        favourites::{self, WeatherState},
        search::{self, SearchState},
    },
};

pub fn format_temp(temp_c: f64) -> String {
    format!("{}°C", temp_c.round() as i64)
}

pub fn format_day(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%a %d %b").to_string()
}

pub fn format_full_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%A, %d %B %Y").to_string()
}

pub fn weather_line(weather: &Weather) -> String {
    format!("{:>6}  {}", format_temp(weather.temperature_c), weather.condition_text)
}

pub fn forecast_lines(forecast: &Forecast) -> Vec<String> {
    let mut lines = vec![
        format!("Now ({})", format_full_date(forecast.current.observed_at)),
        format!("  {}", weather_line(&forecast.current)),
    ];

    if !forecast.upcoming.is_empty() {
        lines.push("Upcoming".to_string());
        lines.extend(
            forecast
                .upcoming
                .iter()
                .map(|w| format!("  {:<10} {}", format_day(w.observed_at), weather_line(w))),
        );
    }
    lines
}

pub fn city_line(city: &City) -> String {
    format!("{city} (#{})", city.id)
}

pub fn favourites_lines(state: &favourites::State) -> Vec<String> {
    let mut lines = vec!["== Favourites ==".to_string()];

    if !state.favourites_loaded {
        lines.push("Loading favourites...".to_string());
        return lines;
    }
    if state.city_items.is_empty() {
        lines.push("No favourite cities yet.".to_string());
        return lines;
    }

    lines.extend(state.city_items.iter().map(|item| {
        let weather = match &item.weather_state {
            WeatherState::Initial | WeatherState::Loading => "loading...".to_string(),
            WeatherState::Loaded { temp_c, .. } => format_temp(*temp_c),
            WeatherState::Error => "unavailable".to_string(),
        };
        format!("  {:<32} {weather}", item.city.to_string())
    }));
    lines
}

pub fn search_lines(state: &search::State) -> Vec<String> {
    let mut lines = vec![format!("== Search: {} ==", state.query)];

    match &state.search_state {
        SearchState::Initial => lines.push("Type a city name to search.".to_string()),
        SearchState::Loading => lines.push("Searching...".to_string()),
        SearchState::EmptyResult => lines.push(format!("Nothing found for '{}'.", state.query)),
        SearchState::Error => lines.push("Search failed. Try again.".to_string()),
        SearchState::SuccessLoaded(cities) => {
            lines.extend(cities.iter().map(|c| format!("  {}", city_line(c))));
        }
    }

    if state.save_failed {
        lines.push("Could not save the city to favourites.".to_string());
    }
    lines
}

pub fn details_lines(state: &details::State) -> Vec<String> {
    let marker = if state.is_favourite { " ★" } else { "" };
    let mut lines = vec![format!("== {}{marker} ==", state.city)];

    match &state.forecast_state {
        ForecastState::Initial | ForecastState::Loading => {
            lines.push("Loading forecast...".to_string());
        }
        ForecastState::Loaded(forecast) => lines.extend(forecast_lines(forecast)),
        ForecastState::Error => lines.push("Forecast unavailable.".to_string()),
    }
    lines
}
