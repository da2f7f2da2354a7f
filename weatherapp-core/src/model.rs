use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A city as returned by the provider's search endpoint.
///
/// Identity is the server-assigned `id`; name and country are display data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct City {
    pub id: u32,
    pub name: String,
    pub country: String,
}

impl City {
    pub fn new(id: u32, name: impl Into<String>, country: impl Into<String>) -> Self {
        Self { id, name: name.into(), country: country.into() }
    }

    /// Query string the provider understands for an exact city lookup.
    pub fn api_query(&self) -> String {
        format!("id:{}", self.id)
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.name, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature_c: f64,
    pub condition_text: String,
    pub condition_icon_url: String,
    pub observed_at: DateTime<Utc>,
}

/// Current conditions plus the following days, oldest first.
///
/// `upcoming` never contains the current day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub current: Weather,
    pub upcoming: Vec<Weather>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_query_uses_id_lookup() {
        let city = City::new(2801268, "London", "United Kingdom");
        assert_eq!(city.api_query(), "id:2801268");
        assert_eq!(city.to_string(), "London, United Kingdom");
    }
}
