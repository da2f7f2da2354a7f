use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode};
use weatherapp_core::{Config, LocalFavouriteStore, provider::service_from_config};

use crate::{app, output};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherapp", version, about = "Weather for your favourite cities")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com key and forecast length.
    Configure,

    /// Browse favourites, search cities and open forecasts.
    App {
        /// Start from the favourites screen instead of the last session.
        #[arg(long)]
        fresh: bool,
    },

    /// Show current weather and the forecast for a location.
    Show {
        /// City name, postcode or `id:<city id>`.
        query: String,

        /// Forecast length including today; defaults to the configured value.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Search cities by name.
    Search {
        query: String,
    },

    /// List favourite cities.
    Favourites,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure().await,
            Command::App { fresh } => app::run(&Config::load()?, fresh).await,
            Command::Show { query, days } => show(&Config::load()?, &query, days).await,
            Command::Search { query } => search(&Config::load()?, &query).await,
            Command::Favourites => favourites(&Config::load()?).await,
        }
    }
}

async fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = app::prompt(|| {
        Password::new("WeatherAPI.com key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
    })
    .await?;
    let Some(api_key) = api_key else {
        println!("Configuration cancelled.");
        return Ok(());
    };
    if api_key.trim().is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }
    config.set_api_key(api_key.trim().to_string());

    let current_days = config.forecast_days;
    let days = app::prompt(move || {
        CustomType::<u32>::new("Forecast days (including today):")
            .with_default(current_days)
            .with_validator(|days: &u32| {
                Ok(if *days >= 1 {
                    inquire::validator::Validation::Valid
                } else {
                    inquire::validator::Validation::Invalid("At least one day".into())
                })
            })
            .prompt()
    })
    .await?;
    if let Some(days) = days {
        config.forecast_days = days;
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(config: &Config, query: &str, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(config.forecast_days);
    if days == 0 {
        return Err(anyhow!("--days must be at least 1"));
    }

    let service = service_from_config(config)?;
    let forecast = service
        .forecast(query, days)
        .await
        .with_context(|| format!("Failed to fetch the forecast for '{query}'"))?;

    println!("== {query} ==");
    for line in output::forecast_lines(&forecast) {
        println!("{line}");
    }
    Ok(())
}

async fn search(config: &Config, query: &str) -> Result<()> {
    let service = service_from_config(config)?;
    let cities = service
        .search_cities(query)
        .await
        .with_context(|| format!("Failed to search for '{query}'"))?;

    if cities.is_empty() {
        println!("No cities found for '{query}'.");
    }
    for city in &cities {
        println!("{}", output::city_line(city));
    }
    Ok(())
}

async fn favourites(config: &Config) -> Result<()> {
    let path = config.favourites_file_path()?;
    let store = LocalFavouriteStore::open(&path)
        .await
        .with_context(|| format!("Failed to open favourites: {}", path.display()))?;

    let cities = store.snapshot();
    if cities.is_empty() {
        println!("No favourite cities yet.");
    }
    for city in &cities {
        println!("{}", output::city_line(city));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_show_with_days() {
        let cli = Cli::try_parse_from(["weatherapp", "show", "Oslo", "--days", "3"]).unwrap();
        match cli.command {
            Command::Show { query, days } => {
                assert_eq!(query, "Oslo");
                assert_eq!(days, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_fresh_app_session() {
        let cli = Cli::try_parse_from(["weatherapp", "app", "--fresh"]).unwrap();
        assert!(matches!(cli.command, Command::App { fresh: true }));
    }
}
