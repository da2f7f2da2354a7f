//! Core library for the `weatherapp` client.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The WeatherAPI.com client and the persisted favourites
//! - Shared domain models (cities, weather, forecasts)
//! - A small MVI store runtime and the three screens built on it
//! - The navigation root that stacks those screens
//!
//! It is used by `weatherapp-cli`, but the screens know nothing about how
//! they are rendered.

pub mod config;
pub mod favourites;
pub mod model;
pub mod provider;
pub mod root;
pub mod screen;
pub mod store;

pub use config::Config;
pub use favourites::{FavouriteStore, FavouritesError, LocalFavouriteStore};
pub use model::{City, Forecast, Weather};
pub use provider::{WeatherError, WeatherService};
pub use root::{Child, Dependencies, Navigation, NavigationError, RootComponent, ScreenConfig};
pub use store::Store;
