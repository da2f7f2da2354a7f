//! Interactive session: renders the top of the screen stack and turns menu
//! choices into screen intents.

use anyhow::{Context, Result};
use inquire::{InquireError, Select, Text, error::InquireResult};
use std::{fmt, path::Path, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, warn};
use weatherapp_core::{
    Child, City, Config, Dependencies, LocalFavouriteStore, RootComponent,
    provider::service_from_config,
    screen::{
        details::{DetailsComponent, ForecastState},
        favourites::{FavouritesComponent, WeatherState},
        search::{OpenReason, SearchComponent, SearchState},
    },
};

use crate::output;

/// How long a screen may keep loading before it is rendered anyway.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);
/// How long to wait for the navigation an action should trigger.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(5);

enum Step {
    Stay,
    Navigate,
    Quit,
}

pub async fn run(config: &Config, fresh: bool) -> Result<()> {
    let weather = service_from_config(config)?;
    let favourites_path = config.favourites_file_path()?;
    let favourites = LocalFavouriteStore::open(&favourites_path)
        .await
        .with_context(|| format!("Failed to open favourites: {}", favourites_path.display()))?;

    let deps = Dependencies {
        weather,
        favourites: Arc::new(favourites),
        forecast_days: config.forecast_days,
    };

    let session_path = Config::session_file_path()?;
    let mut root =
        if fresh { RootComponent::new(deps) } else { restore(deps, &session_path).await };

    loop {
        let step = match root.active_child() {
            Child::Favourites(screen) => favourites_step(screen).await?,
            Child::Search(screen) => search_step(screen).await?,
            Child::Details(screen) => details_step(screen).await?,
        };

        match step {
            Step::Stay => {}
            Step::Navigate => {
                match tokio::time::timeout(NAVIGATION_TIMEOUT, root.next_navigation()).await {
                    Ok(Some(navigation)) => debug!(?navigation, "navigated"),
                    _ => debug!("action did not navigate"),
                }
            }
            Step::Quit => break,
        }
    }

    save(&root, &session_path).await
}

async fn restore(deps: Dependencies, session_path: &Path) -> RootComponent {
    let saved = match tokio::fs::read_to_string(session_path).await {
        Ok(saved) => saved,
        Err(_) => return RootComponent::new(deps),
    };

    match RootComponent::restore(deps.clone(), &saved) {
        Ok(root) => root,
        Err(err) => {
            warn!(error = %err, "discarding unreadable session");
            RootComponent::new(deps)
        }
    }
}

async fn save(root: &RootComponent, session_path: &Path) -> Result<()> {
    let saved = root.save_stack().context("Failed to serialize navigation stack")?;

    if let Some(parent) = session_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create session directory: {}", parent.display())
        })?;
    }
    tokio::fs::write(session_path, saved)
        .await
        .with_context(|| format!("Failed to write session file: {}", session_path.display()))
}

/// Runs a blocking inquire prompt off the async runtime. `None` means the user escaped.
pub async fn prompt<T, F>(ask: F) -> Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> InquireResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(ask).await.context("Prompt task failed")? {
        Ok(answer) => Ok(Some(answer)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("Failed to read from terminal"),
    }
}

/// Waits (bounded) until `done` holds, then returns the latest state either way.
async fn settle<S: Clone>(mut model: watch::Receiver<S>, done: impl FnMut(&S) -> bool) -> S {
    let reached =
        matches!(tokio::time::timeout(SETTLE_TIMEOUT, model.wait_for(done)).await, Ok(Ok(_)));
    if !reached {
        debug!("screen did not settle in time");
    }
    let state = model.borrow().clone();
    state
}

fn print_screen(lines: &[String]) {
    println!();
    for line in lines {
        println!("{line}");
    }
}

enum FavouritesChoice {
    Open(City),
    Search,
    AddFavourite,
    Quit,
}

impl fmt::Display for FavouritesChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FavouritesChoice::Open(city) => write!(f, "Open {city}"),
            FavouritesChoice::Search => f.write_str("Search a city"),
            FavouritesChoice::AddFavourite => f.write_str("Add a favourite"),
            FavouritesChoice::Quit => f.write_str("Quit"),
        }
    }
}

async fn favourites_step(screen: &FavouritesComponent) -> Result<Step> {
    let state = settle(screen.model(), |s| {
        s.favourites_loaded
            && s.city_items.iter().all(|i| {
                !matches!(i.weather_state, WeatherState::Initial | WeatherState::Loading)
            })
    })
    .await;
    print_screen(&output::favourites_lines(&state));

    let mut options: Vec<_> =
        state.city_items.into_iter().map(|item| FavouritesChoice::Open(item.city)).collect();
    options.extend([
        FavouritesChoice::Search,
        FavouritesChoice::AddFavourite,
        FavouritesChoice::Quit,
    ]);

    let choice = prompt(move || Select::new("What next?", options).prompt()).await?;
    Ok(match choice {
        Some(FavouritesChoice::Open(city)) => {
            screen.on_city_item_click(city);
            Step::Navigate
        }
        Some(FavouritesChoice::Search) => {
            screen.on_click_search();
            Step::Navigate
        }
        Some(FavouritesChoice::AddFavourite) => {
            screen.on_click_add_favourite();
            Step::Navigate
        }
        Some(FavouritesChoice::Quit) | None => Step::Quit,
    })
}

enum SearchChoice {
    NewQuery,
    Select(City),
    Back,
}

impl fmt::Display for SearchChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchChoice::NewQuery => f.write_str("Search..."),
            SearchChoice::Select(city) => f.write_str(&output::city_line(city)),
            SearchChoice::Back => f.write_str("Back"),
        }
    }
}

async fn search_step(screen: &SearchComponent) -> Result<Step> {
    let state = screen.state();
    print_screen(&output::search_lines(&state));

    let mut options = vec![SearchChoice::NewQuery];
    if let SearchState::SuccessLoaded(cities) = &state.search_state {
        options.extend(cities.iter().cloned().map(SearchChoice::Select));
    }
    options.push(SearchChoice::Back);

    let title = match screen.open_reason() {
        OpenReason::RegularSearch => "Pick a city to see its forecast",
        OpenReason::AddToFavourite => "Pick a city to add to favourites",
    };

    match prompt(move || Select::new(title, options).prompt()).await? {
        Some(SearchChoice::NewQuery) => {
            let initial = state.query.clone();
            let query =
                prompt(move || Text::new("City:").with_initial_value(&initial).prompt()).await?;
            let Some(query) = query else {
                return Ok(Step::Stay);
            };

            screen.change_search_query(query);
            screen.on_click_search();

            // Every submit passes through Loading before its result lands.
            let model = screen.model();
            let mut loading = model.clone();
            let _ = tokio::time::timeout(
                Duration::from_secs(1),
                loading.wait_for(|s| s.search_state == SearchState::Loading),
            )
            .await;
            settle(model, |s| s.search_state != SearchState::Loading).await;
            Ok(Step::Stay)
        }
        Some(SearchChoice::Select(city)) => {
            screen.on_click_city(city);
            Ok(Step::Navigate)
        }
        Some(SearchChoice::Back) | None => {
            screen.on_click_back();
            Ok(Step::Navigate)
        }
    }
}

enum DetailsChoice {
    ToggleFavourite { is_favourite: bool },
    Back,
}

impl fmt::Display for DetailsChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailsChoice::ToggleFavourite { is_favourite: true } => {
                f.write_str("Remove from favourites")
            }
            DetailsChoice::ToggleFavourite { is_favourite: false } => {
                f.write_str("Add to favourites")
            }
            DetailsChoice::Back => f.write_str("Back"),
        }
    }
}

async fn details_step(screen: &DetailsComponent) -> Result<Step> {
    let state = settle(screen.model(), |s| {
        !matches!(s.forecast_state, ForecastState::Initial | ForecastState::Loading)
    })
    .await;
    print_screen(&output::details_lines(&state));

    let is_favourite = state.is_favourite;
    let options = vec![DetailsChoice::ToggleFavourite { is_favourite }, DetailsChoice::Back];

    match prompt(move || Select::new("What next?", options).prompt()).await? {
        Some(DetailsChoice::ToggleFavourite { .. }) => {
            screen.on_click_change_favourite_status();
            settle(screen.model(), |s| s.is_favourite != is_favourite).await;
            Ok(Step::Stay)
        }
        Some(DetailsChoice::Back) | None => {
            screen.on_click_back();
            Ok(Step::Navigate)
        }
    }
}
