//! Dashboard of favourite cities with their current weather.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    favourites::FavouriteStore,
    model::City,
    provider::WeatherService,
    store::{BootstrapContext, Bootstrapper, Executor, Reducer, Store, StoreContext, TaskHandle},
};

use super::forward_labels;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CityItemClick(City),
    ClickSearch,
    ClickAddFavourite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    CityItemClick(City),
    ClickSearch,
    ClickAddFavourite,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct State {
    /// One entry per favourite, in the order the favourites were loaded.
    pub city_items: Vec<CityItem>,
    /// Set by the first favourites snapshot; an empty list before that means "not yet known".
    pub favourites_loaded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityItem {
    pub city: City,
    pub weather_state: WeatherState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherState {
    Initial,
    Loading,
    Loaded { temp_c: f64, icon_url: String },
    Error,
}

pub type FavouritesStore = Store<Intent, State, Label>;

pub fn create_store(
    weather: Arc<dyn WeatherService>,
    favourites: Arc<dyn FavouriteStore>,
) -> FavouritesStore {
    Store::create(
        "FavouritesStore",
        State::default(),
        FavouritesBootstrapper { favourites },
        FavouritesExecutor { weather, loads: Vec::new() },
    )
}

#[derive(Debug)]
enum Action {
    FavouritesLoaded(Vec<City>),
}

#[derive(Debug)]
enum Msg {
    FavouritesLoaded(Vec<City>),
    WeatherLoading { city_id: u32 },
    WeatherLoaded { city_id: u32, temp_c: f64, icon_url: String },
    WeatherFailed { city_id: u32 },
}

struct FavouritesBootstrapper {
    favourites: Arc<dyn FavouriteStore>,
}

impl Bootstrapper<Action> for FavouritesBootstrapper {
    fn bootstrap(self, ctx: BootstrapContext<Action>) {
        ctx.launch(move |ctx| async move {
            let mut favourites = self.favourites.observe_favourites();
            while let Some(cities) = favourites.next().await {
                ctx.dispatch(Action::FavouritesLoaded(cities));
            }
        });
    }
}

type Ctx = StoreContext<FavouritesReducer, Label>;

struct FavouritesExecutor {
    weather: Arc<dyn WeatherService>,
    /// Weather fetches started for the latest favourites snapshot.
    loads: Vec<TaskHandle>,
}

impl Executor for FavouritesExecutor {
    type Intent = Intent;
    type Action = Action;
    type Reducer = FavouritesReducer;
    type Label = Label;

    fn execute_intent(&mut self, intent: Intent, ctx: &Ctx) {
        match intent {
            Intent::CityItemClick(city) => ctx.publish(Label::CityItemClick(city)),
            Intent::ClickSearch => ctx.publish(Label::ClickSearch),
            Intent::ClickAddFavourite => ctx.publish(Label::ClickAddFavourite),
        }
    }

    fn execute_action(&mut self, action: Action, ctx: &Ctx) {
        match action {
            Action::FavouritesLoaded(cities) => {
                debug!(count = cities.len(), "favourites snapshot received");

                // Results for the previous snapshot would race the reset below.
                for load in self.loads.drain(..) {
                    load.cancel();
                }

                ctx.dispatch(Msg::FavouritesLoaded(cities.clone()));

                self.loads = cities
                    .into_iter()
                    .map(|city| {
                        let weather = Arc::clone(&self.weather);
                        ctx.launch(move |ctx| load_weather(ctx, weather, city))
                    })
                    .collect();
            }
        }
    }
}

async fn load_weather(ctx: Ctx, weather: Arc<dyn WeatherService>, city: City) {
    ctx.dispatch(Msg::WeatherLoading { city_id: city.id });

    match weather.current_weather(&city.api_query()).await {
        Ok(current) => ctx.dispatch(Msg::WeatherLoaded {
            city_id: city.id,
            temp_c: current.temperature_c,
            icon_url: current.condition_icon_url,
        }),
        Err(err) => {
            warn!(city_id = city.id, error = %err, "failed to load current weather");
            ctx.dispatch(Msg::WeatherFailed { city_id: city.id });
        }
    }
}

struct FavouritesReducer;

impl FavouritesReducer {
    /// Messages for ids that are no longer listed are discarded.
    fn update_city(state: &State, city_id: u32, weather_state: WeatherState) -> State {
        let city_items = state
            .city_items
            .iter()
            .map(|item| {
                if item.city.id == city_id {
                    CityItem { city: item.city.clone(), weather_state: weather_state.clone() }
                } else {
                    item.clone()
                }
            })
            .collect();
        State { city_items, ..state.clone() }
    }
}

impl Reducer for FavouritesReducer {
    type State = State;
    type Msg = Msg;

    fn reduce(state: &State, msg: Msg) -> State {
        match msg {
            Msg::FavouritesLoaded(cities) => State {
                city_items: cities
                    .into_iter()
                    .map(|city| CityItem { city, weather_state: WeatherState::Initial })
                    .collect(),
                favourites_loaded: true,
            },
            Msg::WeatherLoading { city_id } => {
                Self::update_city(state, city_id, WeatherState::Loading)
            }
            Msg::WeatherLoaded { city_id, temp_c, icon_url } => {
                Self::update_city(state, city_id, WeatherState::Loaded { temp_c, icon_url })
            }
            Msg::WeatherFailed { city_id } => {
                Self::update_city(state, city_id, WeatherState::Error)
            }
        }
    }
}

pub struct FavouritesComponent {
    store: FavouritesStore,
}

impl FavouritesComponent {
    /// `on_label` receives every label the screen publishes.
    pub fn new(store: FavouritesStore, on_label: impl FnMut(Label) + Send + 'static) -> Self {
        forward_labels(&store, on_label);
        Self { store }
    }

    pub fn model(&self) -> watch::Receiver<State> {
        self.store.states()
    }

    pub fn state(&self) -> State {
        self.store.state()
    }

    pub fn on_city_item_click(&self, city: City) {
        self.store.accept(Intent::CityItemClick(city));
    }

    pub fn on_click_search(&self) {
        self.store.accept(Intent::ClickSearch);
    }

    pub fn on_click_add_favourite(&self) {
        self.store.accept(Intent::ClickAddFavourite);
    }

    pub fn store(&self) -> &FavouritesStore {
        &self.store
    }
}
