//! Forecast for one city, with a favourite toggle.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::{
    favourites::FavouriteStore,
    model::{City, Forecast},
    provider::WeatherService,
    store::{BootstrapContext, Bootstrapper, Executor, Reducer, Store, StoreContext},
};

use super::forward_labels;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ToggleFavourite,
    Back,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub city: City,
    pub is_favourite: bool,
    pub forecast_state: ForecastState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastState {
    Initial,
    Loading,
    Loaded(Forecast),
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Back,
}

pub type DetailsStore = Store<Intent, State, Label>;

pub fn create_store(
    city: City,
    forecast_days: u32,
    weather: Arc<dyn WeatherService>,
    favourites: Arc<dyn FavouriteStore>,
) -> DetailsStore {
    let initial_state =
        State { city: city.clone(), is_favourite: false, forecast_state: ForecastState::Initial };

    Store::create(
        "DetailsStore",
        initial_state,
        DetailsBootstrapper { city, forecast_days, weather, favourites: Arc::clone(&favourites) },
        DetailsExecutor { favourites },
    )
}

#[derive(Debug)]
enum Action {
    FavouriteStatusChanged(bool),
    ForecastLoading,
    ForecastLoaded(Forecast),
    ForecastFailed,
}

#[derive(Debug)]
enum Msg {
    FavouriteStatusChanged(bool),
    ForecastLoading,
    ForecastLoaded(Forecast),
    ForecastFailed,
}

struct DetailsBootstrapper {
    city: City,
    forecast_days: u32,
    weather: Arc<dyn WeatherService>,
    favourites: Arc<dyn FavouriteStore>,
}

impl Bootstrapper<Action> for DetailsBootstrapper {
    fn bootstrap(self, ctx: BootstrapContext<Action>) {
        let Self { city, forecast_days, weather, favourites } = self;

        let mut is_favourite = favourites.observe_is_favourite(city.id);
        ctx.launch(move |ctx| async move {
            while let Some(status) = is_favourite.next().await {
                ctx.dispatch(Action::FavouriteStatusChanged(status));
            }
        });

        ctx.launch(move |ctx| async move {
            ctx.dispatch(Action::ForecastLoading);
            match weather.forecast(&city.api_query(), forecast_days).await {
                Ok(forecast) => ctx.dispatch(Action::ForecastLoaded(forecast)),
                Err(err) => {
                    warn!(city_id = city.id, error = %err, "failed to load forecast");
                    ctx.dispatch(Action::ForecastFailed);
                }
            }
        });
    }
}

type Ctx = StoreContext<DetailsReducer, Label>;

struct DetailsExecutor {
    favourites: Arc<dyn FavouriteStore>,
}

impl Executor for DetailsExecutor {
    type Intent = Intent;
    type Action = Action;
    type Reducer = DetailsReducer;
    type Label = Label;

    fn execute_intent(&mut self, intent: Intent, ctx: &Ctx) {
        match intent {
            Intent::ToggleFavourite => {
                // Read-then-write: the status is whatever the state held when
                // this intent was processed.
                let State { city, is_favourite, .. } = ctx.state();
                let favourites = Arc::clone(&self.favourites);

                ctx.launch(move |_| async move {
                    let result = if is_favourite {
                        favourites.remove_favourite(city.id).await
                    } else {
                        favourites.add_favourite(&city).await
                    };
                    if let Err(err) = result {
                        warn!(city_id = city.id, error = %err, "failed to change favourite status");
                    }
                });
            }
            Intent::Back => ctx.publish(Label::Back),
        }
    }

    fn execute_action(&mut self, action: Action, ctx: &Ctx) {
        let msg = match action {
            Action::FavouriteStatusChanged(status) => Msg::FavouriteStatusChanged(status),
            Action::ForecastLoading => Msg::ForecastLoading,
            Action::ForecastLoaded(forecast) => Msg::ForecastLoaded(forecast),
            Action::ForecastFailed => Msg::ForecastFailed,
        };
        ctx.dispatch(msg);
    }
}

struct DetailsReducer;

impl Reducer for DetailsReducer {
    type State = State;
    type Msg = Msg;

    fn reduce(state: &State, msg: Msg) -> State {
        match msg {
            Msg::FavouriteStatusChanged(is_favourite) => State { is_favourite, ..state.clone() },
            Msg::ForecastLoading => {
                State { forecast_state: ForecastState::Loading, ..state.clone() }
            }
            Msg::ForecastLoaded(forecast) => {
                State { forecast_state: ForecastState::Loaded(forecast), ..state.clone() }
            }
            Msg::ForecastFailed => State { forecast_state: ForecastState::Error, ..state.clone() },
        }
    }
}

pub struct DetailsComponent {
    store: DetailsStore,
}

impl DetailsComponent {
    pub fn new(store: DetailsStore, on_label: impl FnMut(Label) + Send + 'static) -> Self {
        forward_labels(&store, on_label);
        Self { store }
    }

    pub fn model(&self) -> watch::Receiver<State> {
        self.store.states()
    }

    pub fn state(&self) -> State {
        self.store.state()
    }

    pub fn on_click_back(&self) {
        self.store.accept(Intent::Back);
    }

    pub fn on_click_change_favourite_status(&self) {
        self.store.accept(Intent::ToggleFavourite);
    }

    pub fn store(&self) -> &DetailsStore {
        &self.store
    }
}
