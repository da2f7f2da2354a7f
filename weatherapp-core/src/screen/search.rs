//! City search. What selecting a result does depends on why the screen was opened.

use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    favourites::FavouriteStore,
    model::City,
    provider::WeatherService,
    store::{Executor, Reducer, Store, StoreContext, TaskHandle},
};

use super::forward_labels;

/// Fixed when the screen is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenReason {
    /// Selecting a city opens its forecast.
    RegularSearch,
    /// Selecting a city saves it to favourites and closes the screen.
    AddToFavourite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ChangeQuery(String),
    Submit,
    SelectCity(City),
    Back,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub query: String,
    pub search_state: SearchState,
    /// The last attempt to save a selected city failed.
    pub save_failed: bool,
}

impl Default for State {
    fn default() -> Self {
        Self { query: String::new(), search_state: SearchState::Initial, save_failed: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    Initial,
    Loading,
    EmptyResult,
    Error,
    SuccessLoaded(Vec<City>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Back,
    SavedToFavourite,
    OpenForecast(City),
}

pub type SearchStore = Store<Intent, State, Label>;

pub fn create_store(
    open_reason: OpenReason,
    weather: Arc<dyn WeatherService>,
    favourites: Arc<dyn FavouriteStore>,
) -> SearchStore {
    Store::create(
        "SearchStore",
        State::default(),
        (),
        SearchExecutor { open_reason, weather, favourites, search_job: None },
    )
}

#[derive(Debug)]
enum Msg {
    ChangeQuery(String),
    SearchStarted,
    SearchFailed,
    SearchLoaded(Vec<City>),
    SaveStarted,
    SaveFailed,
}

type Ctx = StoreContext<SearchReducer, Label>;

struct SearchExecutor {
    open_reason: OpenReason,
    weather: Arc<dyn WeatherService>,
    favourites: Arc<dyn FavouriteStore>,
    search_job: Option<TaskHandle>,
}

impl SearchExecutor {
    fn submit(&mut self, ctx: &Ctx) {
        // At most one search in flight: a stale result must never land.
        if let Some(job) = self.search_job.take() {
            job.cancel();
        }

        let query = ctx.state().query;
        let weather = Arc::clone(&self.weather);
        debug!(%query, "searching cities");

        self.search_job = Some(ctx.launch(move |ctx| async move {
            ctx.dispatch(Msg::SearchStarted);
            match weather.search_cities(&query).await {
                Ok(cities) => ctx.dispatch(Msg::SearchLoaded(cities)),
                Err(err) => {
                    warn!(%query, error = %err, "city search failed");
                    ctx.dispatch(Msg::SearchFailed);
                }
            }
        }));
    }

    fn select_city(&self, city: City, ctx: &Ctx) {
        match self.open_reason {
            OpenReason::RegularSearch => ctx.publish(Label::OpenForecast(city)),
            OpenReason::AddToFavourite => {
                let favourites = Arc::clone(&self.favourites);
                ctx.launch(move |ctx| async move {
                    ctx.dispatch(Msg::SaveStarted);
                    match favourites.add_favourite(&city).await {
                        Ok(()) => ctx.publish(Label::SavedToFavourite),
                        Err(err) => {
                            warn!(city_id = city.id, error = %err, "failed to save favourite");
                            ctx.dispatch(Msg::SaveFailed);
                        }
                    }
                });
            }
        }
    }
}

impl Executor for SearchExecutor {
    type Intent = Intent;
    type Action = Infallible;
    type Reducer = SearchReducer;
    type Label = Label;

    fn execute_intent(&mut self, intent: Intent, ctx: &Ctx) {
        match intent {
            Intent::ChangeQuery(query) => ctx.dispatch(Msg::ChangeQuery(query)),
            Intent::Submit => self.submit(ctx),
            Intent::SelectCity(city) => self.select_city(city, ctx),
            Intent::Back => ctx.publish(Label::Back),
        }
    }
}

struct SearchReducer;

impl Reducer for SearchReducer {
    type State = State;
    type Msg = Msg;

    fn reduce(state: &State, msg: Msg) -> State {
        match msg {
            Msg::ChangeQuery(query) => State { query, ..state.clone() },
            Msg::SearchStarted => State { search_state: SearchState::Loading, ..state.clone() },
            Msg::SearchFailed => State { search_state: SearchState::Error, ..state.clone() },
            Msg::SearchLoaded(cities) => {
                let search_state = if cities.is_empty() {
                    SearchState::EmptyResult
                } else {
                    SearchState::SuccessLoaded(cities)
                };
                State { search_state, ..state.clone() }
            }
            Msg::SaveStarted => State { save_failed: false, ..state.clone() },
            Msg::SaveFailed => State { save_failed: true, ..state.clone() },
        }
    }
}

pub struct SearchComponent {
    open_reason: OpenReason,
    store: SearchStore,
}

impl SearchComponent {
    pub fn new(
        open_reason: OpenReason,
        store: SearchStore,
        on_label: impl FnMut(Label) + Send + 'static,
    ) -> Self {
        forward_labels(&store, on_label);
        Self { open_reason, store }
    }

    pub fn open_reason(&self) -> OpenReason {
        self.open_reason
    }

    pub fn model(&self) -> watch::Receiver<State> {
        self.store.states()
    }

    pub fn state(&self) -> State {
        self.store.state()
    }

    pub fn change_search_query(&self, query: impl Into<String>) {
        self.store.accept(Intent::ChangeQuery(query.into()));
    }

    pub fn on_click_search(&self) {
        self.store.accept(Intent::Submit);
    }

    pub fn on_click_city(&self, city: City) {
        self.store.accept(Intent::SelectCity(city));
    }

    pub fn on_click_back(&self) {
        self.store.accept(Intent::Back);
    }

    pub fn store(&self) -> &SearchStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_is_not_success() {
        let state = SearchReducer::reduce(&State::default(), Msg::SearchLoaded(Vec::new()));
        assert_eq!(state.search_state, SearchState::EmptyResult);

        let london = City::new(1, "London", "UK");
        let state = SearchReducer::reduce(&state, Msg::SearchLoaded(vec![london.clone()]));
        assert_eq!(state.search_state, SearchState::SuccessLoaded(vec![london]));
    }

    #[test]
    fn every_search_restarts_at_loading() {
        let state = SearchReducer::reduce(&State::default(), Msg::SearchFailed);
        assert_eq!(state.search_state, SearchState::Error);

        let state = SearchReducer::reduce(&state, Msg::SearchStarted);
        assert_eq!(state.search_state, SearchState::Loading);
    }

    #[test]
    fn query_change_keeps_results() {
        let london = City::new(1, "London", "UK");
        let state = SearchReducer::reduce(&State::default(), Msg::SearchLoaded(vec![london]));
        let changed = SearchReducer::reduce(&state, Msg::ChangeQuery("Par".into()));

        assert_eq!(changed.query, "Par");
        assert_eq!(changed.search_state, state.search_state);
        assert_eq!(state.query, "");
    }

    #[test]
    fn save_failure_is_cleared_by_next_attempt() {
        let failed = SearchReducer::reduce(&State::default(), Msg::SaveFailed);
        assert!(failed.save_failed);
        assert!(!SearchReducer::reduce(&failed, Msg::SaveStarted).save_failed);
    }

    #[test]
    fn open_reason_serializes_as_snake_case() {
        let json = serde_json::to_string(&OpenReason::AddToFavourite).unwrap();
        assert_eq!(json, "\"add_to_favourite\"");
    }
}
