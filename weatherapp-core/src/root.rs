//! Navigation root: a back-stack of screen configurations.
//!
//! Every entry owns a live component from push until pop; only the top one
//! navigates. Children never call into the root; their labels arrive on a
//! channel the root drains and maps to stack transitions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    favourites::FavouriteStore,
    model::City,
    provider::WeatherService,
    screen::{
        details::{self, DetailsComponent},
        favourites::{self, FavouritesComponent},
        search::{self, OpenReason, SearchComponent},
    },
};

/// Minimal constructor arguments of a screen; this is what survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenConfig {
    Favourites,
    Search { open_reason: OpenReason },
    Details { city: City },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Push(ScreenConfig),
    Pop,
}

pub enum Child {
    Favourites(FavouritesComponent),
    Search(SearchComponent),
    Details(DetailsComponent),
}

impl Child {
    fn dispose(&self) {
        match self {
            Child::Favourites(c) => c.store().dispose(),
            Child::Search(c) => c.store().dispose(),
            Child::Details(c) => c.store().dispose(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("saved navigation stack is empty")]
    EmptyStack,

    #[error("saved navigation stack does not start at the favourites screen")]
    MissingRoot,

    #[error("failed to (de)serialize navigation stack: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Collaborators handed to every screen.
#[derive(Debug, Clone)]
pub struct Dependencies {
    pub weather: Arc<dyn WeatherService>,
    pub favourites: Arc<dyn FavouriteStore>,
    pub forecast_days: u32,
}

#[derive(Debug)]
enum ChildLabel {
    Favourites(favourites::Label),
    Search(search::Label),
    Details(details::Label),
}

/// A label tagged with the id of the entry that published it.
type Routed = (u64, ChildLabel);

/// One back-stack entry: its configuration and the component built from it.
struct Entry {
    id: u64,
    config: ScreenConfig,
    child: Child,
}

/// Owns the back-stack. Every entry keeps its component alive until it is popped.
pub struct RootComponent {
    deps: Dependencies,
    /// The bottom entry, never popped.
    root: Entry,
    /// Entries pushed above the root, top last.
    above: Vec<Entry>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<Routed>,
    events_rx: mpsc::UnboundedReceiver<Routed>,
}

impl RootComponent {
    /// Starts at the favourites dashboard. Must be called inside a tokio runtime.
    pub fn new(deps: Dependencies) -> Self {
        Self::with_stack(deps, Vec::new())
    }

    /// Rebuilds a stack previously produced by [`RootComponent::save_stack`].
    pub fn restore(deps: Dependencies, saved: &str) -> Result<Self, NavigationError> {
        let stack: Vec<ScreenConfig> = serde_json::from_str(saved)?;
        let Some((first, rest)) = stack.split_first() else {
            return Err(NavigationError::EmptyStack);
        };
        if *first != ScreenConfig::Favourites {
            return Err(NavigationError::MissingRoot);
        }
        info!(depth = stack.len(), "restoring navigation stack");
        Ok(Self::with_stack(deps, rest.to_vec()))
    }

    /// Builds the favourites root, then pushes `above` in order.
    fn with_stack(deps: Dependencies, above: Vec<ScreenConfig>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let root = Entry {
            id: 0,
            config: ScreenConfig::Favourites,
            child: build_child(&deps, &events_tx, 0, ScreenConfig::Favourites),
        };

        let mut component =
            Self { deps, root, above: Vec::new(), next_id: 1, events_tx, events_rx };
        for config in above {
            component.push(config);
        }
        component
    }

    pub fn save_stack(&self) -> Result<String, NavigationError> {
        Ok(serde_json::to_string(&self.stack())?)
    }

    pub fn stack(&self) -> Vec<ScreenConfig> {
        std::iter::once(&self.root).chain(&self.above).map(|e| e.config.clone()).collect()
    }

    pub fn active_child(&self) -> &Child {
        &self.top().child
    }

    fn top(&self) -> &Entry {
        self.above.last().unwrap_or(&self.root)
    }

    /// Builds the component for `config` on top; entries below stay alive.
    pub fn push(&mut self, config: ScreenConfig) {
        debug!(?config, depth = self.above.len() + 2, "push");
        let id = self.next_id;
        self.next_id += 1;
        let child = build_child(&self.deps, &self.events_tx, id, config.clone());
        self.above.push(Entry { id, config, child });
    }

    /// Disposes the top entry. The root entry is never popped; returns whether
    /// anything changed.
    pub fn pop(&mut self) -> bool {
        let Some(entry) = self.above.pop() else {
            debug!("pop ignored at root");
            return false;
        };
        entry.child.dispose();
        debug!(config = ?entry.config, depth = self.above.len() + 1, "pop");
        true
    }

    pub fn navigate(&mut self, navigation: Navigation) {
        match navigation {
            Navigation::Push(config) => self.push(config),
            Navigation::Pop => {
                self.pop();
            }
        }
    }

    /// Waits for the active child's next label and applies the transition it maps to.
    pub async fn next_navigation(&mut self) -> Option<Navigation> {
        loop {
            let (origin, label) = self.events_rx.recv().await?;
            if let Some(navigation) = self.accept_routed(origin, label) {
                return Some(navigation);
            }
        }
    }

    /// Applies every label already queued without waiting.
    pub fn process_pending(&mut self) -> Vec<Navigation> {
        let mut applied = Vec::new();
        while let Ok((origin, label)) = self.events_rx.try_recv() {
            if let Some(navigation) = self.accept_routed(origin, label) {
                applied.push(navigation);
            }
        }
        applied
    }

    /// Only the top entry may navigate.
    fn accept_routed(&mut self, origin: u64, label: ChildLabel) -> Option<Navigation> {
        let active = self.top().id;
        if origin != active {
            debug!(origin, active, ?label, "label from inactive screen ignored");
            return None;
        }
        let navigation = route(label);
        self.navigate(navigation.clone());
        Some(navigation)
    }
}

impl Drop for RootComponent {
    fn drop(&mut self) {
        for entry in self.above.drain(..).rev() {
            entry.child.dispose();
        }
        self.root.child.dispose();
    }
}

/// Label → stack transition table.
fn route(label: ChildLabel) -> Navigation {
    match label {
        ChildLabel::Favourites(favourites::Label::CityItemClick(city)) => {
            Navigation::Push(ScreenConfig::Details { city })
        }
        ChildLabel::Favourites(favourites::Label::ClickSearch) => {
            Navigation::Push(ScreenConfig::Search { open_reason: OpenReason::RegularSearch })
        }
        ChildLabel::Favourites(favourites::Label::ClickAddFavourite) => {
            Navigation::Push(ScreenConfig::Search { open_reason: OpenReason::AddToFavourite })
        }
        ChildLabel::Search(search::Label::Back) => Navigation::Pop,
        ChildLabel::Search(search::Label::SavedToFavourite) => Navigation::Pop,
        ChildLabel::Search(search::Label::OpenForecast(city)) => {
            Navigation::Push(ScreenConfig::Details { city })
        }
        ChildLabel::Details(details::Label::Back) => Navigation::Pop,
    }
}

fn build_child(
    deps: &Dependencies,
    events: &mpsc::UnboundedSender<Routed>,
    id: u64,
    config: ScreenConfig,
) -> Child {
    let weather = Arc::clone(&deps.weather);
    let favourites = Arc::clone(&deps.favourites);

    match config {
        ScreenConfig::Favourites => {
            let events = events.clone();
            let store = favourites::create_store(weather, favourites);
            Child::Favourites(FavouritesComponent::new(store, move |label| {
                let _ = events.send((id, ChildLabel::Favourites(label)));
            }))
        }
        ScreenConfig::Search { open_reason } => {
            let events = events.clone();
            let store = search::create_store(open_reason, weather, favourites);
            Child::Search(SearchComponent::new(open_reason, store, move |label| {
                let _ = events.send((id, ChildLabel::Search(label)));
            }))
        }
        ScreenConfig::Details { city } => {
            let events = events.clone();
            let store = details::create_store(city, deps.forecast_days, weather, favourites);
            Child::Details(DetailsComponent::new(store, move |label| {
                let _ = events.send((id, ChildLabel::Details(label)));
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_table_matches_screens() {
        let city = City::new(7, "Rome", "Italy");

        assert_eq!(
            route(ChildLabel::Favourites(favourites::Label::CityItemClick(city.clone()))),
            Navigation::Push(ScreenConfig::Details { city: city.clone() })
        );
        assert_eq!(
            route(ChildLabel::Favourites(favourites::Label::ClickAddFavourite)),
            Navigation::Push(ScreenConfig::Search { open_reason: OpenReason::AddToFavourite })
        );
        assert_eq!(route(ChildLabel::Search(search::Label::SavedToFavourite)), Navigation::Pop);
        assert_eq!(
            route(ChildLabel::Search(search::Label::OpenForecast(city.clone()))),
            Navigation::Push(ScreenConfig::Details { city })
        );
        assert_eq!(route(ChildLabel::Details(details::Label::Back)), Navigation::Pop);
    }

    #[test]
    fn screen_config_serializes_with_tag() {
        let stack = vec![
            ScreenConfig::Favourites,
            ScreenConfig::Search { open_reason: OpenReason::RegularSearch },
            ScreenConfig::Details { city: City::new(7, "Rome", "Italy") },
        ];
        let json = serde_json::to_string(&stack).unwrap();
        assert!(json.starts_with(r#"[{"screen":"favourites"}"#));

        let parsed: Vec<ScreenConfig> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stack);
    }
}
