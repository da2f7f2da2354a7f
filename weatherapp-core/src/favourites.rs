//! Persisted set of favourite cities.
//!
//! Readers always observe whole snapshots: the current set lives in a
//! `watch` channel and is only replaced after a write has been persisted.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::{
    fmt::Debug,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::model::City;

#[derive(Debug, thiserror::Error)]
pub enum FavouritesError {
    #[error("failed to access favourites file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("favourites file {} is corrupt: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode favourites: {0}")]
    Encode(#[source] serde_json::Error),
}

#[async_trait]
pub trait FavouriteStore: Send + Sync + Debug {
    /// Emits the full set once on subscription and again after every change.
    fn observe_favourites(&self) -> BoxStream<'static, Vec<City>>;

    /// Emits whether `city_id` is a favourite, once on subscription and on every flip.
    fn observe_is_favourite(&self, city_id: u32) -> BoxStream<'static, bool>;

    /// Adding a city that is already present is not an error.
    async fn add_favourite(&self, city: &City) -> Result<(), FavouritesError>;

    /// Removing an absent city is not an error.
    async fn remove_favourite(&self, city_id: u32) -> Result<(), FavouritesError>;
}

#[derive(Debug)]
pub struct LocalFavouriteStore {
    path: Option<PathBuf>,
    cities: watch::Sender<Vec<City>>,
    write_lock: Mutex<()>,
}

impl LocalFavouriteStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_cities(None, Vec::new())
    }

    /// Open (or lazily create) a JSON-backed store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, FavouritesError> {
        let path = path.into();

        let cities = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| FavouritesError::Decode { path: path.clone(), source })?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(FavouritesError::Io { path, source }),
        };

        debug!(path = %path.display(), count = cities.len(), "opened favourites");
        Ok(Self::with_cities(Some(path), cities))
    }

    fn with_cities(path: Option<PathBuf>, cities: Vec<City>) -> Self {
        let (cities, _) = watch::channel(cities);
        Self { path, cities, write_lock: Mutex::new(()) }
    }

    pub fn snapshot(&self) -> Vec<City> {
        self.cities.borrow().clone()
    }

    /// Applies `change` to a copy of the current set; `change` reports whether it did anything.
    async fn update(
        &self,
        change: impl FnOnce(&mut Vec<City>) -> bool,
    ) -> Result<(), FavouritesError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.cities.borrow().clone();
        if !change(&mut next) {
            return Ok(());
        }

        if let Some(path) = &self.path {
            persist(path, &next).await?;
        }
        self.cities.send_replace(next);
        Ok(())
    }
}

#[async_trait]
impl FavouriteStore for LocalFavouriteStore {
    fn observe_favourites(&self) -> BoxStream<'static, Vec<City>> {
        let rx = self.cities.subscribe();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let cities = rx.borrow_and_update().clone();
            Some((cities, (rx, false)))
        })
        .boxed()
    }

    fn observe_is_favourite(&self, city_id: u32) -> BoxStream<'static, bool> {
        let rx = self.cities.subscribe();
        stream::unfold((rx, None::<bool>), move |(mut rx, last)| async move {
            loop {
                if last.is_some() && rx.changed().await.is_err() {
                    return None;
                }
                let present = rx.borrow_and_update().iter().any(|c| c.id == city_id);
                if last != Some(present) {
                    return Some((present, (rx, Some(present))));
                }
            }
        })
        .boxed()
    }

    async fn add_favourite(&self, city: &City) -> Result<(), FavouritesError> {
        self.update(|cities| match cities.iter_mut().find(|c| c.id == city.id) {
            Some(existing) if existing == city => false,
            Some(existing) => {
                *existing = city.clone();
                true
            }
            None => {
                cities.push(city.clone());
                true
            }
        })
        .await
    }

    async fn remove_favourite(&self, city_id: u32) -> Result<(), FavouritesError> {
        self.update(|cities| {
            let before = cities.len();
            cities.retain(|c| c.id != city_id);
            cities.len() != before
        })
        .await
    }
}

async fn persist(path: &Path, cities: &[City]) -> Result<(), FavouritesError> {
    let io_err = |source| FavouritesError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let bytes = serde_json::to_vec_pretty(cities).map_err(FavouritesError::Encode)?;

    // Write then rename so a crash never leaves a half-written file behind.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
