//! The three screens of the app. Each one is a [`Store`] plus a thin
//! component that exposes its state and turns its labels into outbound events.

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::store::Store;

pub mod details;
pub mod favourites;
pub mod search;

/// Feeds every label of `store` to `route` for as long as the store lives.
pub(crate) fn forward_labels<I, S, L, F>(store: &Store<I, S, L>, mut route: F)
where
    I: Send + 'static,
    S: Clone + Send + Sync + 'static,
    L: Clone + Send + 'static,
    F: FnMut(L) + Send + 'static,
{
    // Subscribe before returning so no label published afterwards is missed.
    let mut labels = store.labels();
    let name = store.name();

    store.scope().spawn(async move {
        loop {
            match labels.recv().await {
                Ok(label) => route(label),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(store = name, skipped, "label subscriber fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
