//! Process-wide cache for a loaded embedding model.

use std::sync::{Arc, Mutex};

use tracing::info;

use chatsearch_core::{Result, SearchError};

struct CachedModel<M> {
    name: String,
    model: Arc<M>,
}

/// Holds at most one loaded model, keyed by name.
///
/// Loading a model is expensive, so the first request loads it and later
/// requests for the same name share it. Asking for a different name drops
/// the cached model and loads the new one. Share one cache between all
/// embedders of a process by cloning the `Arc` it lives in.
pub struct ModelCache<M> {
    slot: Mutex<Option<CachedModel<M>>>,
}

impl<M> ModelCache<M> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the model called `name`, loading it with `load` if it is not
    /// the one currently cached.
    ///
    /// The lock is held while loading so concurrent callers never load the
    /// same model twice. On failure the cache is left empty.
    pub fn get_or_load<F>(&self, name: &str, load: F) -> Result<Arc<M>>
    where
        F: FnOnce(&str) -> Result<M>,
    {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| SearchError::internal(format!("Model cache poisoned: {}", e)))?;

        if let Some(cached) = slot.as_ref() {
            if cached.name == name {
                return Ok(Arc::clone(&cached.model));
            }
            info!("Evicting embedding model {} for {}", cached.name, name);
        }

        *slot = None;
        let model = Arc::new(load(name)?);
        *slot = Some(CachedModel {
            name: name.to_string(),
            model: Arc::clone(&model),
        });

        Ok(model)
    }

    /// Name of the cached model, if any.
    pub fn current(&self) -> Option<String> {
        self.slot
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|c| c.name.clone()))
    }

    /// Drop the cached model.
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}
