//! Model caching utilities for sharing loaded weights across callers.
//!
//! This module provides a thread-safe cache for model instances. Each entry is
//! initialized at most once: callers that arrive while a load is in flight wait
//! for it instead of starting a second one.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Trait implemented by model option types to generate a stable cache key.
pub trait ModelOptions {
    fn cache_key(&self) -> String;
}

type Slot = Arc<OnceCell<Arc<dyn Any + Send + Sync>>>;

/// Type alias for the cache storage type.
type CacheStorage = HashMap<(TypeId, String), Slot>;

/// A thread-safe, load-once cache for model instances.
///
/// The cache stores models by a string key (typically the model repo and
/// device) and returns clones that share the underlying weights. The map lock
/// is only held long enough to find the slot for a key; the load itself runs
/// under that slot's one-shot guard, so loads of different keys never block
/// each other and a single key is never loaded twice.
///
/// A load that fails leaves its slot empty, and the next caller tries again.
pub struct ModelCache {
    cache: Mutex<CacheStorage>,
}

impl ModelCache {
    /// Create a new empty model cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create a model from the cache.
    ///
    /// If a model with the given key already exists, a clone is returned.
    /// Otherwise `loader` is awaited to create the instance. Concurrent callers
    /// for the same key share that single load.
    ///
    /// # Arguments
    /// * `key` - A unique identifier for this model variant
    /// * `loader` - Produces a new model instance if not cached
    ///
    /// # Type Parameters
    /// * `M` - The model type, must be Clone + Send + Sync
    pub async fn get_or_create<M, Fut, F>(&self, key: &str, loader: F) -> anyhow::Result<M>
    where
        M: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<M>>,
    {
        let slot = {
            let mut cache = self.cache.lock().await;
            cache
                .entry((TypeId::of::<M>(), key.to_string()))
                .or_default()
                .clone()
        };

        let cached = slot
            .get_or_try_init(|| async {
                let model = loader().await?;
                Ok::<_, anyhow::Error>(Arc::new(model) as Arc<dyn Any + Send + Sync>)
            })
            .await?;

        cached
            .downcast_ref::<M>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Cached model for key '{key}' has an unexpected type"))
    }

    /// Returns the cached model for `key` without loading it.
    pub async fn get<M>(&self, key: &str) -> Option<M>
    where
        M: Clone + Send + Sync + 'static,
    {
        let cache = self.cache.lock().await;
        let model = cache
            .get(&(TypeId::of::<M>(), key.to_string()))
            .and_then(|slot| slot.get())
            .and_then(|cached| cached.downcast_ref::<M>().cloned());
        model
    }

    /// Get the number of loaded models.
    pub async fn len(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|slot| slot.initialized()).count()
    }

    /// Check if no model has been loaded yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}
