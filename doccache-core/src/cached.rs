//! Read-through, write-invalidate cache in front of a [`TypedCollection`].
//!
//! A [`CachedCollection`] keeps the entities it has loaded in a map keyed by
//! [`Searchable::cache_key`]. Lookups that hit a fresh entry never touch storage and hand back
//! the very same `Arc<D>`; misses (including entries found expired) load from storage and
//! cache the result. Writes go to storage and evict the affected key, they never write
//! through.
//!
//! The map sits behind a single async mutex that is held only for map operations. Storage
//! calls happen with the lock released, so two tasks missing on the same key may both load
//! it; the last insert wins, which is harmless since both loaded the same document.
//!
//! ```ignore
//! let cache = store.cached_collection::<SimpleItem>(CacheConfig::default());
//!
//! let item = cache.find_or_create(&SimpleItem::new("one", 1, "One is the loneliest number")).await?;
//! let again = cache.find(&SimpleKey::new("one", 1)).await?;
//! assert!(Arc::ptr_eq(&item, &again));
//! ```

use bson::Bson;
use mea::mutex::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, trace};

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    config::CacheConfig,
    document::{Cacheable, Searchable},
    error::DocumentStoreResult,
    update::Update,
};

type CacheMap<D> = HashMap<String, Arc<D>>;

pub struct CachedCollection<B: StoreBackend, D: Cacheable> {
    collection: TypedCollection<B, D>,
    cache: Mutex<CacheMap<D>>,
    config: CacheConfig,
}

impl<B: StoreBackend, D: Cacheable> CachedCollection<B, D> {
    pub fn new(collection: TypedCollection<B, D>, config: CacheConfig) -> Self {
        Self {
            collection,
            cache: Mutex::new(CacheMap::new()),
            config,
        }
    }

    /// The uncached collection underneath.
    pub fn collection(&self) -> &TypedCollection<B, D> {
        &self.collection
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the entity `key` describes, from the cache when a fresh copy is held.
    ///
    /// Not-found results are never cached.
    pub async fn find(&self, key: &impl Searchable) -> DocumentStoreResult<Arc<D>> {
        let cache_key = key.cache_key();

        {
            let mut cache = self.cache.lock().await;
            let cached = cache.get(&cache_key).cloned();

            match cached {
                Some(item) if !item.expired() => {
                    trace!(collection = %self.collection.name(), key = %cache_key, "cache hit");
                    return Ok(item);
                }
                Some(_) => {
                    cache.remove(&cache_key);
                    debug!(collection = %self.collection.name(), key = %cache_key, "evicted expired entry");
                }
                None => {
                    trace!(collection = %self.collection.name(), key = %cache_key, "cache miss");
                }
            }
        }

        let mut item = self.collection.find(&key.filter()).await?;
        item.expire_after(self.config.expire_after);

        let item = Arc::new(item);
        self.cache
            .lock()
            .await
            .insert(cache_key, Arc::clone(&item));

        Ok(item)
    }

    /// Stores a new entity. The cache is left alone; the next `find` loads the stored form.
    pub async fn create(&self, item: &D) -> DocumentStoreResult<Bson> {
        self.collection.create(item).await
    }

    /// Finds `item`'s stored counterpart, creating it first when there is none.
    ///
    /// A `Duplicate` from a concurrent creator is treated as success and the stored document
    /// is loaded like any other miss. When the collision left nothing under `item`'s key, the
    /// `Duplicate` is returned.
    pub async fn find_or_create(&self, item: &D) -> DocumentStoreResult<Arc<D>> {
        match self.find(item).await {
            Err(err) if err.is_not_found() => {}
            other => return other,
        }

        let collision = match self.collection.create(item).await {
            Ok(_) => None,
            Err(err) if err.is_duplicate() => {
                debug!(
                    collection = %self.collection.name(),
                    key = %item.cache_key(),
                    "lost create race, reloading"
                );
                Some(err)
            }
            Err(err) => return Err(err),
        };

        match (self.find(item).await, collision) {
            (Err(err), Some(collision)) if err.is_not_found() => Err(collision),
            (found, _) => found,
        }
    }

    /// Evicts `key` and deletes its stored document.
    ///
    /// With `idempotent` unset, deleting nothing is reported as `NotFound`.
    pub async fn delete(&self, key: &impl Searchable, idempotent: bool) -> DocumentStoreResult<()> {
        self.cache.lock().await.remove(&key.cache_key());

        self.collection.delete(&key.filter(), idempotent).await
    }

    /// Empties the cache, then deletes every stored document.
    pub async fn delete_all(&self) -> DocumentStoreResult<u64> {
        self.cache.lock().await.clear();

        self.collection.delete_all().await
    }

    /// Applies `update` to the document `key` describes and evicts `key`.
    ///
    /// Only the old key is evicted: the update may change the fields the key is derived from,
    /// and the new key is unknown until the document is read again.
    pub async fn update(&self, key: &impl Searchable, update: &Update) -> DocumentStoreResult<()> {
        self.collection.update(&key.filter(), update).await?;
        self.invalidate(key).await;

        Ok(())
    }

    /// Replaces the document `key` describes and evicts `key`.
    pub async fn replace(&self, key: &impl Searchable, item: &D) -> DocumentStoreResult<()> {
        self.collection.replace(&key.filter(), item).await?;
        self.invalidate(key).await;

        Ok(())
    }

    /// Evicts every entry whose key starts with `prefix`; storage is untouched.
    pub async fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let mut cache = self.cache.lock().await;
        let before = cache.len();
        cache.retain(|key, _| !key.starts_with(prefix));

        let evicted = before - cache.len();
        debug!(collection = %self.collection.name(), prefix, evicted, "invalidated by prefix");

        evicted
    }

    /// Evicts a single entry, returning whether it was cached.
    pub async fn invalidate(&self, key: &impl Searchable) -> bool {
        self.cache
            .lock()
            .await
            .remove(&key.cache_key())
            .is_some()
    }

    /// Evicts every entry; storage is untouched.
    pub async fn invalidate_all(&self) -> usize {
        let mut cache = self.cache.lock().await;
        let evicted = cache.len();
        cache.clear();

        evicted
    }

    /// Whether an entry (fresh or not) is held for `cache_key`.
    pub async fn contains(&self, cache_key: &str) -> bool {
        self.cache.lock().await.contains_key(cache_key)
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

impl<B: StoreBackend, D: Cacheable> fmt::Debug for CachedCollection<B, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCollection")
            .field("collection", &self.collection.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
