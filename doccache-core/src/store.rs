//! Main document store interface.
//!
//! [`DocumentStore`] owns a backend and hands out typed and cached collections over it.
//!
//! # Example
//!
//! ```ignore
//! use doccache::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! store.define_collection(&SimpleItem::definition()?).await?;
//!
//! let simple = store.cached_collection::<SimpleItem>(CacheConfig::default());
//! ```

use tracing::{info, warn};

use crate::{
    backend::StoreBackend,
    cached::CachedCollection,
    collection::TypedCollection,
    config::CacheConfig,
    definition::CollectionDefinition,
    document::{Cacheable, Document},
    error::DocumentStoreResult,
};

#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A typed collection borrowing this store's backend.
    pub fn typed_collection<D: Document>(&self) -> TypedCollection<&B, D> {
        TypedCollection::new(D::collection_name(), &self.backend)
    }

    /// A cached collection borrowing this store's backend.
    ///
    /// Each call starts with an empty cache; keep the returned collection around to benefit
    /// from it.
    pub fn cached_collection<D: Cacheable>(&self, config: CacheConfig) -> CachedCollection<&B, D> {
        CachedCollection::new(self.typed_collection::<D>(), config)
    }

    /// Creates the collection described by `definition` unless it already exists.
    ///
    /// A new collection gets the definition's validator and then its indexes. If an index
    /// cannot be created the new collection is dropped again and the error returned. Existing
    /// collections are left exactly as they are.
    pub async fn define_collection(&self, definition: &CollectionDefinition) -> DocumentStoreResult<()> {
        if self.backend.collection_exists(&definition.name).await? {
            return Ok(());
        }

        self.backend
            .create_collection(&definition.name, definition.validator.as_ref())
            .await?;

        for index in &definition.indexes {
            if let Err(err) = self.backend.add_index(&definition.name, index).await {
                warn!(collection = %definition.name, index = %index.name(), %err, "index creation failed, dropping collection");

                if let Err(drop_err) = self.backend.drop_collection(&definition.name).await {
                    warn!(collection = %definition.name, err = %drop_err, "failed to drop collection");
                }

                return Err(err);
            }
        }

        info!(
            collection = %definition.name,
            validated = definition.validator.is_some(),
            indexes = definition.indexes.len(),
            "created collection"
        );

        Ok(())
    }

    pub async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        self.backend.collection_exists(name).await
    }

    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}
