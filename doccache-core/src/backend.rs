//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the filter-based CRUD surface the typed and cached collections
//! are built on. Implementations hold untyped BSON documents in named collections and are
//! required to be thread-safe (`Send + Sync`), since collections share them across tasks.
//!
//! Timeouts, retries and connection management belong to the backend; nothing above this
//! trait re-implements them.
//!
//! # Examples
//!
//! ```ignore
//! use doccache::{backend::StoreBackend, query::Filter};
//! use bson::doc;
//!
//! let id = backend.insert_one(doc! { "alpha": "one", "bravo": 1 }, "simple").await?;
//! let found = backend.find_one(&Filter::eq("_id", id), "simple").await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use futures::stream::BoxStream;
use std::{fmt::Debug, sync::Arc};

use crate::{
    definition::{IndexDescription, Validator},
    error::DocumentStoreResult,
    query::{Expr, Query},
    update::{Update, UpdateOutcome},
};

/// Lazily produced query results, the equivalent of a server-side cursor.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<BsonDocument>>;

/// Abstract interface for document storage backends.
///
/// # Error Handling
///
/// Writes report uniqueness violations as
/// [`Duplicate`](crate::error::DocumentStoreError::Duplicate) and validator rejections as
/// [`Validation`](crate::error::DocumentStoreError::Validation). Reads of a collection that
/// does not exist behave like reads of an empty one.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document and returns its `_id`, generating one when the document has none.
    ///
    /// The collection is created if it doesn't exist.
    async fn insert_one(&self, document: BsonDocument, collection: &str) -> DocumentStoreResult<Bson>;

    /// Returns the first document matching `filter`.
    async fn find_one(
        &self,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Streams the documents selected by `query`.
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream>;

    async fn count_documents(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Distinct values of `field` among the documents matching `filter`.
    async fn distinct(
        &self,
        field: &str,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        filter: &Expr,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Replaces the first document matching `filter`, keeping its `_id`.
    async fn replace_one(
        &self,
        filter: &Expr,
        replacement: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter` and returns how many were deleted.
    async fn delete_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64>;

    async fn delete_many(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64>;

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool>;

    /// Creates an empty collection, optionally guarded by a validator.
    ///
    /// Fails if the collection already exists.
    async fn create_collection(
        &self,
        name: &str,
        validator: Option<&Validator>,
    ) -> DocumentStoreResult<()>;

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    async fn add_index(&self, collection: &str, index: &IndexDescription) -> DocumentStoreResult<()>;

    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_one(&self, document: BsonDocument, collection: &str) -> DocumentStoreResult<Bson> {
        (*self).insert_one(document, collection).await
    }

    async fn find_one(
        &self,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        (*self).find_one(filter, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        (*self).find(query, collection).await
    }

    async fn count_documents(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        (*self).count_documents(filter, collection).await
    }

    async fn distinct(
        &self,
        field: &str,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        (*self).distinct(field, filter, collection).await
    }

    async fn update_one(
        &self,
        filter: &Expr,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        (*self).update_one(filter, update, collection).await
    }

    async fn replace_one(
        &self,
        filter: &Expr,
        replacement: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        (*self).replace_one(filter, replacement, collection).await
    }

    async fn delete_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        (*self).delete_one(filter, collection).await
    }

    async fn delete_many(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        (*self).delete_many(filter, collection).await
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        (*self).collection_exists(name).await
    }

    async fn create_collection(
        &self,
        name: &str,
        validator: Option<&Validator>,
    ) -> DocumentStoreResult<()> {
        (*self).create_collection(name, validator).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }

    async fn add_index(&self, collection: &str, index: &IndexDescription) -> DocumentStoreResult<()> {
        (*self).add_index(collection, index).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn insert_one(&self, document: BsonDocument, collection: &str) -> DocumentStoreResult<Bson> {
        (**self).insert_one(document, collection).await
    }

    async fn find_one(
        &self,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        (**self).find_one(filter, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        (**self).find(query, collection).await
    }

    async fn count_documents(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        (**self).count_documents(filter, collection).await
    }

    async fn distinct(
        &self,
        field: &str,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        (**self).distinct(field, filter, collection).await
    }

    async fn update_one(
        &self,
        filter: &Expr,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        (**self).update_one(filter, update, collection).await
    }

    async fn replace_one(
        &self,
        filter: &Expr,
        replacement: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        (**self).replace_one(filter, replacement, collection).await
    }

    async fn delete_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        (**self).delete_one(filter, collection).await
    }

    async fn delete_many(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        (**self).delete_many(filter, collection).await
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        (**self).collection_exists(name).await
    }

    async fn create_collection(
        &self,
        name: &str,
        validator: Option<&Validator>,
    ) -> DocumentStoreResult<()> {
        (**self).create_collection(name, validator).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (**self).list_collections().await
    }

    async fn add_index(&self, collection: &str, index: &IndexDescription) -> DocumentStoreResult<()> {
        (**self).add_index(collection, index).await
    }
}

/// Factory for backends that need asynchronous setup, such as connecting to a server.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
