//! Decode-on-read access to a single collection.
//!
//! [`TypedCollection<B, D>`] issues filter-based operations against a backend and converts
//! between stored BSON documents and values of `D`. Expected outcomes (nothing matched,
//! already exists, nothing changed) come back as distinct error variants so callers can
//! branch on them.
//!
//! # Example
//!
//! ```ignore
//! let simple = store.typed_collection::<SimpleItem>();
//!
//! let item = simple
//!     .find_or_create(&key.filter(), &SimpleItem::new("one", 1, "One is the loneliest number"))
//!     .await?;
//!
//! simple
//!     .update(&key.filter(), &Update::new().set("charlie", "One more time").inc("delta", 2))
//!     .await?;
//! ```

use bson::{Bson, Document as BsonDocument};
use futures::TryStreamExt;
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter, Query},
    update::{Update, UpdateOutcome},
};

#[derive(Debug)]
pub struct TypedCollection<B: StoreBackend, D: Document> {
    name: String,
    backend: B,
    _marker: PhantomData<fn() -> D>,
}

impl<B: StoreBackend, D: Document> TypedCollection<B, D> {
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            backend,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the single document matching `filter`.
    ///
    /// Fails with `NotFound` when nothing matches and `Decode` when the stored document
    /// cannot be read as a `D`.
    pub async fn find(&self, filter: &Expr) -> DocumentStoreResult<D> {
        match self.backend.find_one(filter, &self.name).await? {
            Some(document) => self.decode(document),
            None => Err(DocumentStoreError::NotFound {
                collection: self.name.clone(),
                filter: filter.to_string(),
            }),
        }
    }

    /// Inserts `item` as a new document and returns the id the store assigned to it.
    ///
    /// Existence is not checked first; a unique index turns a second insert into `Duplicate`.
    pub async fn create(&self, item: &D) -> DocumentStoreResult<Bson> {
        let id = self
            .backend
            .insert_one(item.to_document()?, &self.name)
            .await?;

        debug!(collection = %self.name, %id, "created document");

        Ok(id)
    }

    /// Finds the document matching `filter`, creating it from `item` first if it is missing.
    ///
    /// The returned value is always read back from storage. When another caller creates the
    /// same document concurrently the losing insert's `Duplicate` is absorbed and the winner's
    /// document is returned. A `Duplicate` that leaves nothing matching `filter` is returned as is.
    pub async fn find_or_create(&self, filter: &Expr, item: &D) -> DocumentStoreResult<D> {
        match self.find(filter).await {
            Err(err) if err.is_not_found() => {}
            other => return other,
        }

        let collision = match self.create(item).await {
            Ok(_) => None,
            Err(err) if err.is_duplicate() => {
                debug!(collection = %self.name, %filter, "lost create race, reloading");
                Some(err)
            }
            Err(err) => return Err(err),
        };

        match (self.find(filter).await, collision) {
            // The collision was on another unique index, not with this document
            (Err(err), Some(collision)) if err.is_not_found() => Err(collision),
            (found, _) => found,
        }
    }

    pub async fn count(&self, filter: &Expr) -> DocumentStoreResult<u64> {
        self.backend.count_documents(filter, &self.name).await
    }

    /// Deletes the document matching `filter`.
    ///
    /// With `idempotent` unset, deleting nothing is reported as `NotFound`.
    pub async fn delete(&self, filter: &Expr, idempotent: bool) -> DocumentStoreResult<()> {
        let deleted = self.backend.delete_one(filter, &self.name).await?;

        if deleted == 0 && !idempotent {
            return Err(DocumentStoreError::NotFound {
                collection: self.name.clone(),
                filter: filter.to_string(),
            });
        }

        Ok(())
    }

    /// Deletes every document in the collection and returns how many there were.
    pub async fn delete_all(&self) -> DocumentStoreResult<u64> {
        let deleted = self
            .backend
            .delete_many(&Filter::all(), &self.name)
            .await?;

        debug!(collection = %self.name, deleted, "deleted all documents");

        Ok(deleted)
    }

    /// Decodes each document matching `filter` and hands it to `visit`.
    ///
    /// Stops at the first decode or visitor error and returns it.
    pub async fn iterate<F>(&self, filter: &Expr, mut visit: F) -> DocumentStoreResult<()>
    where
        F: FnMut(D) -> DocumentStoreResult<()>,
    {
        let mut cursor = self
            .backend
            .find(Query::filtered(filter.clone()), &self.name)
            .await?;

        while let Some(document) = cursor.try_next().await? {
            visit(self.decode(document)?)?;
        }

        Ok(())
    }

    /// Collects the documents selected by `query`.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.backend
            .find(query, &self.name)
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .map(|document| self.decode(document))
            .collect()
    }

    /// Replaces the whole document matching `filter` with `item`.
    pub async fn replace(&self, filter: &Expr, item: &D) -> DocumentStoreResult<()> {
        let outcome = self
            .backend
            .replace_one(filter, item.to_document()?, &self.name)
            .await?;

        self.check_outcome(filter, outcome)
    }

    /// Applies field operators to the document matching `filter`.
    pub async fn update(&self, filter: &Expr, update: &Update) -> DocumentStoreResult<()> {
        let outcome = self
            .backend
            .update_one(filter, update, &self.name)
            .await?;

        self.check_outcome(filter, outcome)
    }

    pub async fn distinct(&self, field: &str, filter: &Expr) -> DocumentStoreResult<Vec<Bson>> {
        self.backend.distinct(field, filter, &self.name).await
    }

    /// Distinct values of a string field; any non-string value is an error.
    pub async fn string_values_for(
        &self,
        field: &str,
        filter: &Expr,
    ) -> DocumentStoreResult<Vec<String>> {
        self.distinct(field, filter)
            .await?
            .into_iter()
            .map(|value| match value {
                Bson::String(value) => Ok(value),
                _ => Err(DocumentStoreError::UnexpectedType {
                    field: field.to_string(),
                    expected: "a string",
                }),
            })
            .collect()
    }

    fn decode(&self, document: BsonDocument) -> DocumentStoreResult<D> {
        D::from_document(document).map_err(|err| DocumentStoreError::Decode {
            collection: self.name.clone(),
            detail: err.to_string(),
        })
    }

    fn check_outcome(&self, filter: &Expr, outcome: UpdateOutcome) -> DocumentStoreResult<()> {
        if outcome.is_no_match() {
            Err(DocumentStoreError::NoMatch {
                collection: self.name.clone(),
                filter: filter.to_string(),
            })
        } else if outcome.is_no_modification() {
            Err(DocumentStoreError::NoModification {
                collection: self.name.clone(),
                filter: filter.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
