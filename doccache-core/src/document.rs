//! Traits that application types implement to be stored and cached.
//!
//! - [`Document`] binds a serde type to a collection.
//! - [`Searchable`] gives it a cache key and a filter selecting its stored document.
//! - [`Cacheable`] adds the expiry state a [`CachedCollection`](crate::cached::CachedCollection)
//!   sets when an entity enters the cache.

use bson::{
    Bson, Document as BsonDocument,
    de::deserialize_from_document,
    ser::{serialize_to_bson, serialize_to_document},
};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{error::DocumentStoreResult, query::Expr};

/// Core trait that all documents stored in a document store must implement.
///
/// # Example
///
/// ```ignore
/// use doccache::{document::Document, identity::Identity};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// pub struct Item {
///     #[serde(rename = "_id", default, skip_serializing_if = "Identity::is_unset")]
///     pub id: Identity,
///     pub alpha: String,
///     pub bravo: i32,
/// }
///
/// impl Document for Item {
///     fn collection_name() -> &'static str {
///         "items"
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Called on every value decoded from storage, before it is handed out.
    ///
    /// Use it to rebuild state that is not stored. An error here is reported as a decode
    /// failure of the loaded document.
    fn realize(&mut self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Conversions between documents and their BSON form.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Encodes this document; fails unless it serializes to a BSON document.
    fn to_document(&self) -> DocumentStoreResult<BsonDocument>;

    /// Decodes a stored document and runs [`Document::realize`] on it.
    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn to_document(&self) -> DocumentStoreResult<BsonDocument> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        let mut item: D = deserialize_from_document(document)?;
        item.realize()?;

        Ok(item)
    }
}

/// Locates the stored document for an entity, and names it in the cache.
pub trait Searchable {
    /// A stable key derived from the identity fields.
    ///
    /// Two values describing the same stored record must return the same key and values
    /// with different identity must not collide.
    fn cache_key(&self) -> String;

    /// A filter selecting exactly the stored document this value describes.
    fn filter(&self) -> Expr;
}

/// A document that can be held by a [`CachedCollection`](crate::cached::CachedCollection).
pub trait Cacheable: Document + Searchable {
    /// Marks the value as expiring `after` from now.
    fn expire_after(&mut self, after: Duration);

    /// Whether the value must be reloaded from storage.
    fn expired(&self) -> bool;
}
