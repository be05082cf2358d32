//! In-memory storage implementation for document stores.
//!
//! Collections are vectors of BSON documents behind a single async-aware read-write lock.
//! Validators and unique indexes are enforced on every write, so the store reports the same
//! `Duplicate` and `Validation` outcomes a server would.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document as BsonDocument};
use futures::StreamExt;
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tracing::debug;

use doccache_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    definition::{IndexDescription, Validator},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
    update::{Update, UpdateOutcome},
};

use crate::{
    evaluator::{lookup, Comparable, DocumentEvaluator},
    update::apply,
};

type StoreMap = HashMap<String, MemoryCollection>;

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<BsonDocument>,
    indexes: Vec<IndexDescription>,
    validator: Option<Validator>,
}

impl MemoryCollection {
    fn position(&self, filter: &Expr) -> Option<usize> {
        self.documents
            .iter()
            .position(|document| DocumentEvaluator::matches(document, filter))
    }

    fn matching<'a>(&'a self, filter: &'a Expr) -> impl Iterator<Item = &'a BsonDocument> + 'a {
        self.documents
            .iter()
            .filter(move |document| DocumentEvaluator::matches(document, filter))
    }

    fn validate(&self, collection: &str, document: &BsonDocument) -> DocumentStoreResult<()> {
        match &self.validator {
            Some(validator) => validator
                .validate(document)
                .map_err(|detail| DocumentStoreError::Validation {
                    collection: collection.to_string(),
                    detail,
                }),
            None => Ok(()),
        }
    }

    /// Checks `candidate` against `_id` and every unique index, ignoring the document at `skip`.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &BsonDocument,
        skip: Option<usize>,
    ) -> DocumentStoreResult<()> {
        let others = self
            .documents
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, document)| document);

        for other in others {
            if same_keys(&["_id".to_string()], candidate, other) {
                return Err(duplicate(collection, "_id_", candidate, &["_id".to_string()]));
            }

            for index in self.indexes.iter().filter(|index| index.unique) {
                if same_keys(&index.keys, candidate, other) {
                    return Err(duplicate(collection, &index.name(), candidate, &index.keys));
                }
            }
        }

        Ok(())
    }
}

/// Missing fields index as null, as they do on a server.
fn same_keys(keys: &[String], left: &BsonDocument, right: &BsonDocument) -> bool {
    keys.iter().all(|key| {
        let left = lookup(left, key).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = lookup(right, key).map(Comparable::from).unwrap_or(Comparable::Null);

        left == right
    })
}

fn duplicate(collection: &str, index: &str, document: &BsonDocument, keys: &[String]) -> DocumentStoreError {
    let values = keys
        .iter()
        .map(|key| {
            let value = lookup(document, key).cloned().unwrap_or(Bson::Null);
            format!("{key}: {value}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    DocumentStoreError::Duplicate {
        collection: collection.to_string(),
        detail: format!("index {index} dup key {{ {values} }}"),
    }
}

fn compare_field(left: &BsonDocument, right: &BsonDocument, field: &str) -> Ordering {
    let left = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
    let right = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

    left.partial_cmp(&right).unwrap_or(Ordering::Equal)
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// safely shared across async tasks. Multiple clones of the same instance share the same
/// underlying data.
///
/// Queries scan every document in a collection; indexes are only used to enforce
/// uniqueness.
///
/// # Example
///
/// ```ignore
/// use doccache_memory::InMemoryStore;
/// use doccache::{backend::StoreBackend, query::Filter};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
///
/// let id = store.insert_one(doc! { "alpha": "one", "bravo": 1 }, "simple").await?;
/// let found = store.find_one(&Filter::eq("_id", id), "simple").await?;
/// assert!(found.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> documents
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, document: BsonDocument, collection: &str) -> DocumentStoreResult<Bson> {
        let mut store = self.store.write().await;
        let collection_data = store.entry(collection.to_string()).or_default();

        let document = if document.contains_key("_id") {
            document
        } else {
            let mut with_id = doc! { "_id": ObjectId::new() };
            for (key, value) in document {
                with_id.insert(key, value);
            }
            with_id
        };

        collection_data.validate(collection, &document)?;
        collection_data.check_unique(collection, &document, None)?;

        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        collection_data.documents.push(document);

        debug!(collection, %id, "inserted document");

        Ok(id)
    }

    async fn find_one(
        &self,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|collection_data| collection_data.matching(filter).next().cloned()))
    }

    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let store = self.store.read().await;
        let Some(collection_data) = store.get(collection) else {
            return Ok(futures::stream::empty().boxed());
        };

        let mut documents = match &query.filter {
            Some(filter) => collection_data.matching(filter).cloned().collect::<Vec<_>>(),
            None => collection_data.documents.clone(),
        };

        // sort_by is stable, so ties keep insertion order
        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| match sort.direction {
                SortDirection::Asc => compare_field(a, b, &sort.field),
                SortDirection::Desc => compare_field(b, a, &sort.field),
            });
        }

        let documents = documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(Ok)
            .collect::<Vec<_>>();

        Ok(futures::stream::iter(documents).boxed())
    }

    async fn count_documents(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map(|collection_data| collection_data.matching(filter).count() as u64)
            .unwrap_or(0))
    }

    async fn distinct(
        &self,
        field: &str,
        filter: &Expr,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(collection_data) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut values: Vec<Bson> = Vec::new();
        let mut push = |value: &Bson| {
            if !values
                .iter()
                .any(|seen| Comparable::from(seen) == Comparable::from(value))
            {
                values.push(value.clone());
            }
        };

        for document in collection_data.matching(filter) {
            match lookup(document, field) {
                // Arrays contribute their elements
                Some(Bson::Array(items)) => items.iter().for_each(&mut push),
                Some(value) => push(value),
                None => {}
            }
        }

        Ok(values)
    }

    async fn update_one(
        &self,
        filter: &Expr,
        update: &Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(collection_data) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(position) = collection_data.position(filter) else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = collection_data.documents[position].clone();
        apply(&mut updated, update)?;

        if updated == collection_data.documents[position] {
            return Ok(UpdateOutcome { matched: 1, ..UpdateOutcome::default() });
        }

        collection_data.validate(collection, &updated)?;
        collection_data.check_unique(collection, &updated, Some(position))?;
        collection_data.documents[position] = updated;

        Ok(UpdateOutcome { matched: 1, modified: 1, upserted: 0 })
    }

    async fn replace_one(
        &self,
        filter: &Expr,
        replacement: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(collection_data) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(position) = collection_data.position(filter) else {
            return Ok(UpdateOutcome::default());
        };

        let id = collection_data.documents[position]
            .get("_id")
            .cloned()
            .unwrap_or(Bson::Null);

        let mut replaced = doc! { "_id": id.clone() };
        for (key, value) in replacement {
            if key == "_id" {
                if Comparable::from(&value) != Comparable::from(&id) {
                    return Err(DocumentStoreError::InvalidDocument(
                        "the _id field is immutable".to_string(),
                    ));
                }
                continue;
            }

            replaced.insert(key, value);
        }

        if replaced == collection_data.documents[position] {
            return Ok(UpdateOutcome { matched: 1, ..UpdateOutcome::default() });
        }

        collection_data.validate(collection, &replaced)?;
        collection_data.check_unique(collection, &replaced, Some(position))?;
        collection_data.documents[position] = replaced;

        Ok(UpdateOutcome { matched: 1, modified: 1, upserted: 0 })
    }

    async fn delete_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_data) = store.get_mut(collection) else {
            return Ok(0);
        };

        match collection_data.position(filter) {
            Some(position) => {
                collection_data.documents.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let before = collection_data.documents.len();
        collection_data
            .documents
            .retain(|document| !DocumentEvaluator::matches(document, filter));

        Ok((before - collection_data.documents.len()) as u64)
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(self.store.read().await.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        validator: Option<&Validator>,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.contains_key(name) {
            return Err(DocumentStoreError::Backend(format!("collection {name} already exists")));
        }

        store.insert(
            name.to_string(),
            MemoryCollection {
                validator: validator.cloned(),
                ..MemoryCollection::default()
            },
        );

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        Ok(names)
    }

    async fn add_index(&self, collection: &str, index: &IndexDescription) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_data = store.entry(collection.to_string()).or_default();

        if collection_data.indexes.contains(index) {
            return Ok(());
        }

        if index.unique {
            let documents = &collection_data.documents;

            for (i, document) in documents.iter().enumerate() {
                if documents[i + 1..]
                    .iter()
                    .any(|other| same_keys(&index.keys, document, other))
                {
                    return Err(duplicate(collection, &index.name(), document, &index.keys));
                }
            }
        }

        collection_data.indexes.push(index.clone());

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use doccache_memory::InMemoryStore;
/// use doccache::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{spec::BinarySubtype, Binary};
    use doccache_core::{definition::BsonKind, query::Filter};
    use futures::TryStreamExt;

    fn key(alpha: &str, bravo: i32) -> Expr {
        Filter::eq("alpha", alpha).and(Filter::eq("bravo", bravo))
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .add_index("simple", &IndexDescription::new(true, ["alpha", "bravo"]))
            .await
            .unwrap();

        for (alpha, bravo, charlie) in [
            ("one", 1, "One is the loneliest number"),
            ("two", 2, "It takes two to tango"),
            ("three", 3, "Three can keep a secret if two of them are dead"),
        ] {
            store
                .insert_one(doc! { "alpha": alpha, "bravo": bravo, "charlie": charlie }, "simple")
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn insert_assigns_object_id() {
        let store = InMemoryStore::new();

        let id = store.insert_one(doc! { "alpha": "one" }, "simple").await.unwrap();
        let found = store
            .find_one(&Filter::eq("_id", id.clone()), "simple")
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(found.keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn unique_index_rejects_second_insert() {
        let store = seeded().await;

        let err = store
            .insert_one(doc! { "alpha": "one", "bravo": 1, "charlie": "again" }, "simple")
            .await
            .unwrap_err();

        assert!(err.is_duplicate());
        assert_eq!(store.count_documents(&Filter::all(), "simple").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn validator_rejects_documents() {
        let store = InMemoryStore::new();
        let validator = Validator::new()
            .required("alpha", BsonKind::String)
            .required("charlie", BsonKind::String);

        store.create_collection("simple", Some(&validator)).await.unwrap();

        let err = store
            .insert_one(doc! { "alpha": "beast", "bravo": 666 }, "simple")
            .await
            .unwrap_err();

        assert!(err.is_validation_failure());
        assert!(store.create_collection("simple", None).await.is_err());
    }

    #[tokio::test]
    async fn find_sorts_and_pages() {
        let store = seeded().await;

        let query = Query::builder()
            .sort("bravo", SortDirection::Desc)
            .offset(1)
            .limit(1)
            .build();
        let found: Vec<_> = store.find(query, "simple").await.unwrap().try_collect().await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("alpha").unwrap(), "two");
    }

    #[tokio::test]
    async fn update_reports_match_and_modification() {
        let store = seeded().await;

        let outcome = store
            .update_one(&key("two", 2), &Update::new().inc("bravo", 20), "simple")
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1, upserted: 0 });

        let outcome = store
            .update_one(&key("two", 22), &Update::new().set("alpha", "two"), "simple")
            .await
            .unwrap();
        assert!(outcome.is_no_modification());

        let outcome = store
            .update_one(&key("two", 2), &Update::new().set("alpha", "deux"), "simple")
            .await
            .unwrap();
        assert!(outcome.is_no_match());
    }

    #[tokio::test]
    async fn update_cannot_break_unique_index() {
        let store = seeded().await;

        let err = store
            .update_one(&key("two", 2), &Update::new().set("alpha", "one").set("bravo", 1), "simple")
            .await
            .unwrap_err();

        assert!(err.is_duplicate());
        assert!(store.find_one(&key("two", 2), "simple").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replace_keeps_id() {
        let store = seeded().await;
        let before = store.find_one(&key("three", 3), "simple").await.unwrap().unwrap();

        let outcome = store
            .replace_one(&key("three", 3), doc! { "alpha": "three", "bravo": 3, "charlie": "Secret" }, "simple")
            .await
            .unwrap();
        let after = store.find_one(&key("three", 3), "simple").await.unwrap().unwrap();

        assert_eq!(outcome.modified, 1);
        assert_eq!(before.get("_id"), after.get("_id"));
        assert_eq!(after.get_str("charlie").unwrap(), "Secret");
    }

    #[tokio::test]
    async fn deletes_and_distinct() {
        let store = seeded().await;

        assert_eq!(store.delete_one(&key("one", 1), "simple").await.unwrap(), 1);
        assert_eq!(store.delete_one(&key("one", 1), "simple").await.unwrap(), 0);
        assert_eq!(store.delete_one(&Filter::all(), "missing").await.unwrap(), 0);

        let alphas = store.distinct("alpha", &Filter::all(), "simple").await.unwrap();
        assert_eq!(alphas, vec![Bson::from("two"), Bson::from("three")]);

        assert_eq!(store.delete_many(&Filter::all(), "simple").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn add_index_checks_existing_documents() {
        let store = InMemoryStore::new();

        for _ in 0..2 {
            store.insert_one(doc! { "alpha": "one" }, "simple").await.unwrap();
        }

        let err = store
            .add_index("simple", &IndexDescription::new(true, ["alpha"]))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        store
            .add_index("simple", &IndexDescription::new(false, ["alpha"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_binary_ids_and_large_integers_coexist() {
        let store = InMemoryStore::new();
        store
            .add_index("keys", &IndexDescription::new(true, ["n"]))
            .await
            .unwrap();

        let first = Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2, 3] };
        let second = Binary { subtype: BinarySubtype::Generic, bytes: vec![9, 9, 9] };

        store
            .insert_one(doc! { "_id": first, "n": 9_007_199_254_740_992_i64 }, "keys")
            .await
            .unwrap();
        store
            .insert_one(doc! { "_id": second.clone(), "n": 9_007_199_254_740_993_i64 }, "keys")
            .await
            .unwrap();

        let found = store
            .find_one(&Filter::eq("_id", second.clone()), "keys")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_i64("n").unwrap(), 9_007_199_254_740_993);

        let err = store
            .insert_one(doc! { "_id": second, "n": 1 }, "keys")
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn increment_overflow_is_rejected() {
        let store = InMemoryStore::new();
        store
            .insert_one(doc! { "alpha": "x", "n": i64::MAX }, "simple")
            .await
            .unwrap();

        let err = store
            .update_one(&Filter::eq("alpha", "x"), &Update::new().inc("n", 1_i64), "simple")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));

        let stored = store.find_one(&Filter::eq("alpha", "x"), "simple").await.unwrap().unwrap();
        assert_eq!(stored.get_i64("n").unwrap(), i64::MAX);
    }

    #[tokio::test]
    async fn collections_lifecycle() {
        let store = InMemoryStore::builder().build().await.unwrap();

        store.create_collection("beta", None).await.unwrap();
        store.create_collection("alpha", None).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["alpha", "beta"]);

        store.drop_collection("alpha").await.unwrap();
        assert!(!store.collection_exists("alpha").await.unwrap());
        assert!(matches!(
            store.drop_collection("alpha").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }
}
