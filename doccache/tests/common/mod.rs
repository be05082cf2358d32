#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use doccache::{
    async_trait,
    backend::DocumentStream,
    bson::{Bson, Document as BsonDocument},
    memory::InMemoryStore,
    prelude::*,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub const SIMPLE_VALIDATOR_JSON: &str = r#"{
    "$jsonSchema": {
        "bsonType": "object",
        "required": ["alpha", "bravo", "charlie"],
        "properties": {
            "alpha": { "bsonType": "string" },
            "bravo": { "bsonType": "int" },
            "charlie": { "bsonType": "string" }
        }
    }
}"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Identity of a [`SimpleItem`] without its payload.
#[derive(Debug, Clone)]
pub struct SimpleKey {
    pub alpha: String,
    pub bravo: i32,
}

impl SimpleKey {
    pub fn new(alpha: &str, bravo: i32) -> Self {
        Self { alpha: alpha.to_string(), bravo }
    }
}

impl Searchable for SimpleKey {
    fn cache_key(&self) -> String {
        format!("{}-{}", self.alpha, self.bravo)
    }

    fn filter(&self) -> Expr {
        Filter::eq("alpha", self.alpha.as_str()).and(Filter::eq("bravo", self.bravo))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Identity::is_unset")]
    pub id: Identity,
    pub alpha: String,
    pub bravo: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub charlie: String,
    #[serde(default)]
    pub delta: i32,
    #[serde(skip)]
    pub realized: bool,
    #[serde(skip)]
    pub expiry: Expiry,
}

impl SimpleItem {
    pub fn new(alpha: &str, bravo: i32, charlie: &str) -> Self {
        Self {
            id: Identity::default(),
            alpha: alpha.to_string(),
            bravo,
            charlie: charlie.to_string(),
            delta: 0,
            realized: false,
            expiry: Expiry::default(),
        }
    }

    pub fn key(&self) -> SimpleKey {
        SimpleKey::new(&self.alpha, self.bravo)
    }

    pub fn definition() -> DocumentStoreResult<CollectionDefinition> {
        Ok(CollectionDefinition::for_document::<Self>()
            .validator(Validator::from_json(SIMPLE_VALIDATOR_JSON)?)
            .index(IndexDescription::new(true, ["alpha", "bravo"])))
    }
}

impl Document for SimpleItem {
    fn collection_name() -> &'static str {
        "simple"
    }

    fn realize(&mut self) -> DocumentStoreResult<()> {
        self.realized = true;
        Ok(())
    }
}

impl Searchable for SimpleItem {
    fn cache_key(&self) -> String {
        self.key().cache_key()
    }

    fn filter(&self) -> Expr {
        self.key().filter()
    }
}

impl Cacheable for SimpleItem {
    fn expire_after(&mut self, after: Duration) {
        self.expiry.expire_after(after)
    }

    fn expired(&self) -> bool {
        self.expiry.expired()
    }
}

impl Identified for SimpleItem {
    fn identity(&self) -> &Identity {
        &self.id
    }
}

pub fn one() -> SimpleItem {
    SimpleItem::new("one", 1, "One is the loneliest number")
}

pub fn two() -> SimpleItem {
    SimpleItem::new("two", 2, "It takes two to tango")
}

pub fn three() -> SimpleItem {
    SimpleItem::new("three", 3, "Three can keep a secret if two of them are dead")
}

/// Rejected by the validator: no `charlie`.
pub fn simply_invalid() -> SimpleItem {
    SimpleItem::new("beast", 666, "")
}

/// An in-memory backend that counts the lookups reaching storage.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    reads: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackend for CountingStore {
    async fn insert_one(&self, document: BsonDocument, collection: &str) -> DocumentStoreResult<Bson> {
        self.inner.insert_one(document, collection).await
    }

    async fn find_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<Option<BsonDocument>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(filter, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        self.inner.find(query, collection).await
    }

    async fn count_documents(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.count_documents(filter, collection).await
    }

    async fn distinct(&self, field: &str, filter: &Expr, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.inner.distinct(field, filter, collection).await
    }

    async fn update_one(&self, filter: &Expr, update: &Update, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.inner.update_one(filter, update, collection).await
    }

    async fn replace_one(&self, filter: &Expr, replacement: BsonDocument, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.inner.replace_one(filter, replacement, collection).await
    }

    async fn delete_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.delete_one(filter, collection).await
    }

    async fn delete_many(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.delete_many(filter, collection).await
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        self.inner.collection_exists(name).await
    }

    async fn create_collection(&self, name: &str, validator: Option<&Validator>) -> DocumentStoreResult<()> {
        self.inner.create_collection(name, validator).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.inner.list_collections().await
    }

    async fn add_index(&self, collection: &str, index: &IndexDescription) -> DocumentStoreResult<()> {
        self.inner.add_index(collection, index).await
    }
}

/// A store with the `simple` collection defined.
pub async fn simple_store() -> DocumentStore<CountingStore> {
    init_tracing();

    let store = DocumentStore::new(CountingStore::default());
    store
        .define_collection(&SimpleItem::definition().unwrap())
        .await
        .unwrap();

    store
}

pub trait Labeled: Wrappable {
    fn key(&self) -> String;
    fn label(&self) -> String;
}

static LABELED: Lazy<TypeRegistry<dyn Labeled>> = Lazy::new(|| {
    let registry = TypeRegistry::<dyn Labeled>::new();
    registry.register::<TextValue>("text", |v| Arc::new(v)).unwrap();
    registry.register::<NumericValue>("numeric", |v| Arc::new(v)).unwrap();
    registry
});

impl Capability for dyn Labeled {
    fn registry() -> &'static TypeRegistry<Self> {
        &LABELED
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub text: String,
}

impl Labeled for TextValue {
    fn key(&self) -> String {
        format!("text:{}", self.text)
    }

    fn label(&self) -> String {
        self.text.clone()
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericValue {
    pub number: i64,
}

impl Labeled for NumericValue {
    fn key(&self) -> String {
        format!("numeric:{}", self.number)
    }

    fn label(&self) -> String {
        self.number.to_string()
    }
}

/// Implements the capability but is never registered.
#[derive(Debug, Serialize)]
pub struct Unlisted;

impl Labeled for Unlisted {
    fn key(&self) -> String {
        "unlisted".into()
    }

    fn label(&self) -> String {
        String::new()
    }
}

pub fn text(text: &str) -> Wrapper<dyn Labeled> {
    Wrapper::<dyn Labeled>::wrap(Arc::new(TextValue { text: text.to_string() }))
}

pub fn numeric(number: i64) -> Wrapper<dyn Labeled> {
    Wrapper::<dyn Labeled>::wrap(Arc::new(NumericValue { number }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WrappedItem {
    pub name: String,
    pub single: Wrapper<dyn Labeled>,
    #[serde(default)]
    pub array: Vec<Wrapper<dyn Labeled>>,
    #[serde(default)]
    pub map: BTreeMap<String, Wrapper<dyn Labeled>>,
}

impl Document for WrappedItem {
    fn collection_name() -> &'static str {
        "wrapped"
    }
}
