use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
    Client, Collection as MongoCollection, IndexModel,
};
use std::time::Duration;
use tracing::{debug, info};

use doccache_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    definition::{IndexDescription, Validator},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
    update::{Update, UpdateOutcome},
};

use crate::query::{translate_update, MongoQueryTranslator};

/// Connection string used when none is configured.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

const DUPLICATE_KEY: i32 = 11000;
const DOCUMENT_VALIDATION_FAILURE: i32 = 121;

fn server_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => Some(failure.code),
        ErrorKind::Command(failure) => Some(failure.code),
        _ => None,
    }
}

/// Maps driver errors onto the outcome variants callers branch on.
fn classify(collection: &str, err: MongoError) -> DocumentStoreError {
    match server_code(&err) {
        Some(DUPLICATE_KEY) => DocumentStoreError::Duplicate {
            collection: collection.to_string(),
            detail: err.to_string(),
        },
        Some(DOCUMENT_VALIDATION_FAILURE) => DocumentStoreError::Validation {
            collection: collection.to_string(),
            detail: err.to_string(),
        },
        _ => DocumentStoreError::Backend(err.to_string()),
    }
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let result = self
            .get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| classify(collection, e))?;

        Ok(result.inserted_id)
    }

    async fn find_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(|e| classify(collection, e))
    }

    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        let filter = match &query.filter {
            Some(expr) => MongoQueryTranslator::translate(expr)?,
            None => doc! {},
        };

        let cursor = self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| classify(collection, e))?;

        Ok(cursor
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
            .boxed())
    }

    async fn count_documents(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(|e| classify(collection, e))
    }

    async fn distinct(&self, field: &str, filter: &Expr, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.get_collection(collection)
            .distinct(field, MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(|e| classify(collection, e))
    }

    async fn update_one(&self, filter: &Expr, update: &Update, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_one(MongoQueryTranslator::translate(filter)?, translate_update(update))
            .await
            .map_err(|e| classify(collection, e))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: u64::from(result.upserted_id.is_some()),
        })
    }

    async fn replace_one(&self, filter: &Expr, replacement: Document, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .replace_one(MongoQueryTranslator::translate(filter)?, replacement)
            .await
            .map_err(|e| classify(collection, e))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: u64::from(result.upserted_id.is_some()),
        })
    }

    async fn delete_one(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(|e| classify(collection, e))?
            .deleted_count)
    }

    async fn delete_many(&self, filter: &Expr, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(|e| classify(collection, e))?
            .deleted_count)
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(self.list_collections().await?.iter().any(|existing| existing == name))
    }

    async fn create_collection(&self, name: &str, validator: Option<&Validator>) -> DocumentStoreResult<()> {
        let database = self.client.database(&self.database);

        let created = match validator {
            Some(validator) => database
                .create_collection(name)
                .validator(validator.to_document()?)
                .await,
            None => database.create_collection(name).await,
        };
        created.map_err(|e| classify(name, e))?;

        debug!(collection = name, validated = validator.is_some(), "created collection");

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| classify(name, e))
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn add_index(&self, collection: &str, index: &IndexDescription) -> DocumentStoreResult<()> {
        let mut keys = Document::new();
        for key in &index.keys {
            keys.insert(key.clone(), 1);
        }

        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(keys)
                    .options(IndexOptions::builder().unique(index.unique).build())
                    .build(),
            )
            .await
            .map_err(|e| classify(collection, e))?;

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`]: parses the connection string, applies timeouts, then pings
/// the server before handing out a store.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
    connect_timeout: Duration,
    server_selection_timeout: Duration,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
            connect_timeout: Duration::from_secs(10),
            server_selection_timeout: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long an operation (the initial ping included) waits for a usable server.
    #[must_use]
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }
}

impl Default for MongoDbStoreBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_URI, "doccache")
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.server_selection_timeout);
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.database, "connected to MongoDB");

        Ok(MongoDbStore::new(client, self.database))
    }
}
