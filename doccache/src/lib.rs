//! Main doccache crate providing a unified interface for typed, cached document access.
//!
//! This crate is the primary entry point for users of doccache. It re-exports the core types
//! from the sub-crates and gives convenient access to the storage backends.
//!
//! # Features
//!
//! - **Typed collections** - Serde-backed entities with find, create, find-or-create, update and replace
//! - **Read-through caching** - Per-collection caches that hand out shared `Arc`s and evict on write
//! - **Polymorphic fields** - `dyn Trait` fields stored as `{ type, data }` through a type registry
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use doccache::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     store.define_collection(&SimpleItem::definition()?).await?;
//!
//!     let simple = store.cached_collection::<SimpleItem>(CacheConfig::default());
//!
//!     // Created on first use, then served from the cache
//!     let one = simple
//!         .find_or_create(&SimpleItem::new("one", 1, "One is the loneliest number"))
//!         .await?;
//!     let again = simple.find(&SimpleKey::new("one", 1)).await?;
//!     assert!(std::sync::Arc::ptr_eq(&one, &again));
//!
//!     // Writes go to storage and evict the cached copy
//!     simple
//!         .update(&SimpleKey::new("one", 1), &Update::new().set("charlie", "One more time"))
//!         .await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use doccache_core::{
    backend, cached, collection, config, definition, document, error, identity, query, registry,
    store, update, wrapper,
};

// Re-export BSON types and the trait macro for custom backends
pub use async_trait::async_trait;
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use doccache_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use doccache_mongodb::{MongoDbStore, MongoDbStoreBuilder, DEFAULT_URI};
}
