//! In-memory document storage backend for doccache.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Server-like outcomes** - Validators and unique indexes reject writes as `Validation` and `Duplicate`
//! - **Full filter support** - Filtering, sorting, paging, distinct values and field updates
//!
//! # Quick Start
//!
//! ```ignore
//! use doccache::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let simple = store.cached_collection::<SimpleItem>(CacheConfig::default());
//!
//!     let item = simple
//!         .find_or_create(&SimpleItem::new("one", 1, "One is the loneliest number"))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doccache_memory;

pub mod evaluator;
pub mod store;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
