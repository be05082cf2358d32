//! MongoDB backend implementation for doccache.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Filters and
//! updates are translated into native query documents, validators and unique indexes are
//! created on the server, and the server's duplicate-key and validation errors come back as
//! `Duplicate` and `Validation`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! doccache = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use doccache::{backend::StoreBackendBuilder, mongodb::{MongoDbStore, DEFAULT_URI}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder(DEFAULT_URI, "my_database")
//!         .app_name("my-service")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doccache_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder, DEFAULT_URI};
