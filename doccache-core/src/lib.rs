//! A typed, cache-coherent data-access layer over BSON document stores.
//!
//! This crate is the core of the doccache project and provides:
//!
//! - **Entity traits** ([`document`], [`identity`]) - Binding types to collections, cache keys, filters and expiry
//! - **Store backend abstraction** ([`backend`]) - Filter-based CRUD implemented by each storage backend
//! - **Filters and updates** ([`query`], [`update`]) - Backend-neutral filter expressions and field operators
//! - **Typed collections** ([`collection`]) - Decode-on-read access with distinct outcome errors
//! - **Cached collections** ([`cached`], [`config`]) - Read-through, write-invalidate caching of entities
//! - **Polymorphic fields** ([`wrapper`], [`registry`]) - Tagged encoding of `dyn Trait` fields
//! - **Collection definitions** ([`definition`]) - Validators and indexes applied on creation
//! - **Document store** ([`store`]) - Owns a backend and hands out collections
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use doccache::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! pub struct Simple {
//!     pub alpha: String,
//!     pub bravo: i32,
//!     #[serde(skip)]
//!     pub expiry: Expiry,
//! }
//!
//! impl Document for Simple {
//!     fn collection_name() -> &'static str {
//!         "simple"
//!     }
//! }
//!
//! impl Searchable for Simple {
//!     fn cache_key(&self) -> String {
//!         format!("{}-{}", self.alpha, self.bravo)
//!     }
//!
//!     fn filter(&self) -> Expr {
//!         Filter::eq("alpha", self.alpha.as_str()).and(Filter::eq("bravo", self.bravo))
//!     }
//! }
//!
//! impl Cacheable for Simple {
//!     fn expire_after(&mut self, after: Duration) {
//!         self.expiry.expire_after(after)
//!     }
//!
//!     fn expired(&self) -> bool {
//!         self.expiry.expired()
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doccache_core;

pub mod backend;
pub mod cached;
pub mod collection;
pub mod config;
pub mod definition;
pub mod document;
pub mod error;
pub mod identity;
pub mod query;
pub mod registry;
pub mod store;
pub mod update;
pub mod wrapper;
