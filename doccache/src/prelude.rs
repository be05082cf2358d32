//! Convenient re-exports of commonly used types from doccache.
//!
//! ```ignore
//! use doccache::prelude::*;
//! ```

pub use doccache_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    cached::CachedCollection,
    collection::TypedCollection,
    config::CacheConfig,
    definition::{BsonKind, CollectionDefinition, IndexDescription, Validator},
    document::{Cacheable, Document, DocumentExt, Searchable},
    error::{DocumentStoreError, DocumentStoreResult},
    identity::{Expiry, Identified, Identity},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    registry::{RegistryError, TypeRegistry},
    store::DocumentStore,
    update::{Update, UpdateOutcome},
    wrapper::{Capability, Packed, Wrappable, Wrapper, WrapperError},
};
