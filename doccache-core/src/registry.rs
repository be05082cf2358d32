//! Runtime table of the concrete types that may fill a polymorphic field.
//!
//! A [`TypeRegistry<W>`] is scoped to one capability `W` (a `dyn Trait`): it maps stable
//! string names to the concrete types implementing that capability, in both directions.
//! Names are what gets persisted, so they must not change once data has been written.

use bson::{Bson, de::deserialize_from_bson};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::Arc,
};
use thiserror::Error;

use crate::wrapper::Wrappable;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0} is already registered")]
    AlreadyRegistered(String),
    #[error("type {0} is not registered")]
    Unregistered(String),
    #[error("no type is registered as {0}")]
    UnknownName(String),
    #[error("type registered as {name} is not a {capability}")]
    CapabilityMismatch {
        name: String,
        capability: &'static str,
    },
    #[error("make instance of type {name}: {detail}")]
    Decode {
        name: String,
        detail: String,
    },
}

type Maker<W: ?Sized> = Box<dyn Fn(Bson) -> Result<Arc<W>, bson::error::Error> + Send + Sync>;

struct Registration<W: ?Sized> {
    type_id: TypeId,
    make: Maker<W>,
}

struct Tables<W: ?Sized> {
    by_name: HashMap<String, Registration<W>>,
    by_type: HashMap<TypeId, String>,
}

/// Name/type table for capability `W`.
///
/// ```ignore
/// pub trait Labeled: Wrappable {
///     fn label(&self) -> String;
/// }
///
/// let registry = TypeRegistry::<dyn Labeled>::new();
/// registry.register::<TextValue>("text", |v| Arc::new(v))?;
/// ```
pub struct TypeRegistry<W: ?Sized> {
    tables: RwLock<Tables<W>>,
}

impl<W: ?Sized + Wrappable> TypeRegistry<W> {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                by_name: HashMap::new(),
                by_type: HashMap::new(),
            }),
        }
    }

    /// Registers `T` under `name`.
    ///
    /// `upcast` turns a decoded `T` into the capability; it is almost always `|v| Arc::new(v)`.
    pub fn register<T>(&self, name: &str, upcast: fn(T) -> Arc<W>) -> Result<(), RegistryError>
    where
        T: DeserializeOwned + 'static,
    {
        let type_id = TypeId::of::<T>();
        let mut tables = self.tables.write();

        if tables.by_name.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        if let Some(existing) = tables.by_type.get(&type_id) {
            return Err(RegistryError::AlreadyRegistered(format!(
                "{} (as {existing})",
                type_name::<T>()
            )));
        }

        tables.by_type.insert(type_id, name.to_string());
        tables.by_name.insert(
            name.to_string(),
            Registration {
                type_id,
                make: Box::new(move |data| Ok(upcast(deserialize_from_bson::<T>(data)?))),
            },
        );

        Ok(())
    }

    /// The name the concrete type of `value` was registered under.
    pub fn name_for(&self, value: &W) -> Result<String, RegistryError> {
        self.tables
            .read()
            .by_type
            .get(&Any::type_id(value.as_any()))
            .cloned()
            .ok_or_else(|| RegistryError::Unregistered(value.type_name().to_string()))
    }

    /// Builds an instance of the type registered as `name` from its encoded payload.
    pub fn make(&self, name: &str, data: Bson) -> Result<Arc<W>, RegistryError> {
        let tables = self.tables.read();
        let registration = tables
            .by_name
            .get(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;

        let item = (registration.make)(data).map_err(|err| RegistryError::Decode {
            name: name.to_string(),
            detail: err.to_string(),
        })?;

        if Any::type_id((*item).as_any()) != registration.type_id {
            return Err(RegistryError::CapabilityMismatch {
                name: name.to_string(),
                capability: type_name::<W>(),
            });
        }

        Ok(item)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().by_name.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.tables.read().by_name.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Forgets every registration.
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_name.clear();
        tables.by_type.clear();
    }
}

impl<W: ?Sized + Wrappable> Default for TypeRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: ?Sized + Wrappable> fmt::Debug for TypeRegistry<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("capability", &type_name::<W>())
            .field("names", &self.names())
            .finish()
    }
}
