//! Tagged encoding for fields typed by a capability (`dyn Trait`) rather than a concrete type.
//!
//! A [`Wrapper<W>`] holds one value implementing capability `W`. It is stored as
//!
//! ```text
//! { "type": <registered name>, "data": <the value's own encoding> }
//! ```
//!
//! and decoding looks the name up in the capability's [`TypeRegistry`] to rebuild the exact
//! concrete type that was written.
//!
//! # Declaring a capability
//!
//! ```ignore
//! use doccache::{registry::TypeRegistry, wrapper::{Capability, Wrappable, Wrapper}};
//! use once_cell::sync::Lazy;
//!
//! pub trait Labeled: Wrappable {
//!     fn label(&self) -> String;
//! }
//!
//! static LABELED: Lazy<TypeRegistry<dyn Labeled>> = Lazy::new(TypeRegistry::new);
//!
//! impl Capability for dyn Labeled {
//!     fn registry() -> &'static TypeRegistry<Self> {
//!         &LABELED
//!     }
//! }
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Item {
//!     single: Wrapper<dyn Labeled>,
//!     array: Vec<Wrapper<dyn Labeled>>,
//! }
//! ```

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};
use std::{
    any::{Any, type_name},
    fmt,
    ops::Deref,
    sync::Arc,
};
use thiserror::Error;

use crate::registry::{RegistryError, TypeRegistry};

/// Object-safe base of every capability trait.
///
/// Implemented for every `Serialize + Debug + Send + Sync + 'static` type, so a capability
/// only has to name it as a supertrait.
pub trait Wrappable: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Rust type name of the concrete value, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Encodes the concrete value.
    fn to_bson(&self) -> Result<Bson, bson::error::Error>;
}

impl<T> Wrappable for T
where
    T: Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn to_bson(&self) -> Result<Bson, bson::error::Error> {
        serialize_to_bson(self)
    }
}

/// A capability with a process-wide registry, used by the serde impls of [`Wrapper`].
pub trait Capability: Wrappable {
    fn registry() -> &'static TypeRegistry<Self>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WrapperError {
    #[error("type {0} is not registered")]
    UnregisteredType(String),
    #[error("unknown type {0}")]
    UnknownType(String),
    #[error("type {name} is not a {capability}")]
    CapabilityMismatch {
        name: String,
        capability: &'static str,
    },
    #[error("empty type field")]
    MissingTypeField,
    #[error("encode wrapped value: {0}")]
    Encode(String),
    #[error("decode wrapped value: {0}")]
    Decode(String),
    #[error("unpack wrapper record: {0}")]
    Malformed(String),
    #[error("{0}")]
    Registration(String),
}

impl From<RegistryError> for WrapperError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unregistered(type_name) => WrapperError::UnregisteredType(type_name),
            RegistryError::UnknownName(name) => WrapperError::UnknownType(name),
            RegistryError::CapabilityMismatch { name, capability } => {
                WrapperError::CapabilityMismatch { name, capability }
            }
            RegistryError::Decode { .. } => WrapperError::Decode(err.to_string()),
            RegistryError::AlreadyRegistered(_) => WrapperError::Registration(err.to_string()),
        }
    }
}

/// The stored form of a wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packed {
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub data: Bson,
}

/// Holds one value implementing capability `W`.
pub struct Wrapper<W: ?Sized> {
    item: Arc<W>,
}

impl<W: ?Sized + Wrappable> Wrapper<W> {
    /// Wraps a value; `Wrapper::<dyn Labeled>::wrap(Arc::new(text))`.
    pub fn wrap(item: Arc<W>) -> Self {
        Self { item }
    }

    pub fn get(&self) -> &W {
        &self.item
    }

    pub fn set(&mut self, item: Arc<W>) {
        self.item = item;
    }

    pub fn into_inner(self) -> Arc<W> {
        self.item
    }

    /// The held value as its concrete type, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.get().as_any().downcast_ref::<T>()
    }

    pub fn pack_with(&self, registry: &TypeRegistry<W>) -> Result<Packed, WrapperError> {
        let type_name = registry.name_for(&self.item)?;
        let data = self
            .get()
            .to_bson()
            .map_err(|err| WrapperError::Encode(format!("{type_name}: {err}")))?;

        Ok(Packed { type_name, data })
    }

    pub fn unpack_with(packed: Packed, registry: &TypeRegistry<W>) -> Result<Self, WrapperError> {
        if packed.type_name.is_empty() {
            return Err(WrapperError::MissingTypeField);
        }

        Ok(Self::wrap(registry.make(&packed.type_name, packed.data)?))
    }

    pub fn encode_with(&self, registry: &TypeRegistry<W>) -> Result<Bson, WrapperError> {
        serialize_to_bson(&self.pack_with(registry)?)
            .map_err(|err| WrapperError::Encode(err.to_string()))
    }

    pub fn decode_with(bson: Bson, registry: &TypeRegistry<W>) -> Result<Self, WrapperError> {
        let packed = deserialize_from_bson::<Packed>(bson)
            .map_err(|err| WrapperError::Malformed(err.to_string()))?;

        Self::unpack_with(packed, registry)
    }
}

impl<W: ?Sized + Capability> Wrapper<W> {
    pub fn pack(&self) -> Result<Packed, WrapperError> {
        self.pack_with(W::registry())
    }

    pub fn unpack(packed: Packed) -> Result<Self, WrapperError> {
        Self::unpack_with(packed, W::registry())
    }

    pub fn encode(&self) -> Result<Bson, WrapperError> {
        self.encode_with(W::registry())
    }

    pub fn decode(bson: Bson) -> Result<Self, WrapperError> {
        Self::decode_with(bson, W::registry())
    }
}

impl<W: ?Sized> Clone for Wrapper<W> {
    fn clone(&self) -> Self {
        Self { item: Arc::clone(&self.item) }
    }
}

impl<W: ?Sized> Deref for Wrapper<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.item
    }
}

impl<W: ?Sized> From<Arc<W>> for Wrapper<W> {
    fn from(item: Arc<W>) -> Self {
        Self { item }
    }
}

impl<W: ?Sized + Wrappable> fmt::Debug for Wrapper<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Wrapper").field(&&*self.item).finish()
    }
}

/// Same concrete type and same encoding.
impl<W: ?Sized + Wrappable> PartialEq for Wrapper<W> {
    fn eq(&self, other: &Self) -> bool {
        let (left, right) = (self.get(), other.get());
        if Any::type_id(left.as_any()) != Any::type_id(right.as_any()) {
            return false;
        }

        match (left.to_bson(), right.to_bson()) {
            (Ok(left), Ok(right)) => left == right,
            _ => false,
        }
    }
}

impl<W: ?Sized + Capability> Serialize for Wrapper<W> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.pack()
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de, W: ?Sized + Capability> Deserialize<'de> for Wrapper<W> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::unpack(Packed::deserialize(deserializer)?).map_err(<D::Error as de::Error>::custom)
    }
}
