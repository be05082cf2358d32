//! Collection definitions: validators and indexes applied when a collection is first created.
//!
//! Validators use the subset of MongoDB's `$jsonSchema` that document layouts actually need:
//! a top-level `bsonType`, a `required` list and per-property `bsonType`s, nested as deep as
//! the documents are. The same definition drives the MongoDB backend (sent verbatim as the
//! collection validator) and the in-memory backend (checked on every write).
//!
//! ```ignore
//! use doccache::definition::{CollectionDefinition, IndexDescription, Validator};
//!
//! let definition = CollectionDefinition::new("simple")
//!     .validator(Validator::from_json(SIMPLE_VALIDATOR_JSON)?)
//!     .index(IndexDescription::new(true, ["alpha", "bravo"]));
//!
//! store.define_collection(&definition).await?;
//! ```

use bson::{Bson, Document as BsonDocument, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{document::Document, error::DocumentStoreResult};

/// BSON type names accepted by `bsonType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonKind {
    Object,
    String,
    Int,
    Long,
    Double,
    Decimal,
    /// Any numeric type.
    Number,
    Bool,
    Array,
    ObjectId,
    Date,
    Null,
}

impl BsonKind {
    pub fn matches(&self, value: &Bson) -> bool {
        match (self, value) {
            (BsonKind::Object, Bson::Document(_)) => true,
            (BsonKind::String, Bson::String(_)) => true,
            (BsonKind::Int, Bson::Int32(_)) => true,
            (BsonKind::Long, Bson::Int64(_)) => true,
            (BsonKind::Double, Bson::Double(_)) => true,
            (BsonKind::Decimal, Bson::Decimal128(_)) => true,
            (
                BsonKind::Number,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_),
            ) => true,
            (BsonKind::Bool, Bson::Boolean(_)) => true,
            (BsonKind::Array, Bson::Array(_)) => true,
            (BsonKind::ObjectId, Bson::ObjectId(_)) => true,
            (BsonKind::Date, Bson::DateTime(_)) => true,
            (BsonKind::Null, Bson::Null) => true,
            _ => false,
        }
    }
}

/// One level of a `$jsonSchema`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bson_type: Option<BsonKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
}

impl Schema {
    pub fn of(kind: BsonKind) -> Self {
        Schema { bson_type: Some(kind), ..Schema::default() }
    }

    fn check(&self, path: &str, value: &Bson) -> Result<(), String> {
        if let Some(kind) = self.bson_type {
            if !kind.matches(value) {
                return Err(format!("{path} is not of bsonType {kind:?}"));
            }
        }

        if let Bson::Document(document) = value {
            self.check_fields(path, document)?;
        }

        Ok(())
    }

    fn check_fields(&self, path: &str, document: &BsonDocument) -> Result<(), String> {
        let prefixed = |field: &str| {
            if path.is_empty() {
                field.to_string()
            } else {
                format!("{path}.{field}")
            }
        };

        for field in &self.required {
            if !document.contains_key(field) {
                return Err(format!("missing required field {}", prefixed(field)));
            }
        }

        for (field, schema) in &self.properties {
            if let Some(value) = document.get(field) {
                schema.check(&prefixed(field), value)?;
            }
        }

        Ok(())
    }
}

/// A collection validator, serialized as `{ "$jsonSchema": { ... } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    #[serde(rename = "$jsonSchema")]
    pub schema: Schema,
}

impl Validator {
    /// An object validator with no constraints yet.
    pub fn new() -> Self {
        Validator { schema: Schema::of(BsonKind::Object) }
    }

    /// Parses a validator from its JSON form.
    pub fn from_json(json: &str) -> DocumentStoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a validator from a BSON document such as one returned by a server.
    pub fn from_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    pub fn to_document(&self) -> DocumentStoreResult<BsonDocument> {
        Ok(serialize_to_document(self)?)
    }

    /// Adds a field that must be present and of the given type.
    #[must_use]
    pub fn required(mut self, field: impl Into<String>, kind: BsonKind) -> Self {
        let field = field.into();
        self.schema.required.push(field.clone());
        self.schema.properties.insert(field, Schema::of(kind));
        self
    }

    /// Adds a field that must be of the given type when present.
    #[must_use]
    pub fn optional(mut self, field: impl Into<String>, kind: BsonKind) -> Self {
        self.schema.properties.insert(field.into(), Schema::of(kind));
        self
    }

    /// Checks a document, returning a description of the first violation.
    pub fn validate(&self, document: &BsonDocument) -> Result<(), String> {
        if let Some(kind) = self.schema.bson_type {
            if kind != BsonKind::Object {
                return Err(format!("documents can never match top-level bsonType {kind:?}"));
            }
        }

        self.schema.check_fields("", document)
    }
}

/// An index over one or more ascending keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub keys: Vec<String>,
    pub unique: bool,
}

impl IndexDescription {
    pub fn new<I, S>(unique: bool, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            unique,
        }
    }

    /// The server-style default name, e.g. `alpha_1_bravo_1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|key| format!("{key}_1"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Everything needed to create a collection the first time it is used.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDefinition {
    pub name: String,
    pub validator: Option<Validator>,
    pub indexes: Vec<IndexDescription>,
}

impl CollectionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            validator: None,
            indexes: Vec::new(),
        }
    }

    /// A definition named after the document type's collection.
    pub fn for_document<D: Document>() -> Self {
        Self::new(D::collection_name())
    }

    #[must_use]
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexDescription) -> Self {
        self.indexes.push(index);
        self
    }
}
