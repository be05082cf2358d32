//! Composable building blocks for entities: a store-assigned identity and expiry state.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::query::{Expr, Filter};

/// A store-assigned `_id`, unset until the document has been written and read back.
///
/// Embed it as a named field:
///
/// ```ignore
/// #[serde(rename = "_id", default, skip_serializing_if = "Identity::is_unset")]
/// pub id: Identity,
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Option<ObjectId>);

impl Identity {
    pub fn new(id: ObjectId) -> Self {
        Identity(Some(id))
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }

    /// A filter selecting the document with this identity, if it has one.
    pub fn filter(&self) -> Option<Expr> {
        self.0.map(id_filter)
    }
}

impl From<ObjectId> for Identity {
    fn from(id: ObjectId) -> Self {
        Identity::new(id)
    }
}

/// Types that carry an [`Identity`].
pub trait Identified {
    fn identity(&self) -> &Identity;

    fn id(&self) -> Option<ObjectId> {
        self.identity().id()
    }

    fn id_filter(&self) -> Option<Expr> {
        self.identity().filter()
    }
}

/// A filter selecting the document whose `_id` is `id`.
pub fn id_filter(id: ObjectId) -> Expr {
    Filter::eq("_id", id)
}

/// In-memory expiry state for cached entities.
///
/// The default value is already expired, so a value that never passed through a cache is
/// never mistaken for a fresh one. Keep it out of the stored form with `#[serde(skip)]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiry {
    expires_at: Option<Instant>,
}

impl Expiry {
    pub fn expire_after(&mut self, after: Duration) {
        self.expires_at = Instant::now().checked_add(after);
    }

    pub fn expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => true,
        }
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc, de::deserialize_from_document, ser::serialize_to_document};

    #[derive(Debug, Serialize, Deserialize)]
    struct Keyed {
        #[serde(rename = "_id", default, skip_serializing_if = "Identity::is_unset")]
        id: Identity,
        alpha: String,
    }

    impl Identified for Keyed {
        fn identity(&self) -> &Identity {
            &self.id
        }
    }

    #[test]
    fn unset_identity_is_not_written() {
        let keyed = Keyed { id: Identity::default(), alpha: "one".into() };
        let stored = serialize_to_document(&keyed).unwrap();

        assert!(!stored.contains_key("_id"));
        assert!(keyed.id_filter().is_none());
    }

    #[test]
    fn identity_round_trips_through_id_field() {
        let oid = ObjectId::new();
        let keyed: Keyed = deserialize_from_document(doc! { "_id": oid, "alpha": "one" }).unwrap();

        assert_eq!(keyed.id(), Some(oid));
        assert_eq!(serialize_to_document(&keyed).unwrap().get("_id"), Some(&Bson::ObjectId(oid)));
        assert_eq!(keyed.id_filter(), Some(Filter::eq("_id", oid)));
    }

    #[test]
    fn expiry_defaults_to_expired() {
        let mut expiry = Expiry::default();
        assert!(expiry.expired());
        assert!(expiry.expires_at().is_none());

        expiry.expire_after(Duration::from_secs(60));
        assert!(!expiry.expired());

        expiry.expire_after(Duration::ZERO);
        assert!(expiry.expired());
    }
}
