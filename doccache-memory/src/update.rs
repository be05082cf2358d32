//! Applies field operators to in-memory documents.

use bson::{Bson, Document as BsonDocument};

use doccache_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    update::{Update, UpdateOp},
};

/// Applies every operator of `update` to `document`, in order.
///
/// Dotted paths create intermediate documents as needed. `_id` cannot be changed.
pub(crate) fn apply(document: &mut BsonDocument, update: &Update) -> DocumentStoreResult<()> {
    for op in update.ops() {
        if op.field() == "_id" {
            return Err(DocumentStoreError::InvalidDocument(
                "the _id field is immutable".to_string(),
            ));
        }

        let (parent, leaf) = parent_mut(document, op.field())?;

        match op {
            UpdateOp::Set(_, value) => {
                parent.insert(leaf, value.clone());
            }
            UpdateOp::Unset(_) => {
                parent.remove(leaf);
            }
            UpdateOp::Inc(field, amount) => {
                let current = parent.get(leaf).cloned().unwrap_or(Bson::Int32(0));
                let sum = add(field, &current, amount)?;

                parent.insert(leaf, sum);
            }
        }
    }

    Ok(())
}

fn parent_mut<'a, 'p>(
    document: &'a mut BsonDocument,
    path: &'p str,
) -> DocumentStoreResult<(&'a mut BsonDocument, &'p str)> {
    let Some((head, leaf)) = path.rsplit_once('.') else {
        return Ok((document, path));
    };

    let mut current = document;
    for segment in head.split('.') {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Bson::Document(BsonDocument::new()));

        current = match next {
            Bson::Document(inner) => inner,
            _ => {
                return Err(DocumentStoreError::UnexpectedType {
                    field: path.to_string(),
                    expected: "a document path",
                })
            }
        };
    }

    Ok((current, leaf))
}

/// Numeric addition with the widening rules of the server: int32 overflows into int64, and any
/// double makes the result a double. Overflowing an int64 is an error.
fn add(field: &str, current: &Bson, amount: &Bson) -> DocumentStoreResult<Bson> {
    if let (Bson::Int32(a), Bson::Int32(b)) = (current, amount) {
        return Ok(a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b))));
    }

    if let (Some(a), Some(b)) = (as_i64(current), as_i64(amount)) {
        return a.checked_add(b).map(Bson::Int64).ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!("integer overflow incrementing {field}"))
        });
    }

    match (as_f64(current), as_f64(amount)) {
        (Some(a), Some(b)) => Ok(Bson::Double(a + b)),
        _ => Err(DocumentStoreError::UnexpectedType {
            field: field.to_string(),
            expected: "numeric",
        }),
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}
