//! Translation of filter expressions and updates into MongoDB documents.

use bson::{doc, Bson, Document};

use doccache_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
    update::{Update, UpdateOp},
};

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub fn translate(expr: &Expr) -> Result<Document, DocumentStoreError> {
        MongoQueryTranslator.visit_expr(expr)
    }
}

/// Escapes regex metacharacters so a string matches literally.
fn literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

fn as_array(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        other => Bson::Array(vec![other.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // `$and` may not be empty; an empty conjunction matches everything
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": literal(s) },
                    // Equality against an array field matches any element
                    other => doc! { "$eq": other },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": literal(s) } },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", literal(s)) },
                    _ => return Err(DocumentStoreError::InvalidDocument("starts with requires a string value".to_string())),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", literal(s)) },
                    _ => return Err(DocumentStoreError::InvalidDocument("ends with requires a string value".to_string())),
                },
                FieldOp::AnyOf => doc! { "$in": as_array(value) },
                FieldOp::NoneOf => doc! { "$nin": as_array(value) },
            }
        })
    }
}

/// Groups update operators by kind: `{ "$set": {..}, "$unset": {..}, "$inc": {..} }`.
pub(crate) fn translate_update(update: &Update) -> Document {
    let mut set = Document::new();
    let mut unset = Document::new();
    let mut inc = Document::new();

    for op in update.ops() {
        match op {
            UpdateOp::Set(field, value) => {
                set.insert(field.clone(), value.clone());
            }
            UpdateOp::Unset(field) => {
                unset.insert(field.clone(), "");
            }
            UpdateOp::Inc(field, amount) => {
                inc.insert(field.clone(), amount.clone());
            }
        }
    }

    let mut translated = Document::new();
    for (operator, fields) in [("$set", set), ("$unset", unset), ("$inc", inc)] {
        if !fields.is_empty() {
            translated.insert(operator, fields);
        }
    }

    translated
}
