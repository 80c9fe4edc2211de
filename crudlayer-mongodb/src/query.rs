//! Query translation from crudlayer filters and read controls to MongoDB syntax.
//!
//! Filters become BSON query documents; sort keys and projections become the
//! corresponding option documents.

use std::collections::HashMap;

use bson::{Bson, Document, doc};

use crudlayer_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, Projection, QueryVisitor, Sort, SortDirection},
    record::{ID_FIELD, parse_id},
};

/// Translates crudlayer filter expressions into MongoDB query documents.
///
/// Request values arrive as strings, so values compared against `_id` or a
/// reference field are cast to ObjectIds when they parse as one.
pub(crate) struct MongoQueryTranslator<'a> {
    references: &'a HashMap<String, String>,
}

impl<'a> MongoQueryTranslator<'a> {
    pub fn new(references: &'a HashMap<String, String>) -> Self {
        Self { references }
    }

    fn holds_id(&self, field: &str) -> bool {
        field == ID_FIELD || self.references.contains_key(field)
    }

    fn cast(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => parse_id(s).map(Bson::ObjectId).unwrap_or_else(|_| value.clone()),
            Bson::Array(items) => Bson::Array(items.iter().map(Self::cast).collect()),
            other => other.clone(),
        }
    }
}

impl<'a> QueryVisitor for MongoQueryTranslator<'a> {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = if self.holds_id(field) { Self::cast(value) } else { value.clone() };

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::AnyOf => match value {
                    Bson::Array(values) => doc! { "$in": values },
                    single => doc! { "$in": [single] },
                },
                FieldOp::Matches => match value {
                    Bson::String(pattern) => doc! { "$regex": pattern, "$options": "i" },
                    _ => return Err(DocumentStoreError::InvalidQuery(format!("pattern for {field} must be a string"))),
                },
            }
        })
    }
}

/// Builds a sort document, keys in precedence order.
pub(crate) fn sort_document(keys: &[Sort]) -> Option<Document> {
    if keys.is_empty() {
        return None;
    }

    Some(Document::from_iter(keys.iter().map(|key| {
        (
            key.field.clone(),
            Bson::Int32(match key.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }),
        )
    })))
}

/// Builds a projection document. MongoDB returns `_id` unless it is excluded.
pub(crate) fn projection_document(projection: &Projection) -> Document {
    match projection {
        Projection::Include { fields, id } => {
            let mut document = Document::from_iter(
                fields
                    .iter()
                    .map(|field| (field.clone(), Bson::Int32(1)))
            );

            if !id {
                document.insert(ID_FIELD, 0);
            }

            document
        }
        Projection::Exclude(fields) => Document::from_iter(
            fields
                .iter()
                .map(|field| (field.clone(), Bson::Int32(0)))
        ),
    }
}
