//! Records and their conversions.
//!
//! A record is a plain [`bson::Document`] owned by the store. This module names
//! the fields the store manages itself, and provides [`Record`], the mutable
//! view used while merging an update body into a fetched record.

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Field holding a record's unique identifier.
pub const ID_FIELD: &str = "_id";

/// Field holding a record's internal revision counter.
pub const REVISION_FIELD: &str = "__v";

/// Returns whether `field` is managed by the store and must never be assigned from a request.
pub fn is_protected(field: &str) -> bool {
    field == ID_FIELD || field == REVISION_FIELD
}

/// Parses an identifier as it appears in a request path.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidId`] unless `id` is a 24 digit hex ObjectId.
pub fn parse_id(id: &str) -> DocumentStoreResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| DocumentStoreError::InvalidId(id.to_string()))
}

/// Casts an identifier value, or an embedded record carrying one, to an ObjectId.
pub fn cast_id(value: &Bson) -> DocumentStoreResult<ObjectId> {
    match value {
        Bson::ObjectId(id) => Ok(*id),
        Bson::String(id) => parse_id(id),
        Bson::Document(document) => match document.get(ID_FIELD) {
            Some(id) => cast_id(id),
            None => Err(DocumentStoreError::InvalidId(value.to_string())),
        },
        other => Err(DocumentStoreError::InvalidId(other.to_string())),
    }
}

/// Reduces the value of a reference field to the identifiers it stands for.
///
/// Embedded records become their `_id`, hex strings become ObjectIds, arrays
/// are reduced element-wise and null stays null.
pub fn reduce_reference(value: Bson) -> DocumentStoreResult<Bson> {
    match value {
        Bson::Null => Ok(Bson::Null),
        Bson::Array(items) => items
            .into_iter()
            .map(reduce_reference)
            .collect::<DocumentStoreResult<Vec<_>>>()
            .map(Bson::Array),
        other => cast_id(&other).map(Bson::ObjectId),
    }
}

/// Converts a JSON request body into a BSON document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Serialization`] if a value has no BSON representation.
pub fn document_from_json(body: &Map<String, Value>) -> DocumentStoreResult<Document> {
    match serialize_to_bson(body)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::Serialization(format!(
            "expected a document, found {:?}",
            other.element_type()
        ))),
    }
}

/// A fetched record whose fields can be reassigned before it is saved again.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    document: Document,
}

impl Record {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Returns the record's identifier, if it has one.
    pub fn id(&self) -> Option<&Bson> {
        self.document.get(ID_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.document.get(field)
    }

    /// Assigns every field of `changes` onto this record, skipping `_id` and `__v`.
    ///
    /// Returns the names of the fields that were assigned.
    pub fn assign(&mut self, changes: Document) -> Vec<String> {
        let mut assigned = Vec::new();

        for (field, value) in changes {
            if is_protected(&field) {
                continue;
            }

            assigned.push(field.clone());
            self.document.insert(field, value);
        }

        assigned
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl From<Document> for Record {
    fn from(document: Document) -> Self {
        Record::new(document)
    }
}

/// Conversion helpers for records returned by a handler.
pub trait RecordExt {
    /// Deserializes the record into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not fit `T`.
    fn decode<T: DeserializeOwned>(&self) -> DocumentStoreResult<T>;

    /// Converts the record into a JSON value for a response body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> DocumentStoreResult<Value>;
}

impl RecordExt for Document {
    fn decode<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.clone()))?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn assign_skips_store_managed_fields() {
        let mut record = Record::new(doc! { "_id": 1, "__v": 0, "name": "Model 1" });

        let assigned = record.assign(doc! {
            "_id": "NEW ID",
            "__v": "NEW VERSION",
            "name": "Renamed",
            "col_4": [],
        });

        assert_eq!(assigned, vec!["name".to_string(), "col_4".to_string()]);
        assert_eq!(record.id(), Some(&Bson::Int32(1)));
        assert_eq!(record.get("__v"), Some(&Bson::Int32(0)));
        assert_eq!(record.get("name"), Some(&Bson::String("Renamed".into())));
        assert_eq!(record.get("col_4"), Some(&Bson::Array(vec![])));
    }

    #[test]
    fn references_reduce_to_object_ids() {
        let id = ObjectId::new();

        assert_eq!(reduce_reference(Bson::String(id.to_hex())).unwrap(), Bson::ObjectId(id));
        assert_eq!(
            reduce_reference(Bson::Document(doc! { "_id": id.to_hex(), "name": "Model 2" })).unwrap(),
            Bson::ObjectId(id)
        );
        assert_eq!(
            reduce_reference(Bson::Array(vec![Bson::String(id.to_hex()), Bson::Null])).unwrap(),
            Bson::Array(vec![Bson::ObjectId(id), Bson::Null])
        );
        assert_eq!(reduce_reference(Bson::Null).unwrap(), Bson::Null);
    }

    #[test]
    fn malformed_ids_are_invalid() {
        assert!(matches!(parse_id("NEW ID"), Err(DocumentStoreError::InvalidId(_))));
        assert!(matches!(cast_id(&Bson::Int32(1)), Err(DocumentStoreError::InvalidId(_))));
    }

    #[test]
    fn json_body_becomes_document() {
        let body = json!({ "name": "Model 4", "col_3": true, "col_4": ["x"] });
        let document = document_from_json(body.as_object().unwrap()).unwrap();

        assert_eq!(document.get_str("name").unwrap(), "Model 4");
        assert!(document.get_bool("col_3").unwrap());
        assert_eq!(document.get_array("col_4").unwrap().len(), 1);
    }

    #[test]
    fn decode_into_typed_value() {
        #[derive(Deserialize)]
        struct Row {
            name: String,
        }

        let row: Row = doc! { "name": "Model 2", "col_1": "M2 Col 1" }.decode().unwrap();

        assert_eq!(row.name, "Model 2");
    }

    #[test]
    fn json_view_renders_ids_as_extended_json() {
        let id = ObjectId::new();
        let value = doc! { "_id": id, "name": "Model 1", "col_3": true }.to_json().unwrap();

        assert_eq!(value["_id"], json!({ "$oid": id.to_hex() }));
        assert_eq!(value["name"], "Model 1");
        assert_eq!(value["col_3"], true);
    }
}
