use std::collections::HashMap;

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOneOptions, FindOptions as MongoFindOptions},
};
use tracing::{debug, trace};

use crudlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::{FindOptions, Model, ModelBuilder},
    query::{Expr, QueryVisitor},
    record::{ID_FIELD, REVISION_FIELD, cast_id, parse_id, reduce_reference},
};

use crate::query::{MongoQueryTranslator, projection_document, sort_document};

fn backend_error(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

#[derive(Debug, Clone)]
pub struct MongoModel {
    client: Client,
    database: String,
    collection: String,
    /// field -> referenced collection
    references: HashMap<String, String>,
}

impl MongoModel {
    pub fn new(client: Client, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            collection: collection.into(),
            references: HashMap::new(),
        }
    }

    pub fn builder(dsn: &str, database: &str, collection: &str) -> MongoModelBuilder {
        MongoModelBuilder::new(dsn, database, collection)
    }

    /// Declares `field` as a reference to records of `collection`.
    pub fn reference(mut self, field: impl Into<String>, collection: impl Into<String>) -> Self {
        self.references.insert(field.into(), collection.into());
        self
    }

    fn get_collection(&self, name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(name)
    }

    fn translate(&self, filter: Option<&Expr>) -> DocumentStoreResult<Document> {
        match filter {
            Some(expr) => MongoQueryTranslator::new(&self.references).visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    fn normalize(&self, id: ObjectId, fields: Document) -> DocumentStoreResult<Document> {
        let mut record = doc! { ID_FIELD: id };

        for (key, value) in fields {
            if key == ID_FIELD {
                continue;
            }

            let value = if self.references.contains_key(&key) {
                reduce_reference(value)?
            } else {
                value
            };

            record.insert(key, value);
        }

        Ok(record)
    }

    /// Replaces reference identifiers with the records they refer to.
    ///
    /// One query per populated field; dangling identifiers become null.
    async fn populate(&self, records: &mut [Document], options: &FindOptions) -> DocumentStoreResult<()> {
        for field in options.populated_fields() {
            let Some(target) = self.references.get(field) else {
                trace!(target: "crudlayer::mongodb", field, collection = %self.collection, "skipping populate of non-reference field");
                continue;
            };

            let mut ids = Vec::new();
            for record in records.iter() {
                collect_ids(record.get(field), &mut ids);
            }

            if ids.is_empty() {
                continue;
            }

            let related = self.get_collection(target)
                .find(doc! { ID_FIELD: { "$in": ids } })
                .await
                .map_err(backend_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error)?
                .into_iter()
                .filter_map(|record| record.get_object_id(ID_FIELD).ok().map(|id| (id, record)))
                .collect::<HashMap<_, _>>();

            for record in records.iter_mut() {
                if let Some(value) = record.get_mut(field) {
                    *value = resolve(&related, value);
                }
            }
        }

        Ok(())
    }
}

fn collect_ids(value: Option<&Bson>, ids: &mut Vec<ObjectId>) {
    match value {
        Some(Bson::ObjectId(id)) => ids.push(*id),
        Some(Bson::Array(items)) => items
            .iter()
            .for_each(|item| collect_ids(Some(item), ids)),
        _ => {}
    }
}

fn resolve(related: &HashMap<ObjectId, Document>, value: &Bson) -> Bson {
    match value {
        Bson::ObjectId(id) => related
            .get(id)
            .cloned()
            .map(Bson::Document)
            .unwrap_or(Bson::Null),
        Bson::Array(items) => Bson::Array(items.iter().map(|item| resolve(related, item)).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl Model for MongoModel {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn find_by_id(&self, id: &str, options: &FindOptions) -> DocumentStoreResult<Option<Document>> {
        let id = parse_id(id)?;

        let mut find_options = FindOneOptions::default();
        find_options.projection = options.parsed_projection()?.as_ref().map(projection_document);

        let Some(record) = self.get_collection(&self.collection)
            .find_one(doc! { ID_FIELD: id })
            .with_options(find_options)
            .await
            .map_err(backend_error)?
        else {
            return Ok(None);
        };

        let mut records = [record];
        self.populate(&mut records, options).await?;

        let [record] = records;
        Ok(Some(record))
    }

    async fn find(&self, filter: Option<&Expr>, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
        let query = self.translate(filter)?;

        let mut find_options = MongoFindOptions::default();
        find_options.projection = options.parsed_projection()?.as_ref().map(projection_document);
        find_options.sort = sort_document(&options.sort_keys());

        if options.page.offset > 0 {
            find_options.skip = Some(options.page.offset);
        }
        if options.page.is_limited() {
            find_options.limit = Some(i64::try_from(options.page.limit).unwrap_or(i64::MAX));
        }

        trace!(target: "crudlayer::mongodb", collection = %self.collection, %query, "find");

        let mut records = self.get_collection(&self.collection)
            .find(query)
            .with_options(find_options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?;

        self.populate(&mut records, options).await?;

        Ok(records)
    }

    async fn count_documents(&self, filter: Option<&Expr>) -> DocumentStoreResult<u64> {
        self.get_collection(&self.collection)
            .count_documents(self.translate(filter)?)
            .await
            .map_err(backend_error)
    }

    async fn create(&self, fields: Document) -> DocumentStoreResult<Document> {
        let id = match fields.get(ID_FIELD) {
            Some(id) => cast_id(id)?,
            None => ObjectId::new(),
        };

        let mut record = self.normalize(id, fields)?;
        record.insert(REVISION_FIELD, 0_i32);

        self.get_collection(&self.collection)
            .insert_one(&record)
            .await
            .map_err(backend_error)?;

        debug!(target: "crudlayer::mongodb", %id, collection = %self.collection, "created record");

        Ok(record)
    }

    async fn save(&self, record: Document) -> DocumentStoreResult<Document> {
        let id = match record.get(ID_FIELD) {
            Some(id) => cast_id(id)?,
            None => return Err(DocumentStoreError::InvalidDocument(format!("record has no {ID_FIELD}"))),
        };

        let replacement = self.normalize(id, record)?;

        let result = self.get_collection(&self.collection)
            .replace_one(doc! { ID_FIELD: id }, &replacement)
            .await
            .map_err(backend_error)?;

        if result.matched_count == 0 {
            return Err(DocumentStoreError::DocumentNotFound(id.to_hex(), self.collection.clone()));
        }

        debug!(target: "crudlayer::mongodb", %id, collection = %self.collection, "saved record");

        Ok(replacement)
    }

    async fn find_by_id_and_remove(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        let id = parse_id(id)?;

        let removed = self.get_collection(&self.collection)
            .find_one_and_delete(doc! { ID_FIELD: id })
            .await
            .map_err(backend_error)?;

        debug!(target: "crudlayer::mongodb", %id, collection = %self.collection, removed = removed.is_some(), "remove record");

        Ok(removed)
    }
}

pub struct MongoModelBuilder {
    dsn: String,
    database: String,
    collection: String,
    references: HashMap<String, String>,
}

impl MongoModelBuilder {
    pub fn new(dsn: &str, database: &str, collection: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            references: HashMap::new(),
        }
    }

    pub fn reference(mut self, field: impl Into<String>, collection: impl Into<String>) -> Self {
        self.references.insert(field.into(), collection.into());
        self
    }
}

#[async_trait]
impl ModelBuilder for MongoModelBuilder {
    type Model = MongoModel;

    async fn build(self) -> DocumentStoreResult<Self::Model> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        Ok(MongoModel {
            client,
            database: self.database,
            collection: self.collection,
            references: self.references,
        })
    }
}
