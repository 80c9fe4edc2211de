//! In-memory storage implementation for CRUD models.
//!
//! Records live in insertion-ordered maps keyed by their ObjectId, one map per
//! collection, behind an async-aware read-write lock. Every [`InMemoryModel`]
//! created from the same [`InMemoryStore`] shares that state, which is what
//! lets one model populate references from another collection.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use indexmap::IndexMap;
use mea::rwlock::RwLock;
use tracing::{debug, trace};

use crudlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::{FindOptions, Model},
    query::{Expr, Projection},
    record::{ID_FIELD, REVISION_FIELD, cast_id, parse_id, reduce_reference},
};

use crate::evaluator::{DocumentEvaluator, sort_documents};

type CollectionMap = IndexMap<ObjectId, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones and the models they hand out all see the same records.
///
/// # Example
///
/// ```ignore
/// use crudlayer_memory::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// let models = store
///     .model("models")
///     .reference("related_model", "models");
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> (record id -> record)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Returns a model bound to `collection`.
    ///
    /// The collection comes into existence with its first record.
    pub fn model(&self, collection: impl Into<String>) -> InMemoryModel {
        InMemoryModel {
            store: self.clone(),
            collection: collection.into(),
            references: HashMap::new(),
        }
    }

    /// Lists the collections holding at least one record.
    pub async fn list_collections(&self) -> Vec<String> {
        let store = self.store.read().await;
        let mut names = store
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}

/// A [`Model`] over one collection of an [`InMemoryStore`].
#[derive(Clone, Debug)]
pub struct InMemoryModel {
    store: InMemoryStore,
    collection: String,
    /// field -> referenced collection
    references: HashMap<String, String>,
}

impl InMemoryModel {
    /// Declares `field` as a reference to records of `collection`.
    ///
    /// Reference fields store identifiers and can be populated on read.
    pub fn reference(mut self, field: impl Into<String>, collection: impl Into<String>) -> Self {
        self.references.insert(field.into(), collection.into());
        self
    }

    /// Copies `fields` into a storable record with `_id` first.
    ///
    /// Store-managed fields in `fields` are dropped; the caller sets them.
    fn normalize(&self, id: ObjectId, fields: Document) -> DocumentStoreResult<Document> {
        let mut record = Document::new();
        record.insert(ID_FIELD, id);

        for (key, value) in fields {
            if key == ID_FIELD || key == REVISION_FIELD {
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

    /// Applies projection then population to a record read from `store`.
    fn present(
        &self,
        store: &StoreMap,
        record: Document,
        projection: Option<&Projection>,
        options: &FindOptions,
    ) -> Document {
        let mut record = match projection {
            Some(projection) => record
                .into_iter()
                .filter(|(key, _)| projection.keeps(key))
                .collect(),
            None => record,
        };

        for field in options.populated_fields() {
            let Some(target) = self.references.get(field) else {
                trace!(target: "crudlayer::memory", field, collection = %self.collection, "skipping populate of non-reference field");
                continue;
            };

            if let Some(value) = record.get_mut(field) {
                *value = Self::resolve(store.get(target), value);
            }
        }

        record
    }

    /// Replaces identifiers with the records they refer to; dangling ones become null.
    fn resolve(collection: Option<&CollectionMap>, value: &Bson) -> Bson {
        match value {
            Bson::ObjectId(id) => collection
                .and_then(|records| records.get(id))
                .cloned()
                .map(Bson::Document)
                .unwrap_or(Bson::Null),
            Bson::Array(items) => Bson::Array(
                items
                    .iter()
                    .map(|item| Self::resolve(collection, item))
                    .collect()
            ),
            other => other.clone(),
        }
    }
}

#[async_trait]
impl Model for InMemoryModel {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn find_by_id(&self, id: &str, options: &FindOptions) -> DocumentStoreResult<Option<Document>> {
        let id = parse_id(id)?;
        let projection = options.parsed_projection()?;
        let store = self.store.store.read().await;

        let record = store
            .get(&self.collection)
            .and_then(|records| records.get(&id))
            .cloned();

        trace!(target: "crudlayer::memory", %id, collection = %self.collection, found = record.is_some(), "find by id");

        Ok(record.map(|record| self.present(&store, record, projection.as_ref(), options)))
    }

    async fn find(&self, filter: Option<&Expr>, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
        let projection = options.parsed_projection()?;
        let store = self.store.store.read().await;

        let Some(records) = store.get(&self.collection) else {
            return Ok(Vec::new());
        };

        let mut matched = DocumentEvaluator::filter_documents(records.values(), filter)?
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        sort_documents(&mut matched, &options.sort_keys());

        let skip = usize::try_from(options.page.offset).unwrap_or(usize::MAX);
        let take = if options.page.is_limited() {
            usize::try_from(options.page.limit).unwrap_or(usize::MAX)
        } else {
            usize::MAX
        };

        let found = matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|record| self.present(&store, record, projection.as_ref(), options))
            .collect::<Vec<_>>();

        trace!(target: "crudlayer::memory", collection = %self.collection, returned = found.len(), "find");

        Ok(found)
    }

    async fn count_documents(&self, filter: Option<&Expr>) -> DocumentStoreResult<u64> {
        let store = self.store.store.read().await;

        let Some(records) = store.get(&self.collection) else {
            return Ok(0);
        };

        Ok(DocumentEvaluator::filter_documents(records.values(), filter)?.len() as u64)
    }

    async fn create(&self, fields: Document) -> DocumentStoreResult<Document> {
        let id = match fields.get(ID_FIELD) {
            Some(id) => cast_id(id)?,
            None => ObjectId::new(),
        };

        let mut record = self.normalize(id, fields)?;
        record.insert(REVISION_FIELD, 0_i32);

        let mut store = self.store.store.write().await;
        let records = store
            .entry(self.collection.clone())
            .or_default();

        if records.contains_key(&id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_hex(), self.collection.clone()));
        }

        records.insert(id, record.clone());

        debug!(target: "crudlayer::memory", %id, collection = %self.collection, "created record");

        Ok(record)
    }

    async fn save(&self, record: Document) -> DocumentStoreResult<Document> {
        let id = match record.get(ID_FIELD) {
            Some(id) => cast_id(id)?,
            None => return Err(DocumentStoreError::InvalidDocument(format!("record has no {ID_FIELD}"))),
        };

        let mut replacement = self.normalize(id, record)?;

        let mut store = self.store.store.write().await;
        let Some(existing) = store
            .get_mut(&self.collection)
            .and_then(|records| records.get_mut(&id))
        else {
            return Err(DocumentStoreError::DocumentNotFound(id.to_hex(), self.collection.clone()));
        };

        if let Some(revision) = existing.get(REVISION_FIELD) {
            replacement.insert(REVISION_FIELD, revision.clone());
        }

        *existing = replacement.clone();

        debug!(target: "crudlayer::memory", %id, collection = %self.collection, "saved record");

        Ok(replacement)
    }

    async fn find_by_id_and_remove(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        let id = parse_id(id)?;
        let mut store = self.store.store.write().await;

        let removed = store
            .get_mut(&self.collection)
            .and_then(|records| records.shift_remove(&id));

        debug!(target: "crudlayer::memory", %id, collection = %self.collection, removed = removed.is_some(), "remove record");

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use tracing_test::traced_test;

    use crudlayer_core::{page::Pagination, query::Filter};

    use super::*;

    async fn seeded() -> (InMemoryModel, Vec<Document>) {
        let model = InMemoryStore::new()
            .model("models")
            .reference("related_model", "models");

        let mut created = Vec::new();
        for (name, col_2) in [("Model 1", "AAAAA"), ("Model 2", "CCCCC"), ("Model 3", "CCCCC")] {
            created.push(model.create(doc! { "name": name, "col_2": col_2 }).await.unwrap());
        }

        (model, created)
    }

    fn names(records: &[Document]) -> Vec<&str> {
        records
            .iter()
            .map(|record| record.get_str("name").unwrap())
            .collect()
    }

    #[tokio::test]
    #[traced_test]
    async fn create_assigns_id_and_revision() {
        let (model, created) = seeded().await;

        let record = &created[0];
        assert!(record.get_object_id(ID_FIELD).is_ok());
        assert_eq!(record.get_i32(REVISION_FIELD).unwrap(), 0);
        assert_eq!(record.keys().next().map(String::as_str), Some(ID_FIELD));
        assert_eq!(model.count_documents(None).await.unwrap(), 3);
        assert!(logs_contain("created record"));
    }

    #[tokio::test]
    async fn create_reduces_embedded_references_to_ids() {
        let (model, created) = seeded().await;
        let target = created[1].get_object_id(ID_FIELD).unwrap();

        let record = model
            .create(doc! { "name": "Model 4", "related_model": created[1].clone() })
            .await
            .unwrap();

        assert_eq!(record.get_object_id("related_model").unwrap(), target);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let (model, created) = seeded().await;
        let id = created[0].get_object_id(ID_FIELD).unwrap();

        let result = model.create(doc! { "_id": id.to_hex(), "name": "again" }).await;

        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));
    }

    #[tokio::test]
    async fn find_filters_sorts_and_paginates() {
        let (model, _) = seeded().await;

        let options = FindOptions::new()
            .with_sort("col_2 -name")
            .with_page(Pagination::new(1, 1));

        let found = model.find(None, &options).await.unwrap();
        assert_eq!(names(&found), vec!["Model 3"]);

        let filter = Filter::eq("col_2", "CCCCC");
        let found = model.find(Some(&filter), &FindOptions::new()).await.unwrap();
        assert_eq!(names(&found), vec!["Model 2", "Model 3"]);
        assert_eq!(model.count_documents(Some(&filter)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn projection_keeps_id_unless_excluded() {
        let (model, created) = seeded().await;
        let id = created[0].get_object_id(ID_FIELD).unwrap().to_hex();

        let record = model
            .find_by_id(&id, &FindOptions::new().with_projection("name"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["_id", "name"]);

        let record = model
            .find_by_id(&id, &FindOptions::new().with_projection("-_id -col_2 -__v"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[tokio::test]
    async fn populate_resolves_references_and_dangling_ids_to_null() {
        let (model, created) = seeded().await;
        let target = created[1].get_object_id(ID_FIELD).unwrap();

        let mut record = created[0].clone();
        record.insert("related_model", target);
        model.save(record).await.unwrap();

        let dangling = model
            .create(doc! { "name": "Model 4", "related_model": ObjectId::new() })
            .await
            .unwrap();

        let options = FindOptions::new().with_populate("related_model");
        let id = created[0].get_object_id(ID_FIELD).unwrap().to_hex();

        let populated = model.find_by_id(&id, &options).await.unwrap().unwrap();
        let related = populated.get_document("related_model").unwrap();
        assert_eq!(related.get_str("name").unwrap(), "Model 2");

        let id = dangling.get_object_id(ID_FIELD).unwrap().to_hex();
        let populated = model.find_by_id(&id, &options).await.unwrap().unwrap();
        assert_eq!(populated.get("related_model"), Some(&Bson::Null));
    }

    #[tokio::test]
    async fn save_keeps_revision_and_requires_existing_record() {
        let (model, created) = seeded().await;

        let mut record = created[0].clone();
        record.insert("col_2", "BBBBB");
        record.insert(REVISION_FIELD, 7_i32);

        let saved = model.save(record).await.unwrap();
        assert_eq!(saved.get_str("col_2").unwrap(), "BBBBB");
        assert_eq!(saved.get_i32(REVISION_FIELD).unwrap(), 0);

        let missing = model.save(doc! { "_id": ObjectId::new(), "name": "ghost" }).await;
        assert!(matches!(missing, Err(DocumentStoreError::DocumentNotFound(_, _))));
    }

    #[tokio::test]
    async fn remove_returns_the_record_once() {
        let (model, created) = seeded().await;
        let id = created[2].get_object_id(ID_FIELD).unwrap().to_hex();

        assert!(model.find_by_id_and_remove(&id).await.unwrap().is_some());
        assert!(model.find_by_id_and_remove(&id).await.unwrap().is_none());
        assert!(model.find_by_id(&id, &FindOptions::new()).await.unwrap().is_none());
        assert_eq!(model.count_documents(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected() {
        let (model, _) = seeded().await;

        assert!(matches!(
            model.find_by_id("not-an-id", &FindOptions::new()).await,
            Err(DocumentStoreError::InvalidId(_))
        ));
        assert!(matches!(
            model.find_by_id_and_remove("not-an-id").await,
            Err(DocumentStoreError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn models_share_the_store() {
        let store = InMemoryStore::new();
        store.model("models").create(doc! { "name": "a" }).await.unwrap();

        assert_eq!(store.list_collections().await, vec!["models".to_string()]);
        assert_eq!(store.model("models").count_documents(None).await.unwrap(), 1);
        assert_eq!(store.model("others").count_documents(None).await.unwrap(), 0);
    }
}
