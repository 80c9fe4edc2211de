//! The store-bound model the handlers delegate to.
//!
//! A [`Model`] is a handle on one collection of a document store. The handlers
//! never touch storage themselves: they translate a request, call the model and
//! shape the result. Implementations live in `crudlayer-memory` and
//! `crudlayer-mongodb`, and anything else offering the same capabilities can be
//! plugged in.
//!
//! # Identifiers
//!
//! Identifiers reach the model exactly as they appeared in the request path.
//! Casting them to the store's identifier type is the model's job, and a value
//! that cannot be cast is reported as [`DocumentStoreError::InvalidId`].
//!
//! # Not found
//!
//! Lookups by identifier return `Ok(None)` when nothing matches. Only genuine
//! store failures are errors.
//!
//! [`DocumentStoreError::InvalidId`]: crate::error::DocumentStoreError::InvalidId

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::DocumentStoreResult,
    page::Pagination,
    query::{Expr, Projection, Sort},
};

/// How matching records are read back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Space-delimited projection, `None` for every field.
    pub projection: Option<String>,
    /// Space-delimited reference fields to populate, empty for none.
    pub populate: String,
    /// Raw sort expression, `None` for the store's natural order.
    pub sort: Option<String>,
    /// Records to skip and maximum to return (`0` for all).
    pub page: Pagination,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    pub fn with_populate(mut self, populate: impl Into<String>) -> Self {
        self.populate = populate.into();
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_page(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }

    /// Parses the projection string.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`](crate::error::DocumentStoreError::InvalidQuery)
    /// if inclusion and exclusion are mixed.
    pub fn parsed_projection(&self) -> DocumentStoreResult<Option<Projection>> {
        match &self.projection {
            Some(projection) => Projection::parse(projection),
            None => Ok(None),
        }
    }

    /// Returns the parsed sort keys, empty for natural order.
    pub fn sort_keys(&self) -> Vec<Sort> {
        self.sort
            .as_deref()
            .map(Sort::parse_expr)
            .unwrap_or_default()
    }

    /// Returns the reference fields named by the populate directive.
    pub fn populated_fields(&self) -> impl Iterator<Item = &str> {
        self.populate.split_whitespace()
    }

    /// Projection and population only; used when reading a single record.
    pub fn for_record(&self) -> FindOptions {
        FindOptions {
            projection: self.projection.clone(),
            populate: self.populate.clone(),
            ..FindOptions::default()
        }
    }
}

/// A handle on one collection of a document store.
///
/// All implementations must be thread-safe; the handlers share one model across
/// every concurrent request.
#[async_trait]
pub trait Model: Send + Sync + Debug {
    /// Name of the collection this model reads and writes.
    fn collection_name(&self) -> &str;

    /// Reads one record by identifier, applying projection and population.
    ///
    /// Returns `Ok(None)` if no record has that identifier.
    async fn find_by_id(&self, id: &str, options: &FindOptions) -> DocumentStoreResult<Option<Document>>;

    /// Reads the records matching `filter`, applying the options in the order
    /// filter, sort, skip, limit. Projection and population apply to each record.
    async fn find(&self, filter: Option<&Expr>, options: &FindOptions) -> DocumentStoreResult<Vec<Document>>;

    /// Counts the records matching `filter`, ignoring any pagination.
    async fn count_documents(&self, filter: Option<&Expr>) -> DocumentStoreResult<u64>;

    /// Stores a new record built from `fields` and returns it with its assigned identifier.
    ///
    /// Reference fields supplied as embedded records are reduced to their identifier.
    async fn create(&self, fields: Document) -> DocumentStoreResult<Document>;

    /// Replaces the stored record that has the same identifier as `record`.
    ///
    /// Returns the record as stored.
    async fn save(&self, record: Document) -> DocumentStoreResult<Document>;

    /// Removes the record with the given identifier and returns it, or `Ok(None)` if there was none.
    async fn find_by_id_and_remove(&self, id: &str) -> DocumentStoreResult<Option<Document>>;
}

/// Builder for models that need asynchronous setup, such as a connection.
#[async_trait]
pub trait ModelBuilder: Send {
    type Model: Model;

    /// Builds the model.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`](crate::error::DocumentStoreError::Initialization)
    /// if the underlying store cannot be reached or configured.
    async fn build(self) -> DocumentStoreResult<Self::Model>;
}

#[async_trait]
impl<M> Model for &M
where
    M: Model + ?Sized,
{
    fn collection_name(&self) -> &str {
        (**self).collection_name()
    }

    async fn find_by_id(&self, id: &str, options: &FindOptions) -> DocumentStoreResult<Option<Document>> {
        (**self).find_by_id(id, options).await
    }

    async fn find(&self, filter: Option<&Expr>, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
        (**self).find(filter, options).await
    }

    async fn count_documents(&self, filter: Option<&Expr>) -> DocumentStoreResult<u64> {
        (**self).count_documents(filter).await
    }

    async fn create(&self, fields: Document) -> DocumentStoreResult<Document> {
        (**self).create(fields).await
    }

    async fn save(&self, record: Document) -> DocumentStoreResult<Document> {
        (**self).save(record).await
    }

    async fn find_by_id_and_remove(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        (**self).find_by_id_and_remove(id).await
    }
}

#[async_trait]
impl<M> Model for Arc<M>
where
    M: Model + ?Sized,
{
    fn collection_name(&self) -> &str {
        (**self).collection_name()
    }

    async fn find_by_id(&self, id: &str, options: &FindOptions) -> DocumentStoreResult<Option<Document>> {
        (**self).find_by_id(id, options).await
    }

    async fn find(&self, filter: Option<&Expr>, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
        (**self).find(filter, options).await
    }

    async fn count_documents(&self, filter: Option<&Expr>) -> DocumentStoreResult<u64> {
        (**self).count_documents(filter).await
    }

    async fn create(&self, fields: Document) -> DocumentStoreResult<Document> {
        (**self).create(fields).await
    }

    async fn save(&self, record: Document) -> DocumentStoreResult<Document> {
        (**self).save(record).await
    }

    async fn find_by_id_and_remove(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        (**self).find_by_id_and_remove(id).await
    }
}

#[async_trait]
impl<M> Model for Box<M>
where
    M: Model + ?Sized,
{
    fn collection_name(&self) -> &str {
        (**self).collection_name()
    }

    async fn find_by_id(&self, id: &str, options: &FindOptions) -> DocumentStoreResult<Option<Document>> {
        (**self).find_by_id(id, options).await
    }

    async fn find(&self, filter: Option<&Expr>, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
        (**self).find(filter, options).await
    }

    async fn count_documents(&self, filter: Option<&Expr>) -> DocumentStoreResult<u64> {
        (**self).count_documents(filter).await
    }

    async fn create(&self, fields: Document) -> DocumentStoreResult<Document> {
        (**self).create(fields).await
    }

    async fn save(&self, record: Document) -> DocumentStoreResult<Document> {
        (**self).save(record).await
    }

    async fn find_by_id_and_remove(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        (**self).find_by_id_and_remove(id).await
    }
}
