//! The CRUD handler set.
//!
//! [`RestCrud`] binds a [`Model`] to an optional identifier path parameter and
//! a set of [`CrudOptions`], and exposes one handler per HTTP method. Every
//! handler has the same two-stage shape:
//!
//! 1. Synchronously, it checks its arguments and configuration and either
//!    returns a [`CrudError`] or hands out a [`CrudTask`].
//! 2. The task performs the store calls and settles exactly once, with the
//!    result or a [`DocumentStoreError`].
//!
//! A missing request or response is therefore reported before any task exists,
//! while a failing store is only ever reported through the task.
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! let crud = RestCrud::builder()
//!     .model(store.model("models"))
//!     .id_param("object_id")
//!     .options(CrudOptions::new().with_search_columns(["name"]))
//!     .build()?;
//!
//! let request = Request::new().with_query("limit", "2");
//! let mut response = Response::new();
//! let reply = crud.get(Some(&request), Some(&mut response))?.await?;
//! ```

use bson::Document;
use futures::{FutureExt, future::BoxFuture};
use std::{fmt, future::Future};
use tracing::{debug, warn};

use crate::{
    error::{CrudError, CrudResult, DocumentStoreError, DocumentStoreResult},
    model::Model,
    options::CrudOptions,
    record::{Record, document_from_json},
    request::{Request, ResponseSink},
    translate,
};

/// The asynchronous half of a handler call. Resolves or rejects exactly once.
pub type CrudTask<'a, T> = BoxFuture<'a, DocumentStoreResult<T>>;

/// The response sink argument of a handler.
pub type Sink<'a> = &'a mut (dyn ResponseSink + 'a);

/// The HTTP methods a [`RestCrud`] can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns whether the method addresses a single record by identifier.
    pub fn needs_id(&self) -> bool {
        matches!(self, Method::Put | Method::Patch | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// The settled value of any handler, for callers dispatching through [`RestCrud::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A single record, or `None` when the identifier matched nothing.
    Record(Option<Document>),
    /// The page of records of a list request.
    Records(Vec<Document>),
    /// `Some(true)` when a record was deleted, `None` when there was none.
    Removed(Option<bool>),
}

impl Reply {
    pub fn into_record(self) -> Option<Document> {
        match self {
            Reply::Record(record) => record,
            _ => None,
        }
    }

    pub fn into_records(self) -> Option<Vec<Document>> {
        match self {
            Reply::Records(records) => Some(records),
            _ => None,
        }
    }
}

/// A set of CRUD handlers over one model.
#[derive(Debug)]
pub struct RestCrud<M: Model> {
    model: M,
    id_param: Option<String>,
    options: CrudOptions,
}

impl<M: Model> RestCrud<M> {
    /// Creates a handler set. An empty `id_param` counts as none.
    pub fn new(model: M, id_param: Option<&str>, options: CrudOptions) -> Self {
        Self {
            model,
            id_param: id_param
                .filter(|param| !param.is_empty())
                .map(str::to_string),
            options,
        }
    }

    pub fn builder() -> RestCrudBuilder<M> {
        RestCrudBuilder::new()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn id_param(&self) -> Option<&str> {
        self.id_param.as_deref()
    }

    pub fn options(&self) -> &CrudOptions {
        &self.options
    }

    /// The methods this handler set serves. Put, patch and delete are only
    /// available when an identifier parameter was configured.
    pub fn methods(&self) -> Vec<Method> {
        [Method::Get, Method::Post, Method::Put, Method::Patch, Method::Delete]
            .into_iter()
            .filter(|method| self.supports(*method))
            .collect()
    }

    pub fn supports(&self, method: Method) -> bool {
        !method.needs_id() || self.id_param.is_some()
    }

    /// Dispatches to the handler for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::MethodNotAllowed`] for a method outside [`methods`](Self::methods),
    /// and otherwise whatever the handler itself reports synchronously.
    pub fn handle<'a>(
        &'a self,
        method: Method,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Reply>> {
        Ok(match method {
            Method::Get => self.get(req, res)?,
            Method::Post => self
                .post(req, res)?
                .map(|result| result.map(|record| Reply::Record(Some(record))))
                .boxed(),
            Method::Put => self
                .put(req, res)?
                .map(|result| result.map(|record| Reply::Record(Some(record))))
                .boxed(),
            Method::Patch => self
                .patch(req, res)?
                .map(|result| result.map(|record| Reply::Record(Some(record))))
                .boxed(),
            Method::Delete => self
                .delete(req, res)?
                .map(|result| result.map(Reply::Removed))
                .boxed(),
        })
    }

    /// Reads one record when the request carries the identifier parameter,
    /// otherwise lists the records matching the request's query parameters.
    ///
    /// A list writes `X-Total` and, with a limit, `X-Total-Pages` to `res`
    /// before the page itself is read.
    ///
    /// # Errors
    ///
    /// Synchronously returns [`CrudError::MissingArgument`] without a request or
    /// response, and [`CrudError::Configuration`] for a `search_term` without
    /// configured search columns.
    pub fn get<'a>(
        &'a self,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Reply>> {
        let (req, res) = require(req, res)?;

        if let Some(id) = self.requested_id(req) {
            let options = translate::find_options(&req.query).for_record();
            debug!(target: "crudlayer::handler", collection = self.collection(), id, "fetching record");

            return Ok(self.task(Method::Get, async move {
                Ok(Reply::Record(self.model.find_by_id(id, &options).await?))
            }));
        }

        let query = translate::translate(req, &self.options)?;
        debug!(target: "crudlayer::handler", collection = self.collection(), "listing records");

        Ok(self.task(Method::Get, async move {
            let count = self.model.count_documents(query.filter.as_ref()).await?;
            query.options.page.write_headers(count, res);

            let records = self.model.find(query.filter.as_ref(), &query.options).await?;

            Ok(Reply::Records(records))
        }))
    }

    /// Creates a record from the request body.
    ///
    /// # Errors
    ///
    /// Synchronously returns [`CrudError::MissingArgument`] without a request or response.
    pub fn post<'a>(
        &'a self,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Document>> {
        let (req, _) = require(req, res)?;
        debug!(target: "crudlayer::handler", collection = self.collection(), "creating record");

        Ok(self.task(Method::Post, async move {
            self.model.create(document_from_json(&req.body)?).await
        }))
    }

    /// Updates the addressed record with the request body.
    ///
    /// # Errors
    ///
    /// See [`patch`](Self::patch); both share the same field merge.
    pub fn put<'a>(
        &'a self,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Document>> {
        self.update(Method::Put, req, res)
    }

    /// Updates the addressed record with the request body.
    ///
    /// Every body field except `_id` and `__v` replaces the record's field, and
    /// the record is saved. The task rejects with
    /// [`DocumentStoreError::DocumentNotFound`] when the identifier matches nothing.
    ///
    /// # Errors
    ///
    /// Synchronously returns [`CrudError::MethodNotAllowed`] without a configured
    /// identifier parameter and [`CrudError::MissingArgument`] without a request
    /// or response.
    pub fn patch<'a>(
        &'a self,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Document>> {
        self.update(Method::Patch, req, res)
    }

    /// Deletes the addressed record.
    ///
    /// The task resolves with `Some(true)` when a record was removed and `None`
    /// when the identifier matched nothing.
    ///
    /// # Errors
    ///
    /// Synchronously returns [`CrudError::MethodNotAllowed`] without a configured
    /// identifier parameter and [`CrudError::MissingArgument`] without a request
    /// or response.
    pub fn delete<'a>(
        &'a self,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Option<bool>>> {
        self.ensure_supported(Method::Delete)?;
        let (req, _) = require(req, res)?;
        let id = self.requested_id(req);
        debug!(target: "crudlayer::handler", collection = self.collection(), id, "removing record");

        Ok(self.task(Method::Delete, async move {
            let Some(id) = id else {
                return Ok(None);
            };

            Ok(self
                .model
                .find_by_id_and_remove(id)
                .await?
                .map(|_| true))
        }))
    }

    fn update<'a>(
        &'a self,
        method: Method,
        req: Option<&'a Request>,
        res: Option<Sink<'a>>,
    ) -> CrudResult<CrudTask<'a, Document>> {
        self.ensure_supported(method)?;
        let (req, _) = require(req, res)?;
        let id = self.requested_id(req);
        debug!(target: "crudlayer::handler", collection = self.collection(), id, %method, "updating record");

        Ok(self.task(method, async move {
            let not_found = || {
                DocumentStoreError::DocumentNotFound(
                    id.unwrap_or_default().to_string(),
                    self.collection().to_string(),
                )
            };

            let id = id.ok_or_else(not_found)?;
            let existing = self
                .model
                .find_by_id(id, &Default::default())
                .await?
                .ok_or_else(not_found)?;

            let mut record = Record::new(existing);
            let assigned = record.assign(document_from_json(&req.body)?);
            debug!(target: "crudlayer::handler", collection = self.collection(), id, ?assigned, "saving record");

            self.model.save(record.into_document()).await
        }))
    }

    fn requested_id<'a>(&self, req: &'a Request) -> Option<&'a str> {
        self.id_param
            .as_deref()
            .and_then(|param| req.param(param))
    }

    fn ensure_supported(&self, method: Method) -> CrudResult<()> {
        if self.supports(method) {
            Ok(())
        } else {
            Err(CrudError::MethodNotAllowed(method))
        }
    }

    fn collection(&self) -> &str {
        self.model.collection_name()
    }

    fn task<'a, T, F>(&'a self, method: Method, work: F) -> CrudTask<'a, T>
    where
        T: Send + 'a,
        F: Future<Output = DocumentStoreResult<T>> + Send + 'a,
    {
        let collection = self.collection();

        Box::pin(async move {
            let result = work.await;

            if let Err(err) = &result {
                warn!(target: "crudlayer::handler", collection, %method, error = %err, "store operation failed");
            }

            result
        })
    }
}

/// Builder for [`RestCrud`].
#[derive(Debug)]
pub struct RestCrudBuilder<M> {
    model: Option<M>,
    id_param: Option<String>,
    options: CrudOptions,
}

impl<M: Model> RestCrudBuilder<M> {
    pub fn new() -> Self {
        Self {
            model: None,
            id_param: None,
            options: CrudOptions::default(),
        }
    }

    /// Sets the model the handlers delegate to. Required.
    pub fn model(mut self, model: M) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the path parameter carrying a record identifier.
    ///
    /// Without it only get (list) and post are available.
    pub fn id_param(mut self, id_param: impl Into<String>) -> Self {
        self.id_param = Some(id_param.into());
        self
    }

    pub fn options(mut self, options: CrudOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the handler set.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Configuration`] if no model was supplied.
    pub fn build(self) -> CrudResult<RestCrud<M>> {
        let model = self
            .model
            .ok_or_else(|| CrudError::Configuration("no Model specified".to_string()))?;

        Ok(RestCrud::new(model, self.id_param.as_deref(), self.options))
    }
}

impl<M: Model> Default for RestCrudBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

fn require<'a>(
    req: Option<&'a Request>,
    res: Option<Sink<'a>>,
) -> CrudResult<(&'a Request, Sink<'a>)> {
    let req = req.ok_or(CrudError::MissingArgument("Request"))?;
    let res = res.ok_or(CrudError::MissingArgument("Response"))?;

    Ok((req, res))
}
