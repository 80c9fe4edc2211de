//! Convenient re-exports of commonly used types from crudlayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use crudlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - The handler set and its builder
//! - Requests, responses and handler options
//! - The model trait and read options
//! - Filter construction
//! - Error types

pub use crudlayer_core::{
    handler::{CrudTask, Method, Reply, RestCrud, RestCrudBuilder},
    request::{QueryValue, Request, Response, ResponseSink},
    options::CrudOptions,
    model::{FindOptions, Model, ModelBuilder},
    page::{Pagination, TOTAL_HEADER, TOTAL_PAGES_HEADER},
    query::{Expr, FieldOp, Filter, Projection, QueryVisitor, Sort, SortDirection},
    record::{ID_FIELD, REVISION_FIELD, Record, RecordExt},
    error::{CrudError, CrudResult, DocumentStoreError, DocumentStoreResult},
};
