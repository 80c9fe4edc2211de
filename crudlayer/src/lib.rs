//! Main crudlayer crate: turn HTTP-style CRUD requests into document store queries.
//!
//! This crate is the primary entry point for users of the crudlayer framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the different storage backends.
//!
//! # Features
//!
//! - **Ready-made handlers** - get, post, put, patch and delete over one collection
//! - **Query string filters** - `?name=!Model 2&col_1=a,b` becomes a store filter
//! - **Pagination headers** - `X-Total` and `X-Total-Pages` for list requests
//! - **Multiple backends** - In-memory and MongoDB models behind one `Model` trait
//!
//! # Quick Start
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!     let crud = RestCrud::builder()
//!         .model(store.model("models").reference("related_model", "models"))
//!         .id_param("object_id")
//!         .options(CrudOptions::new().with_search_columns(["name", "col_1"]))
//!         .build()?;
//!
//!     // POST /models
//!     let created = crud
//!         .post(Some(&Request::new().with_body(serde_json::json!({ "name": "Model 1" }))), Some(&mut Response::new()))?
//!         .await?;
//!
//!     // GET /models?sort=-name&limit=10
//!     let request = Request::new()
//!         .with_query("sort", "-name")
//!         .with_query("limit", "10");
//!     let mut response = Response::new();
//!
//!     let records = crud.get(Some(&request), Some(&mut response))?.await?;
//!
//!     println!("{records:?}, {:?} in total", response.header("X-Total"));
//!     Ok(())
//! }
//! ```
//!
//! # Two kinds of errors
//!
//! A handler call either fails immediately with a [`CrudError`](error::CrudError),
//! for instance when the request is missing, or hands out a task. Store failures
//! only ever surface when that task is awaited, as a
//! [`DocumentStoreError`](error::DocumentStoreError).
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use crudlayer_core::{error, handler, model, options, page, query, record, request, translate};

// Re-export BSON and JSON types for convenience
pub use bson;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use crudlayer_memory::{InMemoryModel, InMemoryStore};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use crudlayer_mongodb::{MongoModel, MongoModelBuilder};
}
