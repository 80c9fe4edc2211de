//! Translate HTTP-style CRUD requests into document store queries.
//!
//! This crate is the core of the crudlayer project and provides:
//!
//! - **CRUD handlers** ([`handler`]) - get/post/put/patch/delete over one model
//! - **Parameter translation** ([`translate`]) - query parameters to filter, sort and pagination
//! - **Filter expressions** ([`query`]) - the store-agnostic filter, sort and projection types
//! - **Model abstraction** ([`model`]) - the trait a document store implements to back the handlers
//! - **Requests and responses** ([`request`]) - the request maps and the header sink
//! - **Pagination** ([`page`]) - offset/limit and the `X-Total` headers
//! - **Records** ([`record`]) - store-managed fields and update merging
//! - **Configuration** ([`options`]) - handler options such as search columns
//! - **Error handling** ([`error`]) - synchronous and asynchronous error types
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!     let crud = RestCrud::builder()
//!         .model(store.model("models"))
//!         .id_param("object_id")
//!         .build()?;
//!
//!     let request = Request::new().with_query("name", "!Model 2");
//!     let mut response = Response::new();
//!     let records = crud.get(Some(&request), Some(&mut response))?.await?;
//!
//!     println!("{records:?} of {:?}", response.header("X-Total"));
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_core;

pub mod error;
pub mod handler;
pub mod model;
pub mod options;
pub mod page;
pub mod query;
pub mod record;
pub mod request;
pub mod translate;
