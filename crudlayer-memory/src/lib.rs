//! In-memory document storage backend for crudlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Model` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Insertion order** - Unsorted reads return records in the order they were created
//! - **Full query support** - Filtering, case-insensitive search, multi-key sorting and pagination
//! - **References** - Fields declared with [`InMemoryModel::reference`] can be populated on read
//!
//! # Quick Start
//!
//! ```ignore
//! use crudlayer::prelude::*;
//! use crudlayer_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!     let crud = RestCrud::new(store.model("users"), Some("user_id"), CrudOptions::default());
//!
//!     let request = Request::new().with_body(serde_json::json!({ "name": "Alice" }));
//!     let user = crud.post(Some(&request), Some(&mut Response::new()))?.await?;
//!
//!     println!("{user:?}");
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_memory;

pub mod store;
pub mod evaluator;

pub use store::{InMemoryModel, InMemoryStore};
