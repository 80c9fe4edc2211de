//! MongoDB backend implementation for crudlayer.
//!
//! This crate provides a MongoDB-based implementation of the `Model` trait,
//! so the CRUD handlers can serve a persistent collection using MongoDB's query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! crudlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native queries** - Filters, sorting and pagination run inside MongoDB
//! - **References** - Fields declared with [`MongoModelBuilder::reference`] can be populated on read
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{model::ModelBuilder, mongodb::MongoModel, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = MongoModel::builder("mongodb://localhost:27017", "my_database", "models")
//!         .reference("related_model", "models")
//!         .build()
//!         .await?;
//!
//!     let crud = RestCrud::new(model, Some("object_id"), CrudOptions::default());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_mongodb;

pub mod store;
pub mod query;

pub use store::{MongoModel, MongoModelBuilder};
