//! Declarative schema file handling for dynatable.
//!
//! The schema file is the durable description of every user table. This
//! crate parses it into a structured [`SchemaDocument`], applies structural
//! edits as tree operations, and writes it back without disturbing any text
//! it did not edit.
//!
//! # Architecture
//!
//! - **`document`**: parser, serializer and in-place mutations
//! - **`mutate`**: text-in/text-out wrappers over the document operations
//! - **`store`**: whole-file reads and atomic whole-file writes
//!
//! # Quick start
//!
//! ```no_run
//! use dynatable_core::ColumnDefinition;
//! use dynatable_schema::SchemaStore;
//!
//! let store = SchemaStore::new("schema.dyn");
//! let mut doc = store.load().unwrap();
//! doc.add_table("users", vec![ColumnDefinition::new("email", "String")]).unwrap();
//! store.save(&doc).unwrap();
//! ```

mod document;
mod error;
mod mutate;
mod store;

pub use document::SchemaDocument;
pub use error::{Result, SchemaError};
pub use mutate::{add_table, find_table, remove_table, rename_column};
pub use store::{SchemaStore, checksum, default_header};
