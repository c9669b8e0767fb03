//! Core jsondb: paths and documents
//!
//! This layer knows nothing about files, locking or scheduling:
//! - `Path`: a parsed dotted path such as `user.address.city`
//! - `Document`: the top-level JSON mapping a store owns
//! - `accessor`: resolving paths against a document for read, write and delete
//!
//! # Example
//!
//! ```rust
//! use jsondb_core_store::{accessor, path, Document};
//! use serde_json::json;
//!
//! let mut doc = Document::new();
//! accessor::resolve_for_write(&mut doc, &path!("user.name"), json!("John")).unwrap();
//! assert_eq!(
//!     accessor::resolve_for_read(&doc, &path!("user")),
//!     Some(&json!({"name": "John"}))
//! );
//! ```

pub mod accessor;
mod error;
mod path;

pub use accessor::Document;
pub use error::{kind_name, Error};
pub use path::{Path, PathError};

// Re-export the value type so dependents agree on one serde_json.
pub use serde_json::{Map, Value};
