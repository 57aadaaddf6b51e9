//! Domain Layer
//!
//! Record, collection and query types shared by every store implementation.
//! This layer only depends on serde/chrono/thiserror.

mod document;
mod error;
mod query;

pub use document::{fields, CollectionPath, Document, Fields};
pub use error::{DomainError, DomainResult};
pub use query::{Direction, OrderBy, Query, SortKey};
