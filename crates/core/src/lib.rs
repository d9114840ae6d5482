//! Core types and traits for the document command layer.
//!
//! This crate defines the foundational, storage-agnostic building blocks:
//! - [`value::Bson`] / [`value::Document`]: the self-describing, ordered value tree.
//! - [`object_id::ObjectId`]: driver-style document identifiers.
//! - [`namespace::Namespace`]: `"<database>.<collection>"` references.
//! - [`error::CommandError`]: the unified error type and envelope builder.
//! - [`traits::CommandStore`] / [`traits::TransactionalStore`]: the engine-facing interface.
//! - [`limits`]: document size/depth/path limits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod namespace;
pub mod object_id;
pub mod traits;
pub mod value;

pub use error::{CommandError, CommandResult, ErrorCode, ErrorLabel};
pub use namespace::{Namespace, DEFAULT_DATABASE};
pub use object_id::ObjectId;
pub use traits::{
    CommandStore, CreateIndexesResult, DeleteOp, IndexMetadata, IndexSpec, InsertResult,
    TransactionalStore, UpdateOp, UpdateResult, UpsertedId,
};
pub use value::{Binary, Bson, DateTime, Decimal128, Document, Timestamp};
