//! Wire-protocol codec for the document command layer.
//!
//! [`json`] converts between [`docdb_core::Document`]/[`docdb_core::Bson`]
//! and JSON text using MongoDB-style extended-JSON wrappers for types plain
//! JSON can't represent natively. [`envelope`] frames a decoded command
//! document into a [`envelope::Request`] and a result document into an
//! [`envelope::Response`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod json;

pub use envelope::{Request, Response};
pub use json::{bson_to_json, decode_document, document_to_json, encode_document, DecodeError};
