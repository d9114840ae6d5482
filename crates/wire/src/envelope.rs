//! Wire-level request/response framing around a command [`Document`] (§6).
//!
//! Each request carries exactly one command document; each response is
//! either the handler's result document or, on failure, the envelope built
//! by [`docdb_core::CommandError::into_envelope`]. There is no separate
//! success/failure wire shape the way the teacher's JSON envelope
//! (`Response { ok, result, error }`) has one — per §6, every response is
//! just a document whose own `ok` field says which case it is.

use docdb_core::Document;

use crate::json::{self, DecodeError};

/// A single inbound command request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The raw command document, first key is the command name (§3, §4.1).
    pub command: Document,
}

/// A single outbound command response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The result or error envelope document (§6).
    pub document: Document,
}

impl Request {
    /// Decodes a request from a JSON command document.
    pub fn decode(json: &str) -> Result<Self, DecodeError> {
        Ok(Request {
            command: json::decode_document(json)?,
        })
    }
}

impl Response {
    /// Wraps an already-built document (success result or error envelope).
    pub fn new(document: Document) -> Self {
        Response { document }
    }

    /// Encodes the response document as JSON.
    pub fn encode(&self) -> String {
        json::encode_document(&self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_core::Bson;

    #[test]
    fn request_decodes_command_document() {
        let req = Request::decode(r#"{"ping": 1}"#).unwrap();
        assert_eq!(req.command.get("ping"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn response_encodes_its_document() {
        let mut doc = Document::new();
        doc.insert("ok", Bson::Double(1.0));
        let response = Response::new(doc);
        assert_eq!(response.encode(), r#"{"ok":1.0}"#);
    }
}
