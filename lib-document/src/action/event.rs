//! Write proposals

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::document::Document;

/// A proposed mutation: handler-interpretable content, the proposing
/// author, and the document version the proposer saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub content: Value,
    pub author: String,
    pub version: u64,
}

impl Event {
    pub fn new(content: Value, author: impl Into<String>, version: u64) -> Self {
        Event {
            content,
            author: author.into(),
            version,
        }
    }

    /// Hashable form: `[content, version, author]`.
    pub fn hashcontent(&self) -> Value {
        json!([self.content, self.version, self.author])
    }

    /// An event is done once a record with the same content, author, and
    /// version sits in the document log.
    pub fn is_done(&self, doc: &Document) -> bool {
        doc.events().iter().any(|record| {
            record.content == self.content
                && record.author == self.author
                && record.version == self.version
        })
    }
}
