//! Subscription proposals

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A proposal to add `author` as a subscriber. The `unique` tag travels on
/// the wire so every peer derives the same content hash for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub author: String,
    pub unique: u32,
    #[serde(default, skip_serializing)]
    pub done: bool,
}

impl ReadRequest {
    /// New request with a random tag.
    pub fn new(author: impl Into<String>) -> Self {
        Self::with_unique(author, rand::random::<u32>())
    }

    pub fn with_unique(author: impl Into<String>, unique: u32) -> Self {
        ReadRequest {
            author: author.into(),
            unique,
            done: false,
        }
    }

    /// Hashable form: `{"author", "type", "unique"}`.
    pub fn hashcontent(&self) -> Value {
        json!({
            "author": self.author,
            "type": "deje-subscribe",
            "unique": self.unique,
        })
    }
}
