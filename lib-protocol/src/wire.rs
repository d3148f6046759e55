//! Wire messages
//!
//! JSON message bodies exchanged between peers, tagged by `type`. Field
//! spellings (`content-hash`, `docname`) are fixed by the protocol.
//! Signature blobs contain raw ed25519 bytes, so they travel hex-encoded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lib_document::{Action, Event, EventRecord, ReadRequest};

/// `deje-error` codes.
pub const ERR_NOT_DICT: i64 = 30;
pub const ERR_NO_TYPE: i64 = 31;
pub const ERR_UNKNOWN_TYPE: i64 = 32;
pub const ERR_PERMISSION: i64 = 40;

/// Message `type` strings this peer understands.
pub const KNOWN_TYPES: [&str; 8] = [
    "deje-lock-acquire",
    "deje-lock-acquired",
    "deje-lock-complete",
    "deje-get-version",
    "deje-doc-version",
    "deje-get-block",
    "deje-doc-block",
    "deje-error",
];

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "deje-lock-acquire")]
    LockAcquire {
        docname: String,
        content: ActionContent,
    },

    #[serde(rename = "deje-lock-acquired")]
    LockAcquired {
        docname: String,
        signer: String,
        #[serde(rename = "content-hash")]
        content_hash: String,
        signature: String,
    },

    #[serde(rename = "deje-lock-complete")]
    LockComplete {
        docname: String,
        signatures: BTreeMap<String, String>,
        #[serde(rename = "content-hash")]
        content_hash: String,
        /// Present on read-action completions: the document version at the
        /// accepting peer, piggybacked for the new subscriber.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },

    #[serde(rename = "deje-get-version")]
    GetVersion { docname: String },

    #[serde(rename = "deje-doc-version")]
    DocVersion { docname: String, version: u64 },

    #[serde(rename = "deje-get-block")]
    GetBlock { docname: String, version: u64 },

    #[serde(rename = "deje-doc-block")]
    DocBlock { docname: String, block: Block },

    #[serde(rename = "deje-error")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        docname: Option<String>,
        code: i64,
        explanation: String,
        #[serde(default)]
        data: Value,
    },
}

/// The inner action of a `deje-lock-acquire`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionContent {
    #[serde(rename = "deje-checkpoint")]
    Checkpoint {
        version: u64,
        checkpoint: Value,
        author: String,
    },

    #[serde(rename = "deje-subscribe")]
    Subscribe { subscriber: String, unique: u32 },
}

impl ActionContent {
    pub fn from_action(action: &Action) -> ActionContent {
        match action {
            Action::Event(ev) => ActionContent::Checkpoint {
                version: ev.version,
                checkpoint: ev.content.clone(),
                author: ev.author.clone(),
            },
            Action::Read(rr) => ActionContent::Subscribe {
                subscriber: rr.author.clone(),
                unique: rr.unique,
            },
        }
    }

    pub fn into_action(self) -> Action {
        match self {
            ActionContent::Checkpoint {
                version,
                checkpoint,
                author,
            } => Action::Event(Event::new(checkpoint, author, version)),
            ActionContent::Subscribe { subscriber, unique } => {
                Action::Read(ReadRequest::with_unique(subscriber, unique))
            }
        }
    }
}

/// A materialized, quorum-signed event at one log index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub author: String,
    pub content: Value,
    pub version: u64,
    #[serde(default)]
    pub signatures: BTreeMap<String, String>,
}

impl From<&EventRecord> for Block {
    fn from(record: &EventRecord) -> Self {
        Block {
            author: record.author.clone(),
            content: record.content.clone(),
            version: record.version,
            signatures: record.signatures.clone(),
        }
    }
}

impl From<Block> for EventRecord {
    fn from(block: Block) -> Self {
        EventRecord {
            content: block.content,
            author: block.author,
            version: block.version,
            signatures: block.signatures,
        }
    }
}
