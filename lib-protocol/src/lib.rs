//! DEJE Protocol Package
//!
//! The per-peer half of the replication protocol: wire message types, the
//! owner object that routes inbound messages to documents and quorums, and
//! a queue-draining in-process transport. The protocol is single-threaded
//! cooperative - sends enqueue, nothing mutates a document reentrantly.

pub mod owner;
pub mod transport;
pub mod wire;

pub use owner::Owner;
pub use transport::{Router, Transport};
pub use wire::{ActionContent, Block, Message};

use lib_document::DocumentError;
use lib_identity::IdentityError;

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Protocol error types
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("identity {0:?} has no transport location")]
    MissingLocation(String),

    #[error("no document named {0:?}")]
    UnknownDocument(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
