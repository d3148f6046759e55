//! DEJE Document Package
//!
//! The replication core: a document is an initial resource snapshot plus an
//! ordered log of quorum-approved events. This crate holds the per-document
//! state machine - resources, signed actions, signature quorums, the
//! one-live-quorum-per-signer space, and the handler policy boundary.
//! Message routing between peers lives in `lib-protocol`.

pub mod action;
pub mod document;
pub mod handler;
pub mod quorum;
pub mod quorumspace;
pub mod resource;

pub use action::{Action, Event, ReadRequest};
pub use document::{
    Document, EnactOutcome, EventDisposition, EventRecord, Snapshot, ANONYMOUS,
    DEFAULT_HANDLER_PATH,
};
pub use handler::builtin::DeltaHandler;
pub use handler::{Handler, ThresholdType, Thresholds};
pub use quorum::{default_signature_duration, Quorum, QuorumCtx};
pub use quorumspace::QuorumSpace;
pub use resource::Resource;

use lib_identity::IdentityError;

/// Result type alias for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Document error types
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("action rejected by handler policy: {0}")]
    InvalidAction(String),

    #[error("bad signature format: {0}")]
    BadSignatureFormat(String),

    #[error("signature is expired")]
    ExpiredSignature,

    #[error("signature does not verify under {0:?}")]
    BadSignature(String),

    #[error("{signer:?} already holds a live signature on a competing action in {document:?}")]
    DoubleSigning { signer: String, document: String },

    #[error("no live quorum for content hash {0}")]
    UnknownQuorum(String),

    #[error("no applied block at version {0}")]
    UnknownBlock(u64),

    #[error("no resource at {0:?}")]
    UnknownResource(String),

    #[error("resource path {0:?} must begin with '/'")]
    BadResourcePath(String),

    #[error("cannot set property {0:?} through set_property")]
    UnknownProperty(String),

    #[error("document has no installed handler")]
    NoHandler,

    #[error("handler policy error: {0}")]
    HandlerPolicy(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),
}
