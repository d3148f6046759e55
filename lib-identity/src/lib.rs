//! DEJE Identity Package
//!
//! Principals for the DEJE document replication protocol: named ed25519
//! identities with transport locations, a shared identity cache, and the
//! canonical content-hash used to key quorums.

pub mod cache;
pub mod hashing;
pub mod identity;

pub use cache::IdentityCache;
pub use hashing::{canonical_json, content_hash};
pub use identity::Identity;

/// Result type alias for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Identity error types
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("no identity named {0:?} in cache")]
    UnknownIdentity(String),

    #[error("no identity at location {0:?} in cache")]
    UnknownLocation(String),

    #[error("identity {0:?} has no signing key")]
    NoSigningKey(String),

    #[error("bad key material: {0}")]
    BadKeyMaterial(String),
}
