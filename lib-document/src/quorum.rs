//! Signature quorums
//!
//! A quorum accumulates signatures for exactly one action. Signatures are
//! self-expiring blobs: an ISO-8601 UTC expiry timestamp, a NUL separator,
//! and the raw ed25519 signature over `expiry ‖ content-hash`. A quorum is
//! done when enough currently-valid participant signatures are held; it is
//! outdated once the document has moved past the version its action was
//! proposed against.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Utc};

use crate::action::Action;
use crate::handler::{ThresholdType, Thresholds};
use crate::{DocumentError, DocumentResult};
use lib_identity::Identity;

/// Timestamp layout embedded in signature blobs, microsecond precision.
const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Default signature validity window.
pub fn default_signature_duration() -> Duration {
    Duration::minutes(5)
}

/// Produce a signature blob for `content_hash` expiring after `duration`.
pub fn generate_signature(
    identity: &Identity,
    content_hash: &str,
    duration: Duration,
) -> DocumentResult<Vec<u8>> {
    let expiry = (Utc::now() + duration).format(EXPIRY_FORMAT).to_string();
    let mut plaintext = expiry.clone().into_bytes();
    plaintext.extend_from_slice(content_hash.as_bytes());
    let raw = identity.sign(&plaintext)?;

    let mut blob = expiry.into_bytes();
    blob.push(0);
    blob.extend_from_slice(&raw);
    Ok(blob)
}

/// Validate a signature blob: split at the first NUL, parse the expiry,
/// reject expired timestamps, then verify the raw signature under the
/// claimed identity.
pub fn assert_valid_signature(
    identity: &Identity,
    content_hash: &str,
    blob: &[u8],
) -> DocumentResult<()> {
    let nul = blob
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| DocumentError::BadSignatureFormat("no NUL separator".to_string()))?;
    let (expiry_bytes, raw) = (&blob[..nul], &blob[nul + 1..]);

    let expiry_str = std::str::from_utf8(expiry_bytes)
        .map_err(|_| DocumentError::BadSignatureFormat("expiry is not UTF-8".to_string()))?;
    let expiry = NaiveDateTime::parse_from_str(expiry_str, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| DocumentError::BadSignatureFormat(format!("expiry parse: {e}")))?;

    if expiry <= Utc::now().naive_utc() {
        return Err(DocumentError::ExpiredSignature);
    }

    let mut plaintext = expiry_bytes.to_vec();
    plaintext.extend_from_slice(content_hash.as_bytes());
    if !identity.verify(&plaintext, raw) {
        return Err(DocumentError::BadSignature(identity.name().to_string()));
    }
    Ok(())
}

pub fn validate_signature(identity: &Identity, content_hash: &str, blob: &[u8]) -> bool {
    assert_valid_signature(identity, content_hash, blob).is_ok()
}

/// Document-derived facts a quorum needs to judge itself: who may sign,
/// how many signatures suffice, and how far the document has advanced.
#[derive(Debug, Clone)]
pub struct QuorumCtx {
    pub document: String,
    pub version: u64,
    pub participants: Vec<Identity>,
    pub thresholds: Thresholds,
}

impl QuorumCtx {
    pub fn is_participant(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name() == name)
    }
}

/// Signature accumulator for one action.
#[derive(Debug, Clone)]
pub struct Quorum {
    action: Action,
    threshtype: ThresholdType,
    signatures: BTreeMap<String, (Identity, Vec<u8>)>,
    transmitted_complete: bool,
}

impl Quorum {
    pub fn new(action: Action) -> Self {
        let threshtype = action.threshold_type();
        Quorum {
            action,
            threshtype,
            signatures: BTreeMap::new(),
            transmitted_complete: false,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub(crate) fn action_mut(&mut self) -> &mut Action {
        &mut self.action
    }

    pub fn threshtype(&self) -> ThresholdType {
        self.threshtype
    }

    pub fn hash(&self) -> String {
        self.action.hash()
    }

    /// Store a signature. Duplicates overwrite, which allows re-signing
    /// with a longer expiry.
    pub(crate) fn insert_signature(&mut self, identity: Identity, blob: Vec<u8>) {
        self.signatures.insert(identity.name().to_string(), (identity, blob));
    }

    /// Drop all signatures.
    pub fn clear(&mut self) {
        self.signatures.clear();
    }

    pub fn signature_blob(&self, signer: &str) -> Option<&[u8]> {
        self.signatures.get(signer).map(|(_, blob)| blob.as_slice())
    }

    /// Whether `signer` currently holds a valid signature here: present,
    /// a participant, unexpired, and verifying.
    pub fn sig_valid(&self, signer: &str, ctx: &QuorumCtx) -> bool {
        match self.signatures.get(signer) {
            Some((identity, blob)) => {
                ctx.is_participant(signer)
                    && validate_signature(identity, &self.hash(), blob)
            }
            None => false,
        }
    }

    /// Names holding currently-valid signatures.
    pub fn valid_signatures(&self, ctx: &QuorumCtx) -> Vec<String> {
        self.signatures
            .keys()
            .filter(|name| self.sig_valid(name, ctx))
            .cloned()
            .collect()
    }

    /// Count of currently-valid signatures. Expired signatures stop
    /// counting, so a quorum that was done can cease to be done.
    pub fn completion(&self, ctx: &QuorumCtx) -> usize {
        self.valid_signatures(ctx).len()
    }

    pub fn threshold(&self, ctx: &QuorumCtx) -> usize {
        ctx.thresholds.of(self.threshtype) as usize
    }

    pub fn done(&self, ctx: &QuorumCtx) -> bool {
        self.completion(ctx) >= self.threshold(ctx)
    }

    /// The document has advanced past the version this action was proposed
    /// against. Never true for read requests.
    pub fn outdated(&self, doc_version: u64) -> bool {
        match self.action.version() {
            Some(v) => doc_version > v,
            None => false,
        }
    }

    pub fn competing(&self, ctx: &QuorumCtx) -> bool {
        !(self.done(ctx) || self.outdated(ctx.version))
    }

    /// Wire form of the currently-valid signature set: signer name to
    /// hex-encoded blob.
    pub fn sigs_dict(&self, ctx: &QuorumCtx) -> BTreeMap<String, String> {
        self.valid_signatures(ctx)
            .into_iter()
            .filter_map(|name| {
                self.signature_blob(&name)
                    .map(|blob| (name, hex::encode(blob)))
            })
            .collect()
    }

    pub fn transmitted_complete(&self) -> bool {
        self.transmitted_complete
    }

    /// Set the completion latch. Returns true exactly once; callers emit
    /// the `lock-complete` broadcast only on that first transition.
    pub(crate) fn mark_transmitted(&mut self) -> bool {
        if self.transmitted_complete {
            false
        } else {
            self.transmitted_complete = true;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> Identity {
        Identity::new("mitzi@lackadaisy.com", "local:mitzi")
    }

    const HASH: &str = "a6aa316b4b784fda1a38b53730d1a7698c3c1a33";

    #[test]
    fn test_generate_and_validate() {
        let ident = test_identity();
        let blob = generate_signature(&ident, HASH, default_signature_duration()).unwrap();
        assert_valid_signature(&ident, HASH, &blob).unwrap();
    }

    #[test]
    fn test_missing_separator() {
        let ident = test_identity();
        assert!(matches!(
            assert_valid_signature(&ident, HASH, b"2014-01-01 12:00:00.000000"),
            Err(DocumentError::BadSignatureFormat(_))
        ));
    }

    #[test]
    fn test_garbage_timestamp() {
        let ident = test_identity();
        let mut blob = b"not a timestamp".to_vec();
        blob.push(0);
        blob.extend_from_slice(&[1u8; 64]);
        assert!(matches!(
            assert_valid_signature(&ident, HASH, &blob),
            Err(DocumentError::BadSignatureFormat(_))
        ));
    }

    #[test]
    fn test_expired_signature() {
        let ident = test_identity();
        let blob = generate_signature(&ident, HASH, Duration::minutes(-5)).unwrap();
        assert!(matches!(
            assert_valid_signature(&ident, HASH, &blob),
            Err(DocumentError::ExpiredSignature)
        ));
    }

    #[test]
    fn test_wrong_identity_rejected() {
        let ident = test_identity();
        let other = Identity::new("atlas@lackadaisy.com", "local:atlas");
        let blob = generate_signature(&ident, HASH, default_signature_duration()).unwrap();
        assert!(matches!(
            assert_valid_signature(&other, HASH, &blob),
            Err(DocumentError::BadSignature(_))
        ));
    }

    #[test]
    fn test_tampered_hash_rejected() {
        let ident = test_identity();
        let blob = generate_signature(&ident, HASH, default_signature_duration()).unwrap();
        let other_hash = "ffffffffffffffffffffffffffffffffffffffff";
        assert!(matches!(
            assert_valid_signature(&ident, other_hash, &blob),
            Err(DocumentError::BadSignature(_))
        ));
    }
}
