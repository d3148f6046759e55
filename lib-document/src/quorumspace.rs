//! Quorum space
//!
//! Per-document registry of in-flight quorums, keyed by content hash. The
//! space enforces the protocol's safety constraint: an identity may hold a
//! live signature on at most one competing quorum at a time. Signing a
//! second competing action before the first completes or outdates raises
//! `DoubleSigning`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::action::Action;
use crate::quorum::{Quorum, QuorumCtx};
use crate::{DocumentError, DocumentResult};

/// Index of live quorums for one document.
#[derive(Debug, Clone, Default)]
pub struct QuorumSpace {
    by_hash: BTreeMap<String, Quorum>,
    by_author: BTreeMap<String, String>,
}

impl QuorumSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a quorum, returning its content hash. Registering a hash
    /// that is already live keeps the existing quorum.
    pub fn register(&mut self, quorum: Quorum) -> String {
        let hash = quorum.hash();
        self.by_hash.entry(hash.clone()).or_insert(quorum);
        hash
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> DocumentResult<&Quorum> {
        self.by_hash
            .get(hash)
            .ok_or_else(|| DocumentError::UnknownQuorum(hash.to_string()))
    }

    pub fn get_mut(&mut self, hash: &str) -> DocumentResult<&mut Quorum> {
        self.by_hash
            .get_mut(hash)
            .ok_or_else(|| DocumentError::UnknownQuorum(hash.to_string()))
    }

    /// Record that `signer` now holds the slot for this quorum.
    pub(crate) fn record_signer(&mut self, signer: &str, hash: &str) {
        self.by_author.insert(signer.to_string(), hash.to_string());
    }

    /// A signer's slot is free when it holds nothing, points at a quorum
    /// that is gone, or points at one that is no longer competing.
    pub fn is_free(&self, signer: &str, ctx: &QuorumCtx) -> bool {
        match self.by_author.get(signer) {
            None => true,
            Some(hash) => match self.by_hash.get(hash) {
                None => true,
                Some(held) => !held.competing(ctx),
            },
        }
    }

    pub fn assert_free(&self, signer: &str, ctx: &QuorumCtx) -> DocumentResult<()> {
        if self.is_free(signer, ctx) {
            Ok(())
        } else {
            Err(DocumentError::DoubleSigning {
                signer: signer.to_string(),
                document: ctx.document.clone(),
            })
        }
    }

    /// Quorums still gathering signatures.
    pub fn competing<'a>(&'a self, ctx: &QuorumCtx) -> Vec<&'a Quorum> {
        self.by_hash.values().filter(|q| q.competing(ctx)).collect()
    }

    /// Actions of the competing quorums.
    pub fn get_competing_actions<'a>(&'a self, ctx: &QuorumCtx) -> Vec<&'a Action> {
        self.competing(ctx).into_iter().map(Quorum::action).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quorum> {
        self.by_hash.values()
    }

    /// Drop quorums that have finished their life: done and enacted (hash
    /// listed in `enacted`), or outdated. Author slots pointing at dropped
    /// quorums are released.
    pub fn compact(&mut self, ctx: &QuorumCtx, enacted: &BTreeSet<String>) {
        let dead: Vec<String> = self
            .by_hash
            .iter()
            .filter(|(hash, q)| {
                q.outdated(ctx.version) || (q.done(ctx) && enacted.contains(*hash))
            })
            .map(|(hash, _)| hash.clone())
            .collect();
        for hash in &dead {
            debug!(hash = %hash, "compacting finished quorum");
            self.by_hash.remove(hash);
        }
        let live = &self.by_hash;
        self.by_author.retain(|_, hash| live.contains_key(hash));
    }
}
