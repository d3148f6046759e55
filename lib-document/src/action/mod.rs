//! Signed actions
//!
//! An action is an abstract signed proposal against a document: an `Event`
//! (a write) or a `ReadRequest` (a subscription). Each carries a canonical
//! hashable form; the content hash of that form keys the action's quorum
//! everywhere in the system.

mod event;
mod read;

pub use event::Event;
pub use read::ReadRequest;

use serde_json::Value;

use crate::document::Document;
use crate::handler::ThresholdType;
use crate::DocumentResult;
use lib_identity::content_hash;

/// A signed proposal: a write or a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Event(Event),
    Read(ReadRequest),
}

impl Action {
    pub fn author(&self) -> &str {
        match self {
            Action::Event(ev) => &ev.author,
            Action::Read(rr) => &rr.author,
        }
    }

    /// The document version this proposal was made against. Read requests
    /// return `None`: they are never outdated by document progress.
    pub fn version(&self) -> Option<u64> {
        match self {
            Action::Event(ev) => Some(ev.version),
            Action::Read(_) => None,
        }
    }

    pub fn threshold_type(&self) -> ThresholdType {
        match self {
            Action::Event(_) => ThresholdType::Write,
            Action::Read(_) => ThresholdType::Read,
        }
    }

    /// Canonical, order-stable hashable form.
    pub fn hashcontent(&self) -> Value {
        match self {
            Action::Event(ev) => ev.hashcontent(),
            Action::Read(rr) => rr.hashcontent(),
        }
    }

    /// Content hash keying this action's quorum.
    pub fn hash(&self) -> String {
        content_hash(&self.hashcontent())
    }

    /// Whether the proposal has already taken effect on `doc`.
    pub fn is_done(&self, doc: &Document) -> bool {
        match self {
            Action::Event(ev) => ev.is_done(doc),
            Action::Read(rr) => rr.done,
        }
    }

    /// Consult handler policy on whether this proposal is valid.
    pub fn test(&self, doc: &Document) -> DocumentResult<bool> {
        match self {
            Action::Event(ev) => {
                let handler = doc.handler()?;
                Ok(handler.event_test(doc, &ev.content, &ev.author))
            }
            Action::Read(_) => Ok(true),
        }
    }
}

impl From<Event> for Action {
    fn from(ev: Event) -> Self {
        Action::Event(ev)
    }
}

impl From<ReadRequest> for Action {
    fn from(rr: ReadRequest) -> Self {
        Action::Read(rr)
    }
}
