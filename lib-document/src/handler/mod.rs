//! Handler policy boundary
//!
//! Every document carries a handler resource that decides per-document
//! policy: who participates in voting, the quorum thresholds, read/write
//! permissions, and what a valid event looks like. The core consumes that
//! policy through the `Handler` trait; `builtin` provides the stock
//! JSON-policy implementation. Binding a scripting engine means implementing
//! this trait, nothing more.

pub mod builtin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::DocumentResult;
use lib_identity::Identity;

/// Which threshold a quorum must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    Read,
    Write,
}

/// Signature counts required to apply an action, keyed by action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub read: u32,
    pub write: u32,
}

impl Thresholds {
    pub fn of(&self, kind: ThresholdType) -> u32 {
        match kind {
            ThresholdType::Read => self.read,
            ThresholdType::Write => self.write,
        }
    }
}

/// Per-document policy hooks.
///
/// All hooks are side-effect-free with respect to the document except
/// `event_apply` and `on_resource_update`, which are the only mutation
/// points. Hooks are synchronous and must not block.
pub trait Handler {
    /// Whether `content` is a valid event for `author` against the current
    /// document state.
    fn event_test(&self, doc: &Document, content: &Value, author: &str) -> bool;

    /// Apply an accepted event to the document's resources.
    fn event_apply(&self, doc: &mut Document, content: &Value, author: &str)
        -> DocumentResult<()>;

    /// Change notification for a resource property. On a path change,
    /// `oldpath` carries the previous path.
    fn on_resource_update(&self, path: &str, propname: &str, oldpath: &str);

    /// Identities permitted to sign write quorums, in stable order.
    fn quorum_participants(&self) -> Vec<Identity>;

    fn quorum_thresholds(&self) -> Thresholds;

    fn request_protocols(&self) -> Vec<String> {
        Vec::new()
    }

    fn can_read(&self, name: &str) -> bool;

    fn can_write(&self, name: &str) -> bool;

    /// Opaque handler-controlled RPC.
    fn host_request(&self, _callback: &str, _args: &Value) -> Value {
        Value::Null
    }
}
