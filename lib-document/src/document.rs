//! Documents
//!
//! A document is a frozen initial snapshot plus an ordered log of
//! quorum-approved events; current state is the snapshot with the log
//! replayed over it. `version` is the log length. The document also owns
//! the quorum space for its in-flight actions and the subscriber set fed by
//! read requests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::action::{Action, Event, ReadRequest};
use crate::handler::builtin::DeltaHandler;
use crate::handler::{Handler, ThresholdType, Thresholds};
use crate::quorum::{self, Quorum, QuorumCtx};
use crate::quorumspace::QuorumSpace;
use crate::resource::Resource;
use crate::{DocumentError, DocumentResult};
use lib_identity::{content_hash, Identity, IdentityCache};

/// Where the policy handler lives unless overridden.
pub const DEFAULT_HANDLER_PATH: &str = "/handler.json";

/// Local principal name for documents nobody owns yet.
pub const ANONYMOUS: &str = "anonymous";

/// Frozen baseline state: the resource set at the last `freeze()` and the
/// content hash it was stamped with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub hash: Option<String>,
    pub resources: BTreeMap<String, Resource>,
}

/// One applied event in the log. Signatures are runtime state for serving
/// block queries; they do not persist in the document file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub content: Value,
    pub author: String,
    pub version: u64,
    #[serde(skip)]
    pub signatures: BTreeMap<String, String>,
}

/// What became of a locally-proposed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// No owner: the event was applied immediately.
    Enacted,
    /// Owned: a quorum was registered and locally signed; the protocol
    /// layer must broadcast the lock-acquire for this content hash.
    Pending(String),
}

/// What an enactment did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnactOutcome {
    /// An event was appended; carries the new version.
    Applied(u64),
    /// A read request completed; carries the new subscriber's name.
    Subscribed(String),
    /// The action had already taken effect here.
    AlreadyDone,
}

pub struct Document {
    name: String,
    handler_path: String,
    resources: BTreeMap<String, Resource>,
    initial: Snapshot,
    events: Vec<EventRecord>,
    qs: QuorumSpace,
    subscribers: BTreeSet<String>,
    identity: Option<Identity>,
    handler: Option<Rc<dyn Handler>>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Document {
            name: name.into(),
            handler_path: DEFAULT_HANDLER_PATH.to_string(),
            resources: BTreeMap::new(),
            initial: Snapshot::default(),
            events: Vec::new(),
            qs: QuorumSpace::new(),
            subscribers: BTreeSet::new(),
            identity: None,
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The integer length of the applied event log.
    pub fn version(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn handler_path(&self) -> &str {
        &self.handler_path
    }

    pub fn set_handler_path(&mut self, path: impl Into<String>) {
        self.handler_path = path.into();
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Bind the owning peer's identity. Done by `Owner::own_document`.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn is_owned(&self) -> bool {
        self.identity.is_some()
    }

    /// The local principal name: the owner's, or `anonymous`.
    pub fn local_name(&self) -> &str {
        self.identity.as_ref().map(Identity::name).unwrap_or(ANONYMOUS)
    }

    // Handler management

    /// Parse the handler resource into the built-in policy handler,
    /// resolving participant names through `cache`.
    pub fn activate(&mut self, cache: &IdentityCache) -> DocumentResult<()> {
        let path = self.handler_path.clone();
        let content = self.get_resource(&path)?.content().to_string();
        let handler = DeltaHandler::from_resource(&content, cache)?;
        self.handler = Some(Rc::new(handler));
        Ok(())
    }

    /// Install an arbitrary policy handler (scripting engines bind here).
    pub fn install_handler(&mut self, handler: Rc<dyn Handler>) {
        self.handler = Some(handler);
    }

    pub fn deactivate(&mut self) {
        self.handler = None;
    }

    pub fn is_active(&self) -> bool {
        self.handler.is_some()
    }

    pub fn handler(&self) -> DocumentResult<Rc<dyn Handler>> {
        self.handler.clone().ok_or(DocumentError::NoHandler)
    }

    // Resources

    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    pub fn add_resource(&mut self, resource: Resource, notify: bool) -> DocumentResult<()> {
        if !resource.path().starts_with('/') {
            return Err(DocumentError::BadResourcePath(resource.path().to_string()));
        }
        let path = resource.path().to_string();
        self.resources.insert(path.clone(), resource);
        if notify {
            self.notify_update(&path, "add", &path);
        }
        Ok(())
    }

    pub fn get_resource(&self, path: &str) -> DocumentResult<&Resource> {
        self.resources
            .get(path)
            .ok_or_else(|| DocumentError::UnknownResource(path.to_string()))
    }

    pub fn del_resource(&mut self, path: &str, notify: bool) -> DocumentResult<Resource> {
        if !self.resources.contains_key(path) {
            return Err(DocumentError::UnknownResource(path.to_string()));
        }
        if notify {
            self.notify_update(path, "delete", path);
        }
        self.resources
            .remove(path)
            .ok_or_else(|| DocumentError::UnknownResource(path.to_string()))
    }

    /// Mutate one property of a resource, notifying the handler. A `path`
    /// change re-keys the resource under its new path.
    pub fn set_resource_property(
        &mut self,
        path: &str,
        propname: &str,
        value: &str,
    ) -> DocumentResult<()> {
        if propname == "path" {
            if !value.starts_with('/') {
                return Err(DocumentError::BadResourcePath(value.to_string()));
            }
            let mut resource = self
                .resources
                .remove(path)
                .ok_or_else(|| DocumentError::UnknownResource(path.to_string()))?;
            resource.set_property("path", value)?;
            self.resources.insert(value.to_string(), resource);
            self.notify_update(value, "path", path);
        } else {
            let resource = self
                .resources
                .get_mut(path)
                .ok_or_else(|| DocumentError::UnknownResource(path.to_string()))?;
            resource.set_property(propname, value)?;
            self.notify_update(path, propname, path);
        }
        Ok(())
    }

    fn notify_update(&self, path: &str, propname: &str, oldpath: &str) {
        if let Some(handler) = self.handler.clone() {
            handler.on_resource_update(path, propname, oldpath);
        }
    }

    // Handler-derived policy

    pub fn participants(&self) -> DocumentResult<Vec<Identity>> {
        Ok(self.handler()?.quorum_participants())
    }

    pub fn thresholds(&self) -> DocumentResult<Thresholds> {
        Ok(self.handler()?.quorum_thresholds())
    }

    pub fn request_protocols(&self) -> DocumentResult<Vec<String>> {
        Ok(self.handler()?.request_protocols())
    }

    pub fn can_read(&self, name: Option<&str>) -> DocumentResult<bool> {
        let name = name.unwrap_or_else(|| self.local_name());
        Ok(self.handler()?.can_read(name))
    }

    pub fn can_write(&self, name: Option<&str>) -> DocumentResult<bool> {
        let name = name.unwrap_or_else(|| self.local_name());
        Ok(self.handler()?.can_write(name))
    }

    /// Opaque handler-controlled RPC.
    pub fn request(&self, callback: &str, args: &Value) -> DocumentResult<Value> {
        Ok(self.handler()?.host_request(callback, args))
    }

    /// The facts quorums judge themselves against.
    pub fn quorum_ctx(&self) -> DocumentResult<QuorumCtx> {
        Ok(QuorumCtx {
            document: self.name.clone(),
            version: self.version(),
            participants: self.participants()?,
            thresholds: self.thresholds()?,
        })
    }

    // Event log and subscribers

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Subscribers only accumulate; revocation is not part of the protocol.
    pub fn subscribers(&self) -> &BTreeSet<String> {
        &self.subscribers
    }

    /// The applied record at a log index, for serving block queries.
    pub fn block(&self, version: u64) -> DocumentResult<&EventRecord> {
        self.events
            .get(version as usize)
            .ok_or(DocumentError::UnknownBlock(version))
    }

    // Quorum plumbing

    pub fn quorum_space(&self) -> &QuorumSpace {
        &self.qs
    }

    pub fn quorum(&self, hash: &str) -> Option<&Quorum> {
        self.qs.get(hash).ok()
    }

    /// Register an action's quorum, returning its content hash.
    pub fn register_action(&mut self, action: Action) -> String {
        self.qs.register(Quorum::new(action))
    }

    /// All competing actions (quorums neither done nor outdated).
    pub fn competing(&self) -> DocumentResult<Vec<Action>> {
        let ctx = self.quorum_ctx()?;
        Ok(self
            .qs
            .get_competing_actions(&ctx)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Add a signature to a live quorum. Generates the blob when none is
    /// supplied. Unless the signer already holds a valid signature here or
    /// the quorum is read-type, the quorum-space free-slot check runs
    /// around storage; a conflicting live signature raises `DoubleSigning`
    /// and stores nothing.
    pub fn sign_quorum(
        &mut self,
        hash: &str,
        identity: &Identity,
        signature: Option<Vec<u8>>,
        duration: chrono::Duration,
    ) -> DocumentResult<()> {
        let ctx = self.quorum_ctx()?;
        let (threshtype, already_signed) = {
            let q = self.qs.get(hash)?;
            (q.threshtype(), q.sig_valid(identity.name(), &ctx))
        };

        let blob = match signature {
            Some(blob) => blob,
            None => quorum::generate_signature(identity, hash, duration)?,
        };
        quorum::assert_valid_signature(identity, hash, &blob)?;

        let coordinated = !(already_signed || threshtype == ThresholdType::Read);
        if coordinated {
            self.qs.assert_free(identity.name(), &ctx)?;
        }
        self.qs.get_mut(hash)?.insert_signature(identity.clone(), blob);
        if coordinated {
            self.qs.record_signer(identity.name(), hash);
        }
        Ok(())
    }

    pub fn quorum_completion(&self, hash: &str) -> DocumentResult<usize> {
        let ctx = self.quorum_ctx()?;
        Ok(self.qs.get(hash)?.completion(&ctx))
    }

    pub fn quorum_done(&self, hash: &str) -> DocumentResult<bool> {
        let ctx = self.quorum_ctx()?;
        Ok(self.qs.get(hash)?.done(&ctx))
    }

    pub fn quorum_outdated(&self, hash: &str) -> DocumentResult<bool> {
        Ok(self.qs.get(hash)?.outdated(self.version()))
    }

    /// Wire form of a quorum's valid signature set.
    pub fn sigs_dict(&self, hash: &str) -> DocumentResult<BTreeMap<String, String>> {
        let ctx = self.quorum_ctx()?;
        Ok(self.qs.get(hash)?.sigs_dict(&ctx))
    }

    /// Flip the lock-complete latch; true exactly once per quorum.
    pub fn mark_complete_transmitted(&mut self, hash: &str) -> DocumentResult<bool> {
        Ok(self.qs.get_mut(hash)?.mark_transmitted())
    }

    /// Drop all signatures from a live quorum.
    pub fn clear_quorum(&mut self, hash: &str) -> DocumentResult<()> {
        self.qs.get_mut(hash)?.clear();
        Ok(())
    }

    // Proposals

    /// Propose a local write. Requires write permission for the local
    /// principal; no wire traffic happens when the check fails.
    pub fn event(&mut self, payload: Value) -> DocumentResult<EventDisposition> {
        let author = self.local_name().to_string();
        if !self.can_write(None)? {
            return Err(DocumentError::PermissionDenied(format!(
                "{author} may not write to {}",
                self.name
            )));
        }
        let event = Event::new(payload, author, self.version());
        self.external_event(event.into())
    }

    /// Run an action through policy and either enact it (unowned) or
    /// register and locally sign its quorum (owned), leaving the broadcast
    /// to the protocol layer.
    pub fn external_event(&mut self, action: Action) -> DocumentResult<EventDisposition> {
        if !action.test(self)? {
            return Err(DocumentError::InvalidAction(
                lib_identity::canonical_json(&action.hashcontent()),
            ));
        }
        if let Some(identity) = self.identity.clone() {
            let hash = self.register_action(action);
            self.sign_quorum(&hash, &identity, None, quorum::default_signature_duration())?;
            Ok(EventDisposition::Pending(hash))
        } else {
            self.enact_action(action)?;
            Ok(EventDisposition::Enacted)
        }
    }

    /// Build a subscription request for the local principal. Requires read
    /// permission.
    pub fn subscribe_request(&self) -> DocumentResult<ReadRequest> {
        let author = self.local_name().to_string();
        if !self.can_read(None)? {
            return Err(DocumentError::PermissionDenied(format!(
                "{author} may not read {}",
                self.name
            )));
        }
        Ok(ReadRequest::new(author))
    }

    // Enactment

    /// Enact the action behind a completed quorum: append the event (with
    /// its signature set) or complete the subscription. Guarded by
    /// `is_done`, so repeated lock-completes are harmless.
    pub fn enact(&mut self, hash: &str) -> DocumentResult<EnactOutcome> {
        let ctx = self.quorum_ctx()?;
        let (action, sigs) = {
            let q = self.qs.get(hash)?;
            (q.action().clone(), q.sigs_dict(&ctx))
        };
        if action.is_done(self) {
            return Ok(EnactOutcome::AlreadyDone);
        }
        match action {
            Action::Event(event) => {
                self.apply_event(event, sigs)?;
                self.compact_quorums()?;
                Ok(EnactOutcome::Applied(self.version()))
            }
            Action::Read(request) => {
                if let Ok(q) = self.qs.get_mut(hash) {
                    if let Action::Read(r) = q.action_mut() {
                        r.done = true;
                    }
                }
                self.subscribers.insert(request.author.clone());
                self.compact_quorums()?;
                Ok(EnactOutcome::Subscribed(request.author))
            }
        }
    }

    /// Direct enactment for actions with no registered quorum (unowned
    /// documents and test harnesses).
    pub fn enact_action(&mut self, action: Action) -> DocumentResult<()> {
        match action {
            Action::Event(event) => self.apply_event(event, BTreeMap::new()),
            Action::Read(request) => {
                self.subscribers.insert(request.author);
                Ok(())
            }
        }
    }

    fn apply_event(
        &mut self,
        event: Event,
        signatures: BTreeMap<String, String>,
    ) -> DocumentResult<()> {
        let handler = self.handler()?;
        self.events.push(EventRecord {
            content: event.content.clone(),
            author: event.author.clone(),
            version: event.version,
            signatures,
        });
        if let Err(err) = handler.event_apply(self, &event.content, &event.author) {
            self.events.pop();
            return Err(err);
        }
        debug!(document = %self.name, version = self.version(), "event achieved");
        Ok(())
    }

    /// Catch-up application of an already-verified block fetched from a
    /// peer. The protocol layer checks the signature set against
    /// participant keys before calling this.
    pub fn apply_block(&mut self, record: EventRecord) -> DocumentResult<()> {
        let event = Event::new(record.content.clone(), record.author.clone(), record.version);
        self.apply_event(event, record.signatures)?;
        self.compact_quorums()
    }

    fn compact_quorums(&mut self) -> DocumentResult<()> {
        let ctx = self.quorum_ctx()?;
        let enacted: BTreeSet<String> = self
            .qs
            .iter()
            .filter(|q| q.action().is_done(self))
            .map(Quorum::hash)
            .collect();
        self.qs.compact(&ctx, &enacted);
        Ok(())
    }

    // Snapshots and serialization

    /// Rebase the initial snapshot on current state and clear the log.
    /// Afterwards `version` is 0 and history before the freeze is gone.
    pub fn freeze(&mut self) -> DocumentResult<()> {
        let resources_value = serde_json::to_value(&self.resources)?;
        self.initial = Snapshot {
            hash: Some(content_hash(&resources_value)),
            resources: self.resources.clone(),
        };
        self.events.clear();
        Ok(())
    }

    pub fn initial(&self) -> &Snapshot {
        &self.initial
    }

    /// Document file format: the frozen original plus serialized events.
    pub fn serialize(&self) -> DocumentResult<Value> {
        let events = self
            .events
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({
            "original": serde_json::to_value(&self.initial)?,
            "events": events,
        }))
    }

    /// Rebuild a document from its file form. Resources start at the
    /// frozen snapshot; call `activate` and then `replay` to roll the log
    /// forward over them.
    pub fn deserialize(name: impl Into<String>, value: &Value) -> DocumentResult<Document> {
        #[derive(Deserialize)]
        struct SerialDocument {
            original: Snapshot,
            #[serde(default)]
            events: Vec<EventRecord>,
        }

        let serial: SerialDocument = serde_json::from_value(value.clone())?;
        let mut doc = Document::new(name);
        doc.resources = serial.original.resources.clone();
        doc.initial = serial.original;
        doc.events = serial.events;
        Ok(doc)
    }

    /// Re-apply the event log on top of the initial snapshot. Requires an
    /// installed handler.
    pub fn replay(&mut self) -> DocumentResult<()> {
        let handler = self.handler()?;
        self.resources = self.initial.resources.clone();
        let log: Vec<(Value, String)> = self
            .events
            .iter()
            .map(|r| (r.content.clone(), r.author.clone()))
            .collect();
        for (content, author) in log {
            handler.event_apply(self, &content, &author)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> DocumentResult<()> {
        let value = self.serialize()?;
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }

    pub fn load_from(name: impl Into<String>, path: &Path) -> DocumentResult<Document> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::deserialize(name, &value)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("version", &self.version())
            .field("resources", &self.resources.len())
            .field("subscribers", &self.subscribers)
            .field("owned", &self.is_owned())
            .field("active", &self.is_active())
            .finish()
    }
}
