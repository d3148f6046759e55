//! Owners
//!
//! An owner binds one identity to its documents, the shared identity cache,
//! and a transport. It routes every inbound message to the right document
//! and quorum, runs the proposer side of the lock exchange, answers
//! version/block queries, and drives catch-up sync. Malformed or unknown
//! input is answered with a `deje-error` and never interrupts other work.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::transport::Transport;
use crate::wire::{
    ActionContent, Block, Message, ERR_NOT_DICT, ERR_NO_TYPE, ERR_UNKNOWN_TYPE, KNOWN_TYPES,
};
use crate::{ProtocolError, ProtocolResult};
use lib_document::{
    default_signature_duration, Action, Document, DocumentError, EnactOutcome,
    EventDisposition, EventRecord, ReadRequest,
};
use lib_identity::{Identity, IdentityCache};

/// One-shot response handler.
pub type Callback = Box<dyn FnOnce(Value)>;

/// Catch-up progress for one document.
enum SyncState {
    AwaitingVersion,
    Fetching { target: u64 },
}

/// A peer: one identity, its owned documents, and a transport.
pub struct Owner {
    identity: Identity,
    identities: IdentityCache,
    documents: BTreeMap<String, Document>,
    transport: Rc<dyn Transport>,
    callbacks: HashMap<String, Callback>,
    syncs: HashMap<String, SyncState>,
}

impl Owner {
    pub fn new(identity: Identity, transport: Rc<dyn Transport>) -> ProtocolResult<Owner> {
        if identity.location().is_empty() {
            return Err(ProtocolError::MissingLocation(identity.name().to_string()));
        }
        let mut identities = IdentityCache::new();
        identities.insert(identity.clone());
        Ok(Owner {
            identity,
            identities,
            documents: BTreeMap::new(),
            transport,
            callbacks: HashMap::new(),
            syncs: HashMap::new(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn address(&self) -> &str {
        self.identity.location()
    }

    pub fn identities(&self) -> &IdentityCache {
        &self.identities
    }

    pub fn identities_mut(&mut self) -> &mut IdentityCache {
        &mut self.identities
    }

    pub fn document(&self, name: &str) -> ProtocolResult<&Document> {
        self.documents
            .get(name)
            .ok_or_else(|| ProtocolError::UnknownDocument(name.to_string()))
    }

    pub fn document_mut(&mut self, name: &str) -> ProtocolResult<&mut Document> {
        self.documents
            .get_mut(name)
            .ok_or_else(|| ProtocolError::UnknownDocument(name.to_string()))
    }

    pub fn document_names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Take ownership of a document: bind the local identity and activate
    /// the handler if its resource is present.
    pub fn own_document(&mut self, mut doc: Document) -> ProtocolResult<()> {
        doc.set_identity(self.identity.clone());
        if !doc.is_active() {
            let handler_path = doc.handler_path().to_string();
            if doc.get_resource(&handler_path).is_ok() {
                doc.activate(&self.identities)?;
            } else {
                debug!(document = %doc.name(), "owning document without a handler resource");
            }
        }
        self.documents.insert(doc.name().to_string(), doc);
        Ok(())
    }

    // Local proposals

    /// Propose a write on an owned document: run it through the document
    /// state machine, then broadcast the lock-acquire and our own
    /// lock-acquired to all participants.
    pub fn event(&mut self, docname: &str, payload: Value) -> ProtocolResult<EventDisposition> {
        let disposition = self.document_mut(docname)?.event(payload)?;
        if let EventDisposition::Pending(hash) = &disposition {
            let hash = hash.clone();
            self.broadcast_acquire(docname, &hash)?;
            self.transmit_acquired(docname, &hash, None, true)?;
            self.maybe_complete(docname, &hash)?;
        }
        Ok(disposition)
    }

    /// Propose a subscription: register the request's quorum locally so the
    /// replies route to it, then broadcast the lock-acquire.
    pub fn subscribe(&mut self, docname: &str) -> ProtocolResult<ReadRequest> {
        let request = {
            let doc = self.document_mut(docname)?;
            let request = doc.subscribe_request()?;
            doc.register_action(Action::Read(request.clone()));
            request
        };
        let message = Message::LockAcquire {
            docname: docname.to_string(),
            content: ActionContent::Subscribe {
                subscriber: request.author.clone(),
                unique: request.unique,
            },
        };
        self.transmit(docname, &message, &[], true, false)?;
        Ok(request)
    }

    /// One-shot version query against the participants.
    pub fn get_version(
        &mut self,
        docname: &str,
        callback: impl FnOnce(Value) + 'static,
    ) -> ProtocolResult<()> {
        self.document(docname)?;
        self.callbacks
            .insert(format!("{docname}:recv-version"), Box::new(callback));
        let message = Message::GetVersion {
            docname: docname.to_string(),
        };
        self.transmit(docname, &message, &[], true, false)
    }

    /// One-shot block query against the participants.
    pub fn get_block(
        &mut self,
        docname: &str,
        version: u64,
        callback: impl FnOnce(Value) + 'static,
    ) -> ProtocolResult<()> {
        self.document(docname)?;
        self.callbacks
            .insert(format!("{docname}:recv-block-{version}"), Box::new(callback));
        let message = Message::GetBlock {
            docname: docname.to_string(),
            version,
        };
        self.transmit(docname, &message, &[], true, false)
    }

    /// Catch a stale replica up: resolve the remote version, then fetch and
    /// verify each missing block in order. No built-in retry - if a
    /// response never arrives the sync stalls and the caller re-issues it.
    pub fn sync(&mut self, docname: &str) -> ProtocolResult<()> {
        self.document(docname)?;
        self.syncs
            .insert(docname.to_string(), SyncState::AwaitingVersion);
        let message = Message::GetVersion {
            docname: docname.to_string(),
        };
        self.transmit(docname, &message, &[], true, false)
    }

    pub fn sync_in_progress(&self, docname: &str) -> bool {
        self.syncs.contains_key(docname)
    }

    // Inbound dispatch

    /// Handle one inbound payload from `sender` (a transport address).
    pub fn on_message(&mut self, sender: &str, payload: &str) -> ProtocolResult<()> {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(_) => {
                warn!(%sender, "received unparseable message, dropping");
                self.error(sender, ERR_NOT_DICT, "message is not a JSON object", Value::Null);
                return Ok(());
            }
        };
        if !value.is_object() {
            warn!(%sender, "received non-object message, dropping");
            self.error(sender, ERR_NOT_DICT, "message is not a JSON object", Value::Null);
            return Ok(());
        }
        let mtype = match value.get("type").and_then(Value::as_str) {
            Some(mtype) => mtype.to_string(),
            None => {
                warn!(%sender, "received message with no type, dropping");
                self.error(sender, ERR_NO_TYPE, "message has no type", Value::Null);
                return Ok(());
            }
        };
        let message: Message = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                if KNOWN_TYPES.contains(&mtype.as_str()) {
                    warn!(%sender, %mtype, error = %err, "malformed message, dropping");
                } else {
                    warn!(%sender, %mtype, "received message with unknown type");
                    self.error(
                        sender,
                        ERR_UNKNOWN_TYPE,
                        &format!("unknown message type {mtype:?}"),
                        Value::Null,
                    );
                }
                return Ok(());
            }
        };

        match message {
            Message::LockAcquire { docname, content } => self.on_lock_acquire(&docname, content),
            Message::LockAcquired {
                docname,
                signer,
                content_hash,
                signature,
            } => self.on_lock_acquired(&docname, &signer, &content_hash, &signature),
            Message::LockComplete {
                docname,
                signatures,
                content_hash,
                version,
            } => self.on_lock_complete(&docname, signatures, &content_hash, version),
            Message::GetVersion { docname } => self.on_get_version(sender, &docname),
            Message::DocVersion { docname, version } => {
                self.on_doc_version(sender, &docname, version)
            }
            Message::GetBlock { docname, version } => {
                self.on_get_block(sender, &docname, version)
            }
            Message::DocBlock { docname, block } => self.on_doc_block(sender, &docname, block),
            Message::Error {
                code, explanation, ..
            } => {
                warn!(%sender, code, %explanation, "peer reported an error");
                Ok(())
            }
        }
    }

    fn on_lock_acquire(&mut self, docname: &str, content: ActionContent) -> ProtocolResult<()> {
        if !self.documents.contains_key(docname) {
            warn!(%docname, "lock-acquire for unknown document, dropping");
            return Ok(());
        }
        let me = self.identity.clone();
        match content {
            checkpoint @ ActionContent::Checkpoint { .. } => {
                let action = checkpoint.into_action();
                let author = action.author().to_string();
                let hash = {
                    let doc = self.document_mut(docname)?;
                    if !(doc.can_write(Some(&author))? && action.test(doc)?) {
                        warn!(%docname, %author, "rejecting invalid checkpoint");
                        return Ok(());
                    }
                    let hash = doc.register_action(action);
                    match doc.sign_quorum(&hash, &me, None, default_signature_duration()) {
                        Ok(()) => {}
                        Err(DocumentError::DoubleSigning { signer, document }) => {
                            warn!(%signer, %document, "refusing to double-sign, acquire unsigned");
                            return Ok(());
                        }
                        Err(err) => return Err(err.into()),
                    }
                    hash
                };
                // Reply to the proposer only.
                self.transmit_acquired(docname, &hash, Some(vec![me.name().to_string()]), false)?;
                Ok(())
            }
            ActionContent::Subscribe { subscriber, unique } => {
                let hash = {
                    let doc = self.document_mut(docname)?;
                    if !doc.can_read(Some(&subscriber))? {
                        warn!(%docname, %subscriber, "permissions error: cannot read");
                        return Ok(());
                    }
                    let request = ReadRequest::with_unique(subscriber, unique);
                    let hash = doc.register_action(Action::Read(request));
                    doc.sign_quorum(&hash, &me, None, default_signature_duration())?;
                    hash
                };
                self.transmit_acquired(docname, &hash, Some(vec![me.name().to_string()]), false)?;
                // With a read threshold of one our signature may already
                // finish the quorum; completion is acceptor-driven here.
                if self.quorum_done(docname, &hash)? {
                    self.complete_quorum(docname, &hash)?;
                }
                Ok(())
            }
        }
    }

    fn on_lock_acquired(
        &mut self,
        docname: &str,
        signer: &str,
        content_hash: &str,
        signature: &str,
    ) -> ProtocolResult<()> {
        let signer_ident = match self.identities.by_name(signer) {
            Ok(ident) => ident.clone(),
            Err(_) => {
                warn!(%signer, "lock-acquired from unknown signer, dropping");
                return Ok(());
            }
        };
        let blob = match hex::decode(signature) {
            Ok(blob) => blob,
            Err(_) => {
                warn!(%signer, "lock-acquired signature is not hex, dropping");
                return Ok(());
            }
        };
        let Some(doc) = self.documents.get_mut(docname) else {
            warn!(%docname, "lock-acquired for unknown document, dropping");
            return Ok(());
        };
        match doc.sign_quorum(content_hash, &signer_ident, Some(blob), default_signature_duration())
        {
            Ok(()) => {}
            Err(DocumentError::UnknownQuorum(hash)) => {
                info!(%hash, "unknown checkpoint data, dropping");
                return Ok(());
            }
            Err(err) => {
                warn!(%signer, error = %err, "could not accept signature, dropping");
                return Ok(());
            }
        }
        self.maybe_complete(docname, content_hash)
    }

    fn on_lock_complete(
        &mut self,
        docname: &str,
        signatures: BTreeMap<String, String>,
        content_hash: &str,
        version: Option<u64>,
    ) -> ProtocolResult<()> {
        let known = self
            .documents
            .get(docname)
            .map(|doc| doc.quorum(content_hash).is_some())
            .unwrap_or(false);
        if !known {
            info!(hash = %content_hash, "unknown checkpoint data for complete, dropping");
            return Ok(());
        }

        {
            let Some(doc) = self.documents.get_mut(docname) else {
                return Ok(());
            };
            for (signer, sighex) in &signatures {
                let signer_ident = match self.identities.by_name(signer) {
                    Ok(ident) => ident.clone(),
                    Err(_) => {
                        warn!(%signer, "complete carries unknown signer, skipping");
                        continue;
                    }
                };
                let blob = match hex::decode(sighex) {
                    Ok(blob) => blob,
                    Err(_) => {
                        warn!(%signer, "complete signature is not hex, skipping");
                        continue;
                    }
                };
                if let Err(err) = doc.sign_quorum(
                    content_hash,
                    &signer_ident,
                    Some(blob),
                    default_signature_duration(),
                ) {
                    warn!(%signer, error = %err, "could not accept signature, skipping");
                }
            }
        }

        if self.quorum_done(docname, content_hash)? {
            let outcome = self.document_mut(docname)?.enact(content_hash)?;
            self.after_enact(docname, outcome)?;
        }
        if let Some(version) = version {
            // Read receipt: the accepting peer piggybacked its version.
            self.trigger_callback(&format!("{docname}:recv-version"), json!(version));
        }
        Ok(())
    }

    fn on_get_version(&mut self, sender: &str, docname: &str) -> ProtocolResult<()> {
        let Some(doc) = self.documents.get(docname) else {
            warn!(%docname, "get-version for unknown document, dropping");
            return Ok(());
        };
        let reader = match self.identities.by_location(sender) {
            Ok(ident) => ident.clone(),
            Err(_) => {
                warn!(%sender, "get-version from unknown location, dropping");
                return Ok(());
            }
        };
        if !doc.can_read(Some(reader.name()))? {
            warn!(reader = %reader.name(), "permissions error: cannot read");
            return Ok(());
        }
        let message = Message::DocVersion {
            docname: docname.to_string(),
            version: doc.version(),
        };
        self.send_direct(reader.location(), &message);
        Ok(())
    }

    fn on_doc_version(&mut self, sender: &str, docname: &str, version: u64) -> ProtocolResult<()> {
        if !self.verify_participant_source(sender, docname, "version")? {
            return Ok(());
        }
        self.trigger_callback(&format!("{docname}:recv-version"), json!(version));

        if self.syncs.contains_key(docname) {
            let local = self.document(docname)?.version();
            if version <= local {
                info!(%docname, version, "sync complete, nothing missing");
                self.syncs.remove(docname);
            } else {
                self.syncs
                    .insert(docname.to_string(), SyncState::Fetching { target: version });
                let message = Message::GetBlock {
                    docname: docname.to_string(),
                    version: local,
                };
                self.transmit(docname, &message, &[], true, false)?;
            }
        }
        Ok(())
    }

    fn on_get_block(&mut self, sender: &str, docname: &str, version: u64) -> ProtocolResult<()> {
        let Some(doc) = self.documents.get(docname) else {
            warn!(%docname, "get-block for unknown document, dropping");
            return Ok(());
        };
        let reader = match self.identities.by_location(sender) {
            Ok(ident) => ident.clone(),
            Err(_) => {
                warn!(%sender, "get-block from unknown location, dropping");
                return Ok(());
            }
        };
        if !doc.can_read(Some(reader.name()))? {
            warn!(reader = %reader.name(), "permissions error: cannot read");
            return Ok(());
        }
        let record = match doc.block(version) {
            Ok(record) => record,
            Err(_) => {
                warn!(%docname, version, "no applied block at requested version, dropping");
                return Ok(());
            }
        };
        let message = Message::DocBlock {
            docname: docname.to_string(),
            block: Block::from(record),
        };
        self.send_direct(reader.location(), &message);
        Ok(())
    }

    fn on_doc_block(&mut self, sender: &str, docname: &str, block: Block) -> ProtocolResult<()> {
        if !self.verify_participant_source(sender, docname, "block")? {
            return Ok(());
        }

        let fetching = match self.syncs.get(docname) {
            Some(SyncState::Fetching { target }) => Some(*target),
            _ => None,
        };
        if let Some(target) = fetching {
            let local = self.document(docname)?.version();
            if block.version != local {
                debug!(%docname, got = block.version, want = local, "out-of-order block, ignoring");
                return Ok(());
            }
            if !self.verify_block(docname, &block)? {
                warn!(%docname, version = block.version, "block failed signature verification, aborting sync");
                self.syncs.remove(docname);
                return Ok(());
            }
            self.document_mut(docname)?
                .apply_block(EventRecord::from(block))?;
            let local = local + 1;
            if local >= target {
                info!(%docname, version = local, "sync complete");
                self.syncs.remove(docname);
            } else {
                let message = Message::GetBlock {
                    docname: docname.to_string(),
                    version: local,
                };
                self.transmit(docname, &message, &[], true, false)?;
            }
            return Ok(());
        }

        let version = block.version;
        let value = serde_json::to_value(&block)?;
        self.trigger_callback(&format!("{docname}:recv-block-{version}"), value);
        Ok(())
    }

    /// Info-bearing responses must come from inside the participant set.
    fn verify_participant_source(
        &self,
        sender: &str,
        docname: &str,
        what: &str,
    ) -> ProtocolResult<bool> {
        let Some(doc) = self.documents.get(docname) else {
            warn!(%docname, "{what} response for unknown document, dropping");
            return Ok(false);
        };
        let source = match self.identities.by_location(sender) {
            Ok(ident) => ident,
            Err(_) => {
                warn!(%sender, "{what} response from unknown location, ignoring");
                return Ok(false);
            }
        };
        let participants = doc.participants()?;
        if !participants.iter().any(|p| p == source) {
            warn!(source = %source.name(), "{what} information from non-participant source, ignoring");
            return Ok(false);
        }
        Ok(true)
    }

    /// Verify a fetched block's signature set against participant keys:
    /// every counted signature must parse and verify, and the count must
    /// meet the write threshold. The embedded expiry is not re-checked -
    /// historical blocks are expected to be past their signing window.
    fn verify_block(&self, docname: &str, block: &Block) -> ProtocolResult<bool> {
        let doc = self.document(docname)?;
        let participants = doc.participants()?;
        let threshold = doc.thresholds()?.write as usize;
        let action = Action::Event(lib_document::Event::new(
            block.content.clone(),
            block.author.clone(),
            block.version,
        ));
        let hash = action.hash();

        let mut count = 0;
        for (signer, sighex) in &block.signatures {
            let Some(ident) = participants.iter().find(|p| p.name() == signer) else {
                continue;
            };
            let Ok(blob) = hex::decode(sighex) else {
                continue;
            };
            let Some(nul) = blob.iter().position(|&b| b == 0) else {
                continue;
            };
            let (expiry, raw) = (&blob[..nul], &blob[nul + 1..]);
            let mut plaintext = expiry.to_vec();
            plaintext.extend_from_slice(hash.as_bytes());
            if ident.verify(&plaintext, raw) {
                count += 1;
            }
        }
        Ok(count >= threshold)
    }

    // Quorum transmission

    /// Broadcast the lock-acquire for a registered action to participants.
    fn broadcast_acquire(&mut self, docname: &str, hash: &str) -> ProtocolResult<()> {
        let content = {
            let doc = self.document(docname)?;
            let quorum = doc
                .quorum(hash)
                .ok_or_else(|| DocumentError::UnknownQuorum(hash.to_string()))?;
            ActionContent::from_action(quorum.action())
        };
        let message = Message::LockAcquire {
            docname: docname.to_string(),
            content,
        };
        self.transmit(docname, &message, &[], true, false)
    }

    /// Emit one lock-acquired per signer (default: every currently-valid
    /// signer), targeting the action's author plus, optionally, all
    /// participants.
    fn transmit_acquired(
        &mut self,
        docname: &str,
        hash: &str,
        signers: Option<Vec<String>>,
        include_participants: bool,
    ) -> ProtocolResult<()> {
        let (author, pairs) = {
            let doc = self.document(docname)?;
            let quorum = doc
                .quorum(hash)
                .ok_or_else(|| DocumentError::UnknownQuorum(hash.to_string()))?;
            let author = quorum.action().author().to_string();
            let sigs = doc.sigs_dict(hash)?;
            let pairs: Vec<(String, String)> = match signers {
                Some(names) => names
                    .into_iter()
                    .filter_map(|name| sigs.get(&name).map(|sig| (name, sig.clone())))
                    .collect(),
                None => sigs.into_iter().collect(),
            };
            (author, pairs)
        };
        for (signer, signature) in pairs {
            let message = Message::LockAcquired {
                docname: docname.to_string(),
                signer,
                content_hash: hash.to_string(),
                signature,
            };
            self.transmit(
                docname,
                &message,
                std::slice::from_ref(&author),
                include_participants,
                false,
            )?;
        }
        Ok(())
    }

    /// Complete a quorum we are responsible for: broadcast a single
    /// lock-complete (idempotent via the quorum latch), enact locally, and
    /// notify subscribers.
    fn complete_quorum(&mut self, docname: &str, hash: &str) -> ProtocolResult<()> {
        if !self.document_mut(docname)?.mark_complete_transmitted(hash)? {
            return Ok(());
        }
        let (signatures, author, version) = {
            let doc = self.document(docname)?;
            let quorum = doc
                .quorum(hash)
                .ok_or_else(|| DocumentError::UnknownQuorum(hash.to_string()))?;
            let version = match quorum.action() {
                Action::Read(_) => Some(doc.version()),
                Action::Event(_) => None,
            };
            (
                doc.sigs_dict(hash)?,
                quorum.action().author().to_string(),
                version,
            )
        };
        let message = Message::LockComplete {
            docname: docname.to_string(),
            signatures,
            content_hash: hash.to_string(),
            version,
        };
        self.transmit(docname, &message, std::slice::from_ref(&author), true, false)?;

        let outcome = self.document_mut(docname)?.enact(hash)?;
        self.after_enact(docname, outcome)
    }

    /// Complete when the quorum is done and the action is ours to finish.
    fn maybe_complete(&mut self, docname: &str, hash: &str) -> ProtocolResult<()> {
        let proposer = {
            let doc = self.document(docname)?;
            match doc.quorum(hash) {
                Some(quorum) => quorum.action().author().to_string(),
                None => return Ok(()),
            }
        };
        if proposer == self.identity.name() && self.quorum_done(docname, hash)? {
            self.complete_quorum(docname, hash)?;
        }
        Ok(())
    }

    fn quorum_done(&self, docname: &str, hash: &str) -> ProtocolResult<bool> {
        let doc = self.document(docname)?;
        if doc.quorum(hash).is_none() {
            return Ok(false);
        }
        Ok(doc.quorum_done(hash)?)
    }

    /// Push the new version to subscribers after a write lands.
    fn after_enact(&mut self, docname: &str, outcome: EnactOutcome) -> ProtocolResult<()> {
        if let EnactOutcome::Applied(version) = outcome {
            let has_subscribers = !self.document(docname)?.subscribers().is_empty();
            if has_subscribers {
                let message = Message::DocVersion {
                    docname: docname.to_string(),
                    version,
                };
                self.transmit(docname, &message, &[], false, true)?;
            }
        }
        Ok(())
    }

    // Transmission plumbing

    /// Send a message to the union of explicit targets, the participant
    /// set, and the subscriber set. Names resolve through the identity
    /// cache; the self-address is skipped, unknown addresses and
    /// per-recipient transport failures are logged and skipped.
    fn transmit(
        &self,
        docname: &str,
        message: &Message,
        targets: &[String],
        include_participants: bool,
        include_subscribers: bool,
    ) -> ProtocolResult<()> {
        let doc = self.document(docname)?;
        let mut names: BTreeSet<String> = targets.iter().cloned().collect();
        if include_participants {
            for participant in doc.participants()? {
                names.insert(participant.name().to_string());
            }
        }
        if include_subscribers {
            names.extend(doc.subscribers().iter().cloned());
        }

        let payload = serde_json::to_string(message)?;
        for name in names {
            let location = match self.identities.by_name(&name) {
                Ok(ident) => ident.location().to_string(),
                Err(_) => {
                    warn!(%name, "no known address, skipping");
                    continue;
                }
            };
            if location == self.identity.location() {
                continue;
            }
            if let Err(err) = self
                .transport
                .send(self.identity.location(), &location, &payload)
            {
                warn!(%name, error = %err, "transport send failed, skipping recipient");
            }
        }
        Ok(())
    }

    fn send_direct(&self, location: &str, message: &Message) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "could not serialize message");
                return;
            }
        };
        if let Err(err) = self
            .transport
            .send(self.identity.location(), location, &payload)
        {
            warn!(%location, error = %err, "transport send failed");
        }
    }

    /// Report a protocol error back to a peer address.
    pub fn error(&self, location: &str, code: i64, explanation: &str, data: Value) {
        let message = Message::Error {
            docname: None,
            code,
            explanation: explanation.to_string(),
            data,
        };
        self.send_direct(location, &message);
    }

    fn trigger_callback(&mut self, key: &str, value: Value) {
        match self.callbacks.remove(key) {
            Some(callback) => callback(value),
            None => debug!(%key, "no pending callback for response"),
        }
    }
}
