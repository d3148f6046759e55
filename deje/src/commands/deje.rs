//! Document and protocol commands

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use serde_json::Value;

use lib_document::Document;
use lib_identity::IdentityCache;
use lib_protocol::{Owner, Transport};

use crate::repl::Repl;
use crate::vars;

impl Repl {
    /// Initialize DEJE interactivity.
    ///
    /// Reads two values from variable storage: `idcache` (a serialized
    /// identity cache) and `identity` (the transport location of the local
    /// identity within it). Can be re-run, but that resets the stateful
    /// parts of the protocol.
    pub(crate) fn do_dinit(&mut self) {
        let idcache = match vars::traverse(&self.data, &["idcache".to_string()]) {
            Ok(value) => value.clone(),
            Err(_) => {
                self.output("Need to set variable 'idcache'");
                return;
            }
        };
        let location = match vars::traverse(&self.data, &["identity".to_string()]) {
            Ok(Value::String(location)) => location.clone(),
            Ok(_) => {
                self.output("Variable 'identity' must be a location string");
                return;
            }
            Err(_) => {
                self.output("Need to set variable 'identity'");
                return;
            }
        };
        let cache: IdentityCache = match serde_json::from_value(idcache) {
            Ok(cache) => cache,
            Err(_) => {
                self.output("Could not deserialize data in idcache");
                return;
            }
        };
        let identity = match cache.by_location(&location) {
            Ok(identity) => identity.clone(),
            Err(_) => {
                self.output(format!("No identity in cache for {location:?}"));
                return;
            }
        };

        let transport: Rc<dyn Transport> = self.router.clone();
        let mut owner = match Owner::new(identity.clone(), transport) {
            Ok(owner) => owner,
            Err(err) => {
                self.output(format!("Could not initialize owner: {err}"));
                return;
            }
        };
        owner.identities_mut().sync_from(&cache);

        let handle = Rc::new(RefCell::new(owner));
        self.router.register(identity.location(), handle.clone());
        self.owner = Some(handle);
        self.output("DEJE initialized");
    }

    /// Load a document file, own it, and make it current.
    pub(crate) fn do_dload(&mut self, args: &[String]) {
        let (Some(name), Some(file)) = (args.first().cloned(), args.get(1)) else {
            self.output("Usage: dload <name> <file>");
            return;
        };
        let owner = match self.owner_handle() {
            Ok(owner) => owner,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };
        let doc = match Document::load_from(name.clone(), Path::new(file)) {
            Ok(doc) => doc,
            Err(err) => {
                self.output(format!("Could not load {file}: {err}"));
                return;
            }
        };

        let result = {
            let mut owner = owner.borrow_mut();
            owner
                .own_document(doc)
                .map_err(|e| e.to_string())
                .and_then(|()| {
                    let doc = owner.document_mut(&name).map_err(|e| e.to_string())?;
                    if doc.is_active() {
                        doc.replay().map_err(|e| e.to_string())?;
                    }
                    Ok(doc.version())
                })
        };
        match result {
            Ok(version) => {
                let _ = vars::set_path(
                    &mut self.data,
                    &["docname".to_string()],
                    Value::String(name.clone()),
                );
                self.output(format!("Loaded document {name:?} at version {version}"));
            }
            Err(msg) => self.output(format!("Could not own document: {msg}")),
        }
    }

    /// Propose an event on the current document and drain the router.
    pub(crate) fn do_devent(&mut self, rest: &str) {
        if rest.is_empty() {
            self.output("Usage: devent <json>");
            return;
        }
        let payload: Value = match serde_json::from_str(rest) {
            Ok(payload) => payload,
            Err(_) => {
                self.output("Could not decode parameter as JSON.");
                return;
            }
        };
        let docname = match self.current_docname() {
            Ok(docname) => docname,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };
        let owner = match self.owner_handle() {
            Ok(owner) => owner,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };

        let proposed = owner.borrow_mut().event(&docname, payload);
        self.router.deliver_all();
        match proposed {
            Ok(_) => {
                let version = owner
                    .borrow()
                    .document(&docname)
                    .map(|doc| doc.version())
                    .unwrap_or(0);
                self.output(format!("Event achieved, version {version}"));
            }
            Err(err) => self.output(format!("Event failed: {err}")),
        }
    }

    /// Write the current document to a file.
    pub(crate) fn do_dexport(&mut self, args: &[String]) {
        let Some(file) = args.first().cloned() else {
            self.output("Usage: dexport <file>");
            return;
        };
        let docname = match self.current_docname() {
            Ok(docname) => docname,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };
        let owner = match self.owner_handle() {
            Ok(owner) => owner,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };

        let saved = owner
            .borrow()
            .document(&docname)
            .map_err(|e| e.to_string())
            .and_then(|doc| doc.save_to(Path::new(&file)).map_err(|e| e.to_string()));
        match saved {
            Ok(()) => self.output(format!("Exported {docname:?} to {file}")),
            Err(msg) => self.output(format!("Could not export: {msg}")),
        }
    }

    /// Serialize the current document into variable storage.
    pub(crate) fn do_dvexport(&mut self, args: &[String]) {
        let Some(var) = args.first().cloned() else {
            self.output("Usage: dvexport <var>");
            return;
        };
        let docname = match self.current_docname() {
            Ok(docname) => docname,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };
        let owner = match self.owner_handle() {
            Ok(owner) => owner,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };

        let serial = owner
            .borrow()
            .document(&docname)
            .map_err(|e| e.to_string())
            .and_then(|doc| doc.serialize().map_err(|e| e.to_string()));
        match serial {
            Ok(value) => {
                if let Err(err) =
                    vars::set_path(&mut self.data, std::slice::from_ref(&var), value)
                {
                    self.output(err.to_string());
                } else {
                    self.output(format!("Exported {docname:?} to variable {var:?}"));
                }
            }
            Err(msg) => self.output(format!("Could not export: {msg}")),
        }
    }

    /// Round-trip a version query against the participants.
    pub(crate) fn do_dget_latest(&mut self) {
        let docname = match self.current_docname() {
            Ok(docname) => docname,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };
        let owner = match self.owner_handle() {
            Ok(owner) => owner,
            Err(msg) => {
                self.output(msg);
                return;
            }
        };

        let result: Rc<Cell<Option<u64>>> = Rc::new(Cell::new(None));
        let captured = result.clone();
        let queried = owner
            .borrow_mut()
            .get_version(&docname, move |value| captured.set(value.as_u64()));
        if let Err(err) = queried {
            self.output(format!("Could not query version: {err}"));
            return;
        }
        self.router.deliver_all();
        match result.get() {
            Some(version) => self.output(format!("Version is {version}")),
            None => self.output("No response to version query"),
        }
    }
}
