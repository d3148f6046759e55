//! Variable storage commands

use serde_json::Value;

use crate::repl::Repl;
use crate::vars;

impl Repl {
    /// Print a value in variable storage.
    pub(crate) fn do_vget(&mut self, args: &[String]) {
        match vars::traverse(&self.data, args) {
            Ok(value) => {
                let rendered = serde_json::to_string_pretty(value)
                    .unwrap_or_else(|e| format!("<unprintable: {e}>"));
                self.output(rendered);
            }
            Err(err) => self.output(err.to_string()),
        }
    }

    /// Set a value in variable storage; the final argument is JSON.
    pub(crate) fn do_vset(&mut self, args: &[String]) {
        let Some((raw, path)) = args.split_last() else {
            self.output("Not enough arguments, expected at least 1.");
            return;
        };
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => {
                self.output("Could not decode last parameter as JSON.");
                return;
            }
        };
        if let Err(err) = vars::set_path(&mut self.data, path, value) {
            self.output(err.to_string());
        }
    }

    /// Delete a value from variable storage; with no path, reset the root.
    pub(crate) fn do_vdel(&mut self, args: &[String]) {
        if let Err(err) = vars::del_path(&mut self.data, args) {
            self.output(err.to_string());
        }
    }

    /// Copy one top-level variable to another.
    pub(crate) fn do_vclone(&mut self, args: &[String]) {
        let (Some(src), Some(dst)) = (args.first(), args.get(1)) else {
            self.output("Usage: vclone <src> <dst>");
            return;
        };
        let value = match vars::traverse(&self.data, std::slice::from_ref(src)) {
            Ok(value) => value.clone(),
            Err(err) => {
                self.output(err.to_string());
                return;
            }
        };
        if let Err(err) = vars::set_path(&mut self.data, std::slice::from_ref(dst), value) {
            self.output(err.to_string());
        }
    }

    /// Save a variable value to disk as JSON.
    pub(crate) fn do_vsave(&mut self, args: &[String]) {
        let Some((file, path)) = args.split_first() else {
            self.output("Usage: vsave <file> [path...]");
            return;
        };
        let value = match vars::traverse(&self.data, path) {
            Ok(value) => value,
            Err(err) => {
                self.output(err.to_string());
                return;
            }
        };
        let rendered = match serde_json::to_string_pretty(value) {
            Ok(rendered) => rendered,
            Err(err) => {
                self.output(format!("Could not serialize value: {err}"));
                return;
            }
        };
        match std::fs::write(file, rendered) {
            Ok(()) => self.output(format!("Saved to {file}")),
            Err(err) => self.output(format!("Could not write {file}: {err}")),
        }
    }

    /// Load a JSON file into variable storage.
    pub(crate) fn do_vload(&mut self, args: &[String]) {
        let Some((file, path)) = args.split_first() else {
            self.output("Usage: vload <file> [path...]");
            return;
        };
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(err) => {
                self.output(format!("Could not read {file}: {err}"));
                return;
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => {
                self.output(format!("Could not decode {file} as JSON."));
                return;
            }
        };
        if let Err(err) = vars::set_path(&mut self.data, path, value) {
            self.output(err.to_string());
        }
    }
}
