//! File transfer commands

use serde_json::Value;

use crate::repl::Repl;
use crate::vars;

impl Repl {
    /// Read a text file into variable storage.
    pub(crate) fn do_fread(&mut self, args: &[String]) {
        let Some((file, path)) = args.split_first() else {
            self.output("Usage: fread <file> <path...>");
            return;
        };
        if path.is_empty() {
            self.output("Usage: fread <file> <path...>");
            return;
        }
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(err) => {
                self.output(format!("Could not read {file}: {err}"));
                return;
            }
        };
        if let Err(err) = vars::set_path(&mut self.data, path, Value::String(text)) {
            self.output(err.to_string());
        }
    }

    /// Write a string variable to a text file.
    pub(crate) fn do_fwrite(&mut self, args: &[String]) {
        let Some((file, path)) = args.split_first() else {
            self.output("Usage: fwrite <file> <path...>");
            return;
        };
        if path.is_empty() {
            self.output("Usage: fwrite <file> <path...>");
            return;
        }
        let text = match vars::traverse(&self.data, path) {
            Ok(Value::String(text)) => text.clone(),
            Ok(_) => {
                self.output("fwrite expects a string variable");
                return;
            }
            Err(err) => {
                self.output(err.to_string());
                return;
            }
        };
        match std::fs::write(file, text) {
            Ok(()) => self.output(format!("Wrote {file}")),
            Err(err) => self.output(format!("Could not write {file}: {err}")),
        }
    }
}
