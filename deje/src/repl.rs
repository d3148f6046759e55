//! The REPL shell
//!
//! Owns variable storage, the in-process router, and an optional owner, and
//! dispatches command lines to the `d*`/`v*`/`f*` handlers in `commands`.
//! Output goes to named views so scripted runs can capture it; `msglog` is
//! the default view.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use serde_json::{json, Value};

use lib_protocol::{Owner, Router};

use crate::vars;

/// Command names with their one-line help.
const COMMANDS: &[(&str, &str)] = &[
    ("commands", "List available commands."),
    ("devent", "Propose an event on the current document. Usage: devent <json>"),
    ("dexport", "Write the current document to a file. Usage: dexport <file>"),
    ("dget_latest", "Round-trip a version query for the current document."),
    ("dinit", "Initialize DEJE interactivity from the idcache and identity variables."),
    ("dload", "Load and own a document file. Usage: dload <name> <file>"),
    ("dvexport", "Serialize the current document into a variable. Usage: dvexport <var>"),
    ("fread", "Read a text file into variable storage. Usage: fread <file> <path...>"),
    ("fwrite", "Write a string variable to a text file. Usage: fwrite <file> <path...>"),
    ("help", "Show help. Usage: help [command]"),
    ("quit", "Leave the REPL."),
    ("vclone", "Copy one top-level variable to another. Usage: vclone <src> <dst>"),
    ("vdel", "Delete a value from variable storage. Usage: vdel [path...]"),
    ("vget", "Print a value in variable storage. Usage: vget [path...]"),
    ("vload", "Load a JSON file into variable storage. Usage: vload <file> [path...]"),
    ("vsave", "Save a variable value to disk as JSON. Usage: vsave <file> [path...]"),
    ("vset", "Set a value in variable storage. Usage: vset [path...] <json>"),
    ("view", "Switch output views. Usage: view <name>"),
];

pub struct Repl {
    pub(crate) data: Value,
    pub(crate) owner: Option<Rc<RefCell<Owner>>>,
    pub(crate) router: Rc<Router>,
    views: BTreeMap<String, Vec<String>>,
    current_view: String,
    echo: bool,
    done: bool,
}

impl Default for Repl {
    fn default() -> Self {
        Repl::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Repl {
            data: json!({}),
            owner: None,
            router: Router::new(),
            views: BTreeMap::new(),
            current_view: "msglog".to_string(),
            echo: true,
            done: false,
        }
    }

    /// A REPL that only buffers output, for scripted tests.
    pub fn silent() -> Self {
        let mut repl = Repl::new();
        repl.echo = false;
        repl
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Lines written to a view so far.
    pub fn view_lines(&self, view: &str) -> &[String] {
        self.views.get(view).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn output(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            println!("{line}");
        }
        self.views
            .entry(self.current_view.clone())
            .or_default()
            .push(line);
    }

    /// Run one command line. Unknown commands and command failures print to
    /// the current view; nothing aborts the shell except `quit`.
    pub fn execute(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let args = tokenize(rest);
        match command {
            "help" => self.do_help(&args),
            "commands" => self.do_commands(),
            "quit" => self.done = true,
            "view" => self.do_view(&args),
            "vget" => self.do_vget(&args),
            "vset" => self.do_vset(&args),
            "vdel" => self.do_vdel(&args),
            "vclone" => self.do_vclone(&args),
            "vsave" => self.do_vsave(&args),
            "vload" => self.do_vload(&args),
            "fread" => self.do_fread(&args),
            "fwrite" => self.do_fwrite(&args),
            "dinit" => self.do_dinit(),
            "dload" => self.do_dload(&args),
            "devent" => self.do_devent(rest),
            "dexport" => self.do_dexport(&args),
            "dvexport" => self.do_dvexport(&args),
            "dget_latest" => self.do_dget_latest(),
            other => self.output(format!("No such command: {other:?}")),
        }
    }

    /// Feed a script, line by line, until it ends or a `quit` runs.
    pub fn run_script(&mut self, text: &str) {
        for line in text.lines() {
            if self.done {
                break;
            }
            self.execute(line);
        }
    }

    /// Interactive prompt loop over stdin.
    pub fn run_interactive(&mut self) -> std::io::Result<()> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        while !self.done {
            write!(stdout, "{}> ", self.current_view)?;
            stdout.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            self.execute(&line);
        }
        Ok(())
    }

    // Core commands

    fn do_help(&mut self, args: &[String]) {
        match args.first() {
            Some(name) => match COMMANDS.iter().find(|(cmd, _)| cmd == name) {
                Some((cmd, help)) => self.output(format!("{cmd} - {help}")),
                None => self.output(format!("No such command: {name:?}")),
            },
            None => {
                self.output("Use 'commands' to list commands, 'help <command>' for details.")
            }
        }
    }

    fn do_commands(&mut self) {
        for (cmd, help) in COMMANDS {
            self.output(format!("{cmd:<12} {help}"));
        }
    }

    fn do_view(&mut self, args: &[String]) {
        let Some(name) = args.first() else {
            let current = self.current_view.clone();
            self.output(format!("Current view is {current:?}"));
            return;
        };
        self.current_view = name.clone();
        for line in self.view_lines(name).to_vec() {
            if self.echo {
                println!("{line}");
            }
        }
    }

    // Shared helpers for the command groups

    pub(crate) fn current_docname(&self) -> Result<String, String> {
        match vars::traverse(&self.data, &["docname".to_string()]) {
            Ok(Value::String(name)) => Ok(name.clone()),
            Ok(_) => Err("Variable 'docname' must be a string".to_string()),
            Err(_) => Err("Need to set variable 'docname'".to_string()),
        }
    }

    pub(crate) fn owner_handle(&self) -> Result<Rc<RefCell<Owner>>, String> {
        self.owner
            .clone()
            .ok_or_else(|| "DEJE not initialized, use dinit first".to_string())
    }
}

/// Whitespace splitter honoring single and double quotes, so JSON arguments
/// with spaces survive as one token.
pub(crate) fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut has_token = false;
    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                has_token = true;
            }
            None if c.is_whitespace() => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            None => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}
