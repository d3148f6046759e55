//! Command groups
//!
//! Handlers are methods on `Repl`, grouped the way the command families
//! group: document/protocol commands, variable storage, and file transfer.

mod deje;
mod files;
mod vars;
