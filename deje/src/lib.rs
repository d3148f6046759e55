//! DEJE Interactive Node
//!
//! A line-driven front-end over the replication core: a JSON variable
//! storage area, an owner bound to an in-process router, and the `d*`/`v*`
//! command families for driving documents and storage from a terminal or a
//! script file.

pub mod commands;
pub mod repl;
pub mod vars;

pub use repl::Repl;
pub use vars::TraversalError;
