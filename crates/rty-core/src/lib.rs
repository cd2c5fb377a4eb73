//! Global state shared by every pass of the type checker.
//!
//! A [`GlobalState`] owns two append-only tables: the files being checked
//! and the symbols defined by them. Small integer handles ([`FileRef`],
//! [`SymbolRef`]) index the tables and are threaded through the AST, the
//! passes, and the language server.
//!
//! Diagnostics flow through a shared [`ErrorQueue`]: passes push, the
//! server drains. Deep-copying a `GlobalState` yields an independent
//! derivative that still reports into the same queue, which is what the
//! slow-path reanalysis relies on.

#![warn(missing_docs)]

pub mod errors;
pub mod names;

mod error_queue;
mod files;
mod gs;
mod loc;
mod symbols;

pub use error_queue::{ErrorLine, ErrorQueue, ErrorSection, QueuedError};
pub use files::{File, FileRef, SourceType};
pub use gs::GlobalState;
pub use loc::{Detail, Loc};
pub use symbols::{Symbol, SymbolKind, SymbolRef};
